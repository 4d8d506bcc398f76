//! # OLX Monitor Common
//!
//! Logging configuration shared by the service worker core and its host
//! harnesses.
//!
//! The core itself only emits `tracing` events; whoever hosts it decides
//! where they go by calling [`init_logging`] once at startup.

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};
