//! # OLX Monitor Service Worker
//!
//! The background agent that makes the OLX Monitor web app installable and
//! lets it receive price alerts while no tab is open.
//!
//! ## Features
//!
//! - **Lifecycle**: precache the app shell on `install`, drop stale caches on `activate`
//! - **Fetch**: pass-through with a fixed 503 fallback when the network fails
//! - **Push**: interpret the backend's payload and show a sticky notification
//! - **Notification clicks**: focus the tab already showing the ad, or open one
//!
//! ## Architecture
//!
//! ```text
//! Host (browser / replay harness)
//!     │  AgentEvent
//!     ▼
//! ServiceWorkerAgent ── dispatch table ──┬── LifecycleManager     (install, activate)
//!     │                                  ├── FetchInterceptor     (fetch)
//!     │                                  ├── PushNotificationPresenter (push)
//!     │                                  └── NotificationClickRouter   (notificationclick)
//!     ▼
//! ExtendableEvent ── wait_until() ──► EventOutcome
//!
//! Platform traits: CacheStore, Network, NotificationCenter, WindowClients, Registration
//! ```
//!
//! Handlers keep no state between events. The only shared input is the
//! immutable [`AgentConfig`].

pub mod agent;
pub mod click;
pub mod config;
pub mod error;
pub mod fetch;
pub mod lifecycle;
pub mod memory;
pub mod net;
pub mod notification;
pub mod platform;
pub mod push;

pub use agent::{
    AgentEvent, EventKind, EventOutcome, ExtendableEvent, HandlerContext, LifetimeExtension,
    ServiceWorkerAgent,
};
pub use click::{ClickAction, ClickOutcome, NotificationClickEvent, NotificationClickRouter};
pub use config::{AgentConfig, FallbackConfig, NotificationDefaults};
pub use error::{PayloadError, Result, ServiceWorkerError};
pub use fetch::FetchInterceptor;
pub use lifecycle::{ActivateReport, InstallReport, LifecycleManager};
pub use memory::{InMemoryPlatform, PlatformCall, ServiceWorkerState};
pub use net::{HttpNetwork, Request, Response};
pub use notification::{
    DisplayedNotification, NotificationAction, NotificationData, NotificationOptions,
};
pub use platform::{
    CacheStore, ClientId, ClientMatchOptions, Network, NotificationCenter, Platform,
    Registration, WindowClient, WindowClients,
};
pub use push::{
    NotificationPayload, PushEvent, PushMessageData, PushNotificationPresenter, PushOutcome,
};
