//! Host platform interface.
//!
//! The agent never touches browser globals directly. Everything it needs
//! from the host (named caches, the network, the notification tray, window
//! clients, the registration) comes through these traits, bundled by
//! [`Platform`].

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::net::{Request, Response};
use crate::notification::{DisplayedNotification, NotificationOptions};

/// Named cache storage (`caches`).
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Names of every existing cache.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Open (or create) `name` and store every entry as one batch.
    ///
    /// Either all entries become visible or none do.
    async fn put_all(&self, name: &str, entries: Vec<(String, Response)>) -> Result<()>;

    /// Delete a cache. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool>;
}

/// The live network (`fetch`).
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request. `Err` means no response was obtained at all.
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// The notification tray (`registration.showNotification`).
#[async_trait]
pub trait NotificationCenter: Send + Sync {
    /// Display a notification; resolves once the host acknowledges it.
    async fn show(&self, options: &NotificationOptions) -> Result<()>;

    /// Remove a displayed notification from the tray.
    async fn close(&self, notification: &DisplayedNotification) -> Result<()>;
}

/// Window clients under the agent's scope (`clients`).
#[async_trait]
pub trait WindowClients: Send + Sync {
    /// Enumerate clients matching the options.
    async fn match_all(&self, options: ClientMatchOptions) -> Result<Vec<WindowClient>>;

    /// Bring a client to the foreground.
    async fn focus(&self, id: &ClientId) -> Result<()>;

    /// Whether the host can open new windows at all.
    fn supports_open_window(&self) -> bool;

    /// Open a new window. `None` if the host opened it but exposes no client.
    async fn open_window(&self, url: &str) -> Result<Option<ClientId>>;

    /// Take control of every open page in scope.
    async fn claim(&self) -> Result<()>;
}

/// The agent's own registration.
#[async_trait]
pub trait Registration: Send + Sync {
    /// Activate as soon as install completes instead of waiting for tabs to close.
    async fn skip_waiting(&self) -> Result<()>;
}

/// Everything the handlers need from the host.
pub trait Platform: Send + Sync {
    fn caches(&self) -> &dyn CacheStore;
    fn network(&self) -> &dyn Network;
    fn notifications(&self) -> &dyn NotificationCenter;
    fn clients(&self) -> &dyn WindowClients;
    fn registration(&self) -> &dyn Registration;
}

/// Opaque client identifier assigned by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Options for `clients.matchAll({ type: "window" })`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientMatchOptions {
    pub include_uncontrolled: bool,
}

impl ClientMatchOptions {
    /// Every window, controlled or not.
    pub fn all_windows() -> Self {
        Self {
            include_uncontrolled: true,
        }
    }
}

/// A window known to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowClient {
    pub id: ClientId,
    /// Current URL exactly as the host reports it.
    pub url: String,
    #[serde(default)]
    pub focused: bool,
    /// Whether this agent currently controls the page.
    #[serde(default)]
    pub controlled: bool,
}

impl WindowClient {
    /// A controlled, unfocused window.
    pub fn window(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: ClientId(id.into()),
            url: url.into(),
            focused: false,
            controlled: true,
        }
    }

    /// Whether this client passes the match options.
    pub fn matches(&self, options: &ClientMatchOptions) -> bool {
        self.controlled || options.include_uncontrolled
    }
}
