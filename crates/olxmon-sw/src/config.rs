//! Agent configuration.
//!
//! Everything the handlers share lives here: the cache version tag, the
//! precache list and the notification defaults. The value is built once per
//! deployed agent and handed to every handler behind an `Arc`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, ServiceWorkerError};

/// Service worker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentConfig {
    /// Name of the current cache. Bump it whenever `precache` changes.
    pub cache_version: String,

    /// Origin and path served by the agent; precache paths resolve against it.
    pub scope: Url,

    /// Resources stored at install time, in order.
    pub precache: Vec<String>,

    /// Fallback returned when a mediated fetch fails.
    pub fallback: FallbackConfig,

    /// Defaults applied to push notifications.
    pub notifications: NotificationDefaults,
}

/// Fixed response used when the network is unreachable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FallbackConfig {
    /// Body text of the 503 response.
    pub body: String,
}

/// Defaults for fields a push payload may omit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationDefaults {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    /// Label of the "open" action button.
    pub open_label: String,
    /// Label of the "dismiss" action button.
    pub dismiss_label: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            cache_version: "olx-monitor-v1".to_string(),
            scope: Url::parse("http://localhost:8080/").expect("static scope URL is valid"),
            precache: vec![
                "/".to_string(),
                "/static/icon-192.png".to_string(),
                "/static/icon-512.png".to_string(),
                "/static/manifest.json".to_string(),
            ],
            fallback: FallbackConfig::default(),
            notifications: NotificationDefaults::default(),
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            body: "Offline - conecte à internet".to_string(),
        }
    }
}

impl Default for NotificationDefaults {
    fn default() -> Self {
        Self {
            title: "OLX Monitor".to_string(),
            body: "Nova atualização disponível".to_string(),
            icon: "/static/icon-192.png".to_string(),
            badge: "/static/icon-192.png".to_string(),
            tag: "olx-monitor".to_string(),
            open_label: "Ver anúncio".to_string(),
            dismiss_label: "Dispensar".to_string(),
        }
    }
}

impl AgentConfig {
    /// Parse a (possibly partial) JSON document; missing keys keep defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Check the invariants the lifecycle handlers rely on.
    pub fn validate(&self) -> Result<()> {
        if self.cache_version.trim().is_empty() {
            return Err(ServiceWorkerError::config("cacheVersion must not be empty"));
        }
        if self.precache.is_empty() {
            return Err(ServiceWorkerError::config("precache list must not be empty"));
        }
        self.precache_urls().map(|_| ())
    }

    /// Precache paths resolved against the scope.
    pub fn precache_urls(&self) -> Result<Vec<Url>> {
        self.precache
            .iter()
            .map(|path| {
                self.scope.join(path).map_err(|e| {
                    ServiceWorkerError::config(format!("invalid precache path {path:?}: {e}"))
                })
            })
            .collect()
    }
}
