//! Install and activate handling.
//!
//! Install fills the cache named after the current version in one
//! all-or-nothing batch. Activate deletes every other cache. Both end by
//! asking the host to hand control to this version without waiting for
//! open tabs to close.

use futures::future::{join_all, try_join_all};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::AgentConfig;
use crate::error::{Result, ServiceWorkerError};
use crate::net::{Request, Response};
use crate::platform::{Network, Platform};

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallReport {
    pub cache_name: String,
    /// URLs stored, in precache order.
    pub cached: Vec<String>,
}

/// Result of an activation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateReport {
    /// The current version's cache, if it exists.
    pub kept: Option<String>,
    /// Stale caches that were removed.
    pub deleted: Vec<String>,
    /// Stale caches whose deletion failed.
    pub failed: Vec<String>,
}

/// Drives install and activate for one agent version.
pub struct LifecycleManager<'a> {
    config: &'a AgentConfig,
    platform: &'a dyn Platform,
}

impl<'a> LifecycleManager<'a> {
    pub fn new(config: &'a AgentConfig, platform: &'a dyn Platform) -> Self {
        Self { config, platform }
    }

    /// Populate the current cache, then skip waiting.
    ///
    /// Every resource is fetched before anything is stored, so a failure
    /// leaves no entry under the version name.
    pub async fn install(&self) -> Result<InstallReport> {
        let cache_name = self.config.cache_version.as_str();
        let urls = self.config.precache_urls()?;
        let network = self.platform.network();

        debug!(cache = cache_name, resources = urls.len(), "Precaching");

        let entries = try_join_all(urls.into_iter().map(|url| precache_one(network, url))).await?;

        let cached: Vec<String> = entries.iter().map(|(url, _)| url.clone()).collect();
        self.platform
            .caches()
            .put_all(cache_name, entries)
            .await
            .map_err(|e| ServiceWorkerError::install(cache_name, e.to_string()))?;

        self.platform.registration().skip_waiting().await?;

        info!(cache = cache_name, resources = cached.len(), "Install complete");
        Ok(InstallReport {
            cache_name: cache_name.to_string(),
            cached,
        })
    }

    /// Delete stale caches, then claim open pages.
    ///
    /// Deletions are independent; one failing does not stop the others.
    pub async fn activate(&self) -> Result<ActivateReport> {
        let current = self.config.cache_version.as_str();
        let caches = self.platform.caches();
        let names = caches.keys().await?;

        let mut report = ActivateReport::default();
        let mut stale = Vec::new();
        for name in names {
            if name == current {
                report.kept = Some(name);
            } else {
                stale.push(name);
            }
        }

        let results = join_all(stale.iter().map(|name| caches.delete(name))).await;
        for (name, result) in stale.into_iter().zip(results) {
            match result {
                Ok(_) => {
                    debug!(cache = %name, "Deleted stale cache");
                    report.deleted.push(name);
                }
                Err(e) => {
                    warn!(cache = %name, error = %e, "Failed to delete stale cache");
                    report.failed.push(name);
                }
            }
        }

        self.platform.clients().claim().await?;

        info!(
            cache = current,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Activation complete"
        );
        Ok(report)
    }
}

/// Fetch one precache resource; anything but a 2xx fails the install.
async fn precache_one(network: &dyn Network, url: Url) -> Result<(String, Response)> {
    let key = url.to_string();
    let response = network
        .fetch(&Request::get(url))
        .await
        .map_err(|e| ServiceWorkerError::install(&key, e.to_string()))?;
    if !response.ok() {
        return Err(ServiceWorkerError::install(
            &key,
            format!("bad response status {}", response.status),
        ));
    }
    Ok((key, response))
}
