//! In-memory host platform.
//!
//! Simulates the browser side of the agent: named caches, a scripted
//! network, the notification tray, window clients and the registration
//! state machine. Every side effect is appended to a journal so callers
//! can check what happened and in which order.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hashbrown::{HashMap, HashSet};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::trace;

use crate::error::{Result, ServiceWorkerError};
use crate::net::{Request, Response};
use crate::notification::{DisplayedNotification, NotificationOptions};
use crate::platform::{
    CacheStore, ClientId, ClientMatchOptions, Network, NotificationCenter, Platform, Registration,
    WindowClient, WindowClients,
};

// ==================== Types ====================

/// Service worker state as tracked by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceWorkerState {
    /// Script evaluated, no event delivered yet.
    #[default]
    Parsed,
    /// Install event in flight.
    Installing,
    /// Installed, waiting to activate.
    Installed,
    /// Activate event in flight.
    Activating,
    /// Active and controlling pages.
    Activated,
    /// Install failed or replaced.
    Redundant,
}

/// A side effect observed by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    Fetch(String),
    CachePut { cache: String, entries: usize },
    CacheDelete(String),
    SkipWaiting,
    Claim,
    ShowNotification(String),
    CloseNotification(String),
    MatchClients,
    Focus(ClientId),
    OpenWindow(String),
}

#[derive(Debug, Default)]
struct Cache {
    entries: HashMap<String, Response>,
}

// ==================== Platform ====================

/// A host platform that lives entirely in memory.
#[derive(Debug)]
pub struct InMemoryPlatform {
    caches: RwLock<HashMap<String, Cache>>,
    failing_deletes: RwLock<HashSet<String>>,
    fail_put: AtomicBool,

    routes: RwLock<HashMap<String, Response>>,
    failing_urls: RwLock<HashSet<String>>,
    offline: AtomicBool,

    shown: RwLock<Vec<NotificationOptions>>,
    closed: RwLock<Vec<DisplayedNotification>>,
    fail_show: AtomicBool,

    clients: RwLock<Vec<WindowClient>>,
    open_window_supported: AtomicBool,
    claimed: AtomicBool,
    next_client: AtomicU64,

    state: RwLock<ServiceWorkerState>,
    skip_waiting: AtomicBool,

    latency: Option<Duration>,
    journal: RwLock<Vec<PlatformCall>>,
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self {
            caches: RwLock::new(HashMap::new()),
            failing_deletes: RwLock::new(HashSet::new()),
            fail_put: AtomicBool::new(false),
            routes: RwLock::new(HashMap::new()),
            failing_urls: RwLock::new(HashSet::new()),
            offline: AtomicBool::new(false),
            shown: RwLock::new(Vec::new()),
            closed: RwLock::new(Vec::new()),
            fail_show: AtomicBool::new(false),
            clients: RwLock::new(Vec::new()),
            open_window_supported: AtomicBool::new(true),
            claimed: AtomicBool::new(false),
            next_client: AtomicU64::new(1),
            state: RwLock::new(ServiceWorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            latency: None,
            journal: RwLock::new(Vec::new()),
        }
    }
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every network fetch and notification display.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    // ---- network ----

    /// Serve `response` for `url`. Unrouted URLs get a 404.
    pub async fn route(&self, url: &str, response: Response) {
        self.routes.write().await.insert(url.to_string(), response);
    }

    /// Serve a 200 with `body` for every URL.
    pub async fn route_all_ok<'a>(&self, urls: impl IntoIterator<Item = &'a str>) {
        let mut routes = self.routes.write().await;
        for url in urls {
            routes.insert(url.to_string(), Response::new(StatusCode::OK, url.to_string()));
        }
    }

    /// Make fetches of `url` fail as if the network were unreachable.
    pub async fn fail_url(&self, url: &str) {
        self.failing_urls.write().await.insert(url.to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    // ---- caches ----

    /// Create a cache directly, bypassing install.
    pub async fn seed_cache(&self, name: &str) {
        self.caches.write().await.entry(name.to_string()).or_default();
    }

    /// Make deleting `name` fail.
    pub async fn fail_delete(&self, name: &str) {
        self.failing_deletes.write().await.insert(name.to_string());
    }

    /// Make every batch store fail, as if storage quota were exhausted.
    pub fn set_fail_put(&self, fail: bool) {
        self.fail_put.store(fail, Ordering::SeqCst);
    }

    /// Cache names, sorted.
    pub async fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// URLs stored in a cache, sorted.
    pub async fn cached_urls(&self, name: &str) -> Vec<String> {
        let caches = self.caches.read().await;
        let mut urls: Vec<String> = caches
            .get(name)
            .map(|c| c.entries.keys().cloned().collect())
            .unwrap_or_default();
        urls.sort();
        urls
    }

    // ---- notifications ----

    pub fn set_fail_show(&self, fail: bool) {
        self.fail_show.store(fail, Ordering::SeqCst);
    }

    pub async fn shown_notifications(&self) -> Vec<NotificationOptions> {
        self.shown.read().await.clone()
    }

    pub async fn closed_notifications(&self) -> Vec<DisplayedNotification> {
        self.closed.read().await.clone()
    }

    // ---- clients ----

    pub async fn add_client(&self, client: WindowClient) {
        self.clients.write().await.push(client);
    }

    pub async fn client(&self, id: &ClientId) -> Option<WindowClient> {
        self.clients.read().await.iter().find(|c| &c.id == id).cloned()
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    pub fn set_open_window_supported(&self, supported: bool) {
        self.open_window_supported.store(supported, Ordering::SeqCst);
    }

    pub fn claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }

    // ---- registration ----

    pub async fn state(&self) -> ServiceWorkerState {
        *self.state.read().await
    }

    pub async fn set_state(&self, state: ServiceWorkerState) {
        trace!(?state, "Worker state change");
        *self.state.write().await = state;
    }

    pub fn skipped_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    // ---- journal ----

    pub async fn journal(&self) -> Vec<PlatformCall> {
        self.journal.read().await.clone()
    }

    async fn record(&self, call: PlatformCall) {
        self.journal.write().await.push(call);
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Platform for InMemoryPlatform {
    fn caches(&self) -> &dyn CacheStore {
        self
    }

    fn network(&self) -> &dyn Network {
        self
    }

    fn notifications(&self) -> &dyn NotificationCenter {
        self
    }

    fn clients(&self) -> &dyn WindowClients {
        self
    }

    fn registration(&self) -> &dyn Registration {
        self
    }
}

#[async_trait]
impl CacheStore for InMemoryPlatform {
    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.caches.read().await.keys().cloned().collect())
    }

    async fn put_all(&self, name: &str, entries: Vec<(String, Response)>) -> Result<()> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(ServiceWorkerError::cache(format!("quota exceeded storing {name}")));
        }
        let count = entries.len();
        {
            // One write lock for the whole batch.
            let mut caches = self.caches.write().await;
            let cache = caches.entry(name.to_string()).or_default();
            cache.entries.extend(entries);
        }
        self.record(PlatformCall::CachePut {
            cache: name.to_string(),
            entries: count,
        })
        .await;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        if self.failing_deletes.read().await.contains(name) {
            return Err(ServiceWorkerError::cache(format!("cannot delete {name}")));
        }
        let existed = self.caches.write().await.remove(name).is_some();
        self.record(PlatformCall::CacheDelete(name.to_string())).await;
        Ok(existed)
    }
}

#[async_trait]
impl Network for InMemoryPlatform {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        self.delay().await;
        let url = request.url.to_string();
        self.record(PlatformCall::Fetch(url.clone())).await;

        if self.offline.load(Ordering::SeqCst) {
            return Err(ServiceWorkerError::network("network unreachable"));
        }
        if self.failing_urls.read().await.contains(&url) {
            return Err(ServiceWorkerError::network(format!("failed to fetch {url}")));
        }

        Ok(self
            .routes
            .read()
            .await
            .get(&url)
            .cloned()
            .unwrap_or_else(|| Response::new(StatusCode::NOT_FOUND, "")))
    }
}

#[async_trait]
impl NotificationCenter for InMemoryPlatform {
    async fn show(&self, options: &NotificationOptions) -> Result<()> {
        self.delay().await;
        if self.fail_show.load(Ordering::SeqCst) {
            return Err(ServiceWorkerError::notification("notification permission denied"));
        }
        self.shown.write().await.push(options.clone());
        self.record(PlatformCall::ShowNotification(options.tag.clone()))
            .await;
        Ok(())
    }

    async fn close(&self, notification: &DisplayedNotification) -> Result<()> {
        self.closed.write().await.push(notification.clone());
        self.record(PlatformCall::CloseNotification(notification.tag.clone()))
            .await;
        Ok(())
    }
}

#[async_trait]
impl WindowClients for InMemoryPlatform {
    async fn match_all(&self, options: ClientMatchOptions) -> Result<Vec<WindowClient>> {
        self.record(PlatformCall::MatchClients).await;
        Ok(self
            .clients
            .read()
            .await
            .iter()
            .filter(|c| c.matches(&options))
            .cloned()
            .collect())
    }

    async fn focus(&self, id: &ClientId) -> Result<()> {
        {
            let mut clients = self.clients.write().await;
            if !clients.iter().any(|c| &c.id == id) {
                return Err(ServiceWorkerError::clients(format!("no client {id}")));
            }
            for client in clients.iter_mut() {
                client.focused = &client.id == id;
            }
        }
        self.record(PlatformCall::Focus(id.clone())).await;
        Ok(())
    }

    fn supports_open_window(&self) -> bool {
        self.open_window_supported.load(Ordering::SeqCst)
    }

    async fn open_window(&self, url: &str) -> Result<Option<ClientId>> {
        if !self.supports_open_window() {
            return Err(ServiceWorkerError::clients("openWindow is not supported"));
        }
        let id = format!("client-{}", self.next_client.fetch_add(1, Ordering::Relaxed));
        let mut client = WindowClient::window(id, url);
        client.focused = true;
        let client_id = client.id.clone();
        {
            let mut clients = self.clients.write().await;
            for other in clients.iter_mut() {
                other.focused = false;
            }
            clients.push(client);
        }
        self.record(PlatformCall::OpenWindow(url.to_string())).await;
        Ok(Some(client_id))
    }

    async fn claim(&self) -> Result<()> {
        for client in self.clients.write().await.iter_mut() {
            client.controlled = true;
        }
        self.claimed.store(true, Ordering::SeqCst);
        self.record(PlatformCall::Claim).await;
        Ok(())
    }
}

#[async_trait]
impl Registration for InMemoryPlatform {
    async fn skip_waiting(&self) -> Result<()> {
        self.skip_waiting.store(true, Ordering::SeqCst);
        self.record(PlatformCall::SkipWaiting).await;
        Ok(())
    }
}
