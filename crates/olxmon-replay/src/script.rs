//! Event scripts and the runner that drives them.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use http::Method;
use olxmon_sw::{
    AgentConfig, AgentEvent, CacheStore, DisplayedNotification, EventOutcome, HttpNetwork,
    InMemoryPlatform, Network, NotificationCenter, NotificationClickEvent, NotificationData,
    Platform, PushEvent, Registration, Request, ServiceWorkerAgent, ServiceWorkerState,
    WindowClient, WindowClients,
};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};

/// A replay script.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Script {
    /// Windows open before the first event.
    pub clients: Vec<WindowClient>,
    /// URLs whose fetch fails as if unreachable.
    pub fail_urls: Vec<String>,
    /// Whether the whole network is unreachable.
    pub offline: bool,
    pub events: Vec<ScriptedEvent>,
}

/// One platform event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScriptedEvent {
    Install,
    Activate,
    Fetch {
        url: String,
        #[serde(default)]
        method: Option<String>,
    },
    Push {
        /// JSON payload.
        #[serde(default)]
        payload: Option<JsonValue>,
        /// Raw payload text, sent verbatim.
        #[serde(default)]
        raw: Option<String>,
    },
    #[serde(rename = "notificationclick")]
    NotificationClick {
        #[serde(default)]
        action: String,
        #[serde(default)]
        tag: String,
        #[serde(default)]
        data: NotificationData,
    },
}

impl Script {
    pub fn from_json_file(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))
    }
}

/// In-memory host, optionally with a real network.
pub struct ReplayPlatform {
    memory: Arc<InMemoryPlatform>,
    http: Option<HttpNetwork>,
}

impl Platform for ReplayPlatform {
    fn caches(&self) -> &dyn CacheStore {
        self.memory.as_ref()
    }

    fn network(&self) -> &dyn Network {
        match &self.http {
            Some(http) => http,
            None => self.memory.as_ref(),
        }
    }

    fn notifications(&self) -> &dyn NotificationCenter {
        self.memory.as_ref()
    }

    fn clients(&self) -> &dyn WindowClients {
        self.memory.as_ref()
    }

    fn registration(&self) -> &dyn Registration {
        self.memory.as_ref()
    }
}

/// Drives a script through the agent, enforcing platform event ordering.
pub struct Runner {
    agent: ServiceWorkerAgent,
    memory: Arc<InMemoryPlatform>,
}

/// Summary of one replayed event.
#[derive(Debug, Clone)]
pub struct EventReport {
    pub event: &'static str,
    pub ok: bool,
    pub detail: JsonValue,
}

impl EventReport {
    pub fn to_json(&self) -> JsonValue {
        json!({ "event": self.event, "ok": self.ok, "detail": self.detail })
    }
}

impl Runner {
    /// Build the host for `script`. With `http` set, fetches hit the real network.
    pub async fn new(
        config: AgentConfig,
        script: &Script,
        http: Option<HttpNetwork>,
    ) -> anyhow::Result<Self> {
        let memory = Arc::new(InMemoryPlatform::new());

        let shell = config.precache_urls()?;
        memory
            .route_all_ok(shell.iter().map(|url| url.as_str()))
            .await;
        for url in &script.fail_urls {
            memory.fail_url(url).await;
        }
        memory.set_offline(script.offline);
        for client in &script.clients {
            memory.add_client(client.clone()).await;
        }

        let platform = Arc::new(ReplayPlatform {
            memory: memory.clone(),
            http,
        });
        let agent = ServiceWorkerAgent::new(config, platform)?;
        Ok(Self { agent, memory })
    }

    /// Replay every event; stops after the first failure.
    pub async fn run(&self, events: &[ScriptedEvent]) -> Vec<EventReport> {
        let mut reports = Vec::with_capacity(events.len());
        for scripted in events {
            let report = self.replay(scripted).await;
            let failed = !report.ok;
            reports.push(report);
            if failed {
                warn!("Stopping replay after failed event");
                break;
            }
        }
        reports
    }

    async fn replay(&self, scripted: &ScriptedEvent) -> EventReport {
        let event = match self.to_agent_event(scripted) {
            Ok(event) => event,
            Err(e) => {
                return EventReport {
                    event: event_name(scripted),
                    ok: false,
                    detail: json!({ "error": e.to_string() }),
                }
            }
        };
        let name = event.kind().as_str();

        let result = match self.admit(&event).await {
            Ok(()) => self.deliver(event).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(detail) => EventReport {
                event: name,
                ok: true,
                detail,
            },
            Err(e) => EventReport {
                event: name,
                ok: false,
                detail: json!({ "error": format!("{e:#}") }),
            },
        }
    }

    /// Check the event is allowed in the current worker state.
    async fn admit(&self, event: &AgentEvent) -> anyhow::Result<()> {
        let state = self.memory.state().await;
        let allowed = match event {
            AgentEvent::Install => state == ServiceWorkerState::Parsed,
            AgentEvent::Activate => matches!(
                state,
                ServiceWorkerState::Installed | ServiceWorkerState::Activated
            ),
            _ => state == ServiceWorkerState::Activated,
        };
        if !allowed {
            bail!("{} not allowed while worker is {state:?}", event.kind());
        }
        Ok(())
    }

    async fn deliver(&self, event: AgentEvent) -> anyhow::Result<JsonValue> {
        let (running, done) = match event {
            AgentEvent::Install => (ServiceWorkerState::Installing, ServiceWorkerState::Installed),
            AgentEvent::Activate => (ServiceWorkerState::Activating, ServiceWorkerState::Activated),
            _ => {
                let outcome = self.agent.handle(event).await?;
                return summarize(outcome);
            }
        };

        self.memory.set_state(running).await;
        match self.agent.handle(event).await {
            Ok(outcome) => {
                self.memory.set_state(done).await;
                info!(state = ?done, "Worker state advanced");
                summarize(outcome)
            }
            Err(e) => {
                self.memory.set_state(ServiceWorkerState::Redundant).await;
                Err(anyhow!(e).context("worker is now redundant"))
            }
        }
    }

    fn to_agent_event(&self, scripted: &ScriptedEvent) -> anyhow::Result<AgentEvent> {
        Ok(match scripted {
            ScriptedEvent::Install => AgentEvent::Install,
            ScriptedEvent::Activate => AgentEvent::Activate,
            ScriptedEvent::Fetch { url, method } => {
                let url = self
                    .agent
                    .config()
                    .scope
                    .join(url)
                    .with_context(|| format!("bad fetch url {url:?}"))?;
                let mut request = Request::get(url);
                if let Some(method) = method {
                    request.method = Method::from_bytes(method.as_bytes())
                        .with_context(|| format!("bad method {method:?}"))?;
                }
                AgentEvent::Fetch(request)
            }
            ScriptedEvent::Push { payload, raw } => AgentEvent::Push(match (payload, raw) {
                (Some(payload), _) => PushEvent::with_json(payload),
                (None, Some(raw)) => PushEvent::with_bytes(raw.clone()),
                (None, None) => PushEvent::empty(),
            }),
            ScriptedEvent::NotificationClick { action, tag, data } => {
                AgentEvent::NotificationClick(NotificationClickEvent::new(
                    action.clone(),
                    DisplayedNotification {
                        title: String::new(),
                        tag: tag.clone(),
                        data: data.clone(),
                    },
                ))
            }
        })
    }
}

fn event_name(scripted: &ScriptedEvent) -> &'static str {
    match scripted {
        ScriptedEvent::Install => "install",
        ScriptedEvent::Activate => "activate",
        ScriptedEvent::Fetch { .. } => "fetch",
        ScriptedEvent::Push { .. } => "push",
        ScriptedEvent::NotificationClick { .. } => "notificationclick",
    }
}

fn summarize(outcome: EventOutcome) -> anyhow::Result<JsonValue> {
    Ok(match outcome {
        EventOutcome::Installed(report) => serde_json::to_value(report)?,
        EventOutcome::Activated(report) => serde_json::to_value(report)?,
        EventOutcome::Responded(response) => json!({
            "status": response.status.as_u16(),
            "statusText": response.status_text,
            "bodyBytes": response.body.len(),
        }),
        EventOutcome::Pushed(outcome) => serde_json::to_value(outcome)?,
        EventOutcome::Clicked(outcome) => serde_json::to_value(outcome)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(json: &str) -> Script {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_script() {
        let script = script(
            r#"{
                "clients": [{"id": "tab-1", "url": "http://localhost:8080/"}],
                "events": [
                    {"type": "install"},
                    {"type": "activate"},
                    {"type": "fetch", "url": "/static/manifest.json"},
                    {"type": "push", "payload": {"title": "Oi"}},
                    {"type": "notificationclick", "action": "open", "data": {"url": "/"}}
                ]
            }"#,
        );
        assert_eq!(script.clients.len(), 1);
        assert!(!script.clients[0].controlled);
        assert_eq!(script.events.len(), 5);
        assert!(matches!(
            script.events[4],
            ScriptedEvent::NotificationClick { ref action, .. } if action == "open"
        ));
    }

    #[tokio::test]
    async fn test_full_replay() {
        let script = script(
            r#"{
                "clients": [{"id": "tab-1", "url": "/"}],
                "events": [
                    {"type": "install"},
                    {"type": "activate"},
                    {"type": "fetch", "url": "/static/icon-192.png"},
                    {"type": "push", "payload": {"url": "/"}},
                    {"type": "notificationclick", "data": {"url": "/"}}
                ]
            }"#,
        );
        let runner = Runner::new(AgentConfig::default(), &script, None)
            .await
            .unwrap();
        let reports = runner.run(&script.events).await;

        assert_eq!(reports.len(), 5);
        assert!(reports.iter().all(|r| r.ok), "{reports:?}");
        assert_eq!(reports[2].detail["status"], 200);
        assert_eq!(reports[3].detail["result"], "shown");
        assert_eq!(reports[4].detail["result"], "focused");
        assert_eq!(runner.memory.state().await, ServiceWorkerState::Activated);
    }

    #[tokio::test]
    async fn test_failed_install_makes_worker_redundant() {
        let script = script(
            r#"{
                "failUrls": ["http://localhost:8080/static/icon-512.png"],
                "events": [{"type": "install"}, {"type": "activate"}]
            }"#,
        );
        let runner = Runner::new(AgentConfig::default(), &script, None)
            .await
            .unwrap();
        let reports = runner.run(&script.events).await;

        assert_eq!(reports.len(), 1);
        assert!(!reports[0].ok);
        assert_eq!(runner.memory.state().await, ServiceWorkerState::Redundant);
    }

    #[tokio::test]
    async fn test_fetch_before_activation_is_rejected() {
        let script = script(r#"{"events": [{"type": "fetch", "url": "/"}]}"#);
        let runner = Runner::new(AgentConfig::default(), &script, None)
            .await
            .unwrap();
        let reports = runner.run(&script.events).await;

        assert!(!reports[0].ok);
        assert_eq!(reports[0].event, "fetch");
    }

    #[tokio::test]
    async fn test_offline_fetch_reports_fallback() {
        let script = script(
            r#"{"events": [{"type": "install"}, {"type": "activate"}]}"#,
        );
        let runner = Runner::new(AgentConfig::default(), &script, None)
            .await
            .unwrap();
        runner.run(&script.events).await;

        runner.memory.set_offline(true);
        let reports = runner
            .run(&[ScriptedEvent::Fetch {
                url: "/api/ads".to_string(),
                method: None,
            }])
            .await;
        assert_eq!(reports[0].detail["status"], 503);
        assert_eq!(reports[0].detail["statusText"], "Service Unavailable");
    }
}
