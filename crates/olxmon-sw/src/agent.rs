//! Event model and dispatch table.
//!
//! The host delivers one event at a time. [`ServiceWorkerAgent::dispatch`]
//! looks up the handler for the event's kind and returns an
//! [`ExtendableEvent`] whose lifetime future covers all of the handler's
//! work. The host must await it before treating the event as handled;
//! anything not covered by that future may be lost when the host suspends
//! the agent.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use hashbrown::HashMap;
use tracing::{debug, info_span, Instrument};

use crate::click::{ClickOutcome, NotificationClickEvent, NotificationClickRouter};
use crate::config::AgentConfig;
use crate::error::{Result, ServiceWorkerError};
use crate::fetch::FetchInterceptor;
use crate::lifecycle::{ActivateReport, InstallReport, LifecycleManager};
use crate::net::{Request, Response};
use crate::platform::Platform;
use crate::push::{PushEvent, PushNotificationPresenter, PushOutcome};

/// Kinds of events the host can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Install,
    Activate,
    Fetch,
    Push,
    NotificationClick,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Install,
        EventKind::Activate,
        EventKind::Fetch,
        EventKind::Push,
        EventKind::NotificationClick,
    ];

    /// Platform event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Install => "install",
            EventKind::Activate => "activate",
            EventKind::Fetch => "fetch",
            EventKind::Push => "push",
            EventKind::NotificationClick => "notificationclick",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event with its data.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    Install,
    Activate,
    Fetch(Request),
    Push(PushEvent),
    NotificationClick(NotificationClickEvent),
}

impl AgentEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AgentEvent::Install => EventKind::Install,
            AgentEvent::Activate => EventKind::Activate,
            AgentEvent::Fetch(_) => EventKind::Fetch,
            AgentEvent::Push(_) => EventKind::Push,
            AgentEvent::NotificationClick(_) => EventKind::NotificationClick,
        }
    }
}

/// What a handler produced once its lifetime future settled.
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    /// The response handed to the page (`respondWith`).
    Responded(Response),
    Pushed(PushOutcome),
    Clicked(ClickOutcome),
}

/// The handler's total asynchronous work (`waitUntil` / `respondWith`).
pub type LifetimeExtension = Pin<Box<dyn Future<Output = Result<EventOutcome>> + Send + 'static>>;

/// Shared, read-only state every handler receives.
#[derive(Clone)]
pub struct HandlerContext {
    pub config: Arc<AgentConfig>,
    pub platform: Arc<dyn Platform>,
}

/// A handler in the dispatch table.
pub type Handler = fn(HandlerContext, AgentEvent) -> LifetimeExtension;

/// A dispatched event whose work may still be in flight.
pub struct ExtendableEvent {
    kind: EventKind,
    lifetime: LifetimeExtension,
}

impl ExtendableEvent {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Resolve once every operation the handler started has completed.
    pub async fn wait_until(self) -> Result<EventOutcome> {
        self.lifetime.await
    }
}

impl fmt::Debug for ExtendableEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendableEvent")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// The service worker: configuration, platform and dispatch table.
pub struct ServiceWorkerAgent {
    context: HandlerContext,
    handlers: HashMap<EventKind, Handler>,
}

impl ServiceWorkerAgent {
    /// Build an agent with every handler registered.
    pub fn new(config: AgentConfig, platform: Arc<dyn Platform>) -> Result<Self> {
        config.validate()?;

        let mut handlers: HashMap<EventKind, Handler> = HashMap::new();
        handlers.insert(EventKind::Install, on_install);
        handlers.insert(EventKind::Activate, on_activate);
        handlers.insert(EventKind::Fetch, on_fetch);
        handlers.insert(EventKind::Push, on_push);
        handlers.insert(EventKind::NotificationClick, on_notification_click);

        Ok(Self {
            context: HandlerContext {
                config: Arc::new(config),
                platform,
            },
            handlers,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.context.config
    }

    /// Whether a handler is registered for this kind.
    pub fn handles(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Hand an event to its handler.
    pub fn dispatch(&self, event: AgentEvent) -> ExtendableEvent {
        let kind = event.kind();
        let span = info_span!("sw_event", event = kind.as_str());

        let lifetime: LifetimeExtension = match self.handlers.get(&kind) {
            Some(handler) => {
                debug!(parent: &span, "Dispatching");
                Box::pin(handler(self.context.clone(), event).instrument(span))
            }
            None => Box::pin(async move {
                Err(ServiceWorkerError::UnexpectedEvent {
                    expected: "a registered event",
                    actual: kind.as_str(),
                })
            }),
        };

        ExtendableEvent { kind, lifetime }
    }

    /// Dispatch and wait for the event's lifetime to end.
    pub async fn handle(&self, event: AgentEvent) -> Result<EventOutcome> {
        self.dispatch(event).wait_until().await
    }
}

fn unexpected(expected: EventKind, event: &AgentEvent) -> ServiceWorkerError {
    ServiceWorkerError::UnexpectedEvent {
        expected: expected.as_str(),
        actual: event.kind().as_str(),
    }
}

fn on_install(ctx: HandlerContext, event: AgentEvent) -> LifetimeExtension {
    Box::pin(async move {
        let AgentEvent::Install = &event else {
            return Err(unexpected(EventKind::Install, &event));
        };
        LifecycleManager::new(&ctx.config, ctx.platform.as_ref())
            .install()
            .await
            .map(EventOutcome::Installed)
    })
}

fn on_activate(ctx: HandlerContext, event: AgentEvent) -> LifetimeExtension {
    Box::pin(async move {
        let AgentEvent::Activate = &event else {
            return Err(unexpected(EventKind::Activate, &event));
        };
        LifecycleManager::new(&ctx.config, ctx.platform.as_ref())
            .activate()
            .await
            .map(EventOutcome::Activated)
    })
}

fn on_fetch(ctx: HandlerContext, event: AgentEvent) -> LifetimeExtension {
    Box::pin(async move {
        let AgentEvent::Fetch(request) = &event else {
            return Err(unexpected(EventKind::Fetch, &event));
        };
        let response = FetchInterceptor::new(ctx.platform.network(), &ctx.config.fallback)
            .respond(request)
            .await;
        Ok(EventOutcome::Responded(response))
    })
}

fn on_push(ctx: HandlerContext, event: AgentEvent) -> LifetimeExtension {
    Box::pin(async move {
        let AgentEvent::Push(push) = &event else {
            return Err(unexpected(EventKind::Push, &event));
        };
        PushNotificationPresenter::new(&ctx.config.notifications, ctx.platform.notifications())
            .present(push)
            .await
            .map(EventOutcome::Pushed)
    })
}

fn on_notification_click(ctx: HandlerContext, event: AgentEvent) -> LifetimeExtension {
    Box::pin(async move {
        let AgentEvent::NotificationClick(click) = &event else {
            return Err(unexpected(EventKind::NotificationClick, &event));
        };
        NotificationClickRouter::new(ctx.platform.notifications(), ctx.platform.clients())
            .route(click)
            .await
            .map(EventOutcome::Clicked)
    })
}
