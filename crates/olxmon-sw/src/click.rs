//! Notification click routing.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::notification::{DisplayedNotification, ACTION_DISMISS, ACTION_OPEN};
use crate::platform::{ClientId, ClientMatchOptions, NotificationCenter, WindowClients};

/// URL opened when the notification carries none.
pub const DEFAULT_TARGET_URL: &str = "/";

/// A click on a displayed notification.
#[derive(Debug, Clone, Default)]
pub struct NotificationClickEvent {
    /// Action button identifier; empty when the body was clicked.
    pub action: String,
    pub notification: DisplayedNotification,
}

impl NotificationClickEvent {
    pub fn new(action: impl Into<String>, notification: DisplayedNotification) -> Self {
        Self {
            action: action.into(),
            notification,
        }
    }
}

/// The user's choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
    /// The notification body itself.
    Default,
    Open,
    Dismiss,
    /// Unknown action identifier; routed like a body click.
    Other(String),
}

impl ClickAction {
    pub fn parse(action: &str) -> Self {
        match action {
            "" => Self::Default,
            ACTION_OPEN => Self::Open,
            ACTION_DISMISS => Self::Dismiss,
            other => Self::Other(other.to_string()),
        }
    }
}

/// What a click led to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum ClickOutcome {
    /// Closed without navigating.
    Dismissed,
    /// An existing window already showed the target.
    Focused { client: ClientId },
    /// A new window was opened at the target.
    Opened { url: String, client: Option<ClientId> },
    /// No matching window and the host cannot open one.
    OpenUnsupported { url: String },
}

/// Routes notification clicks to application windows.
pub struct NotificationClickRouter<'a> {
    notifications: &'a dyn NotificationCenter,
    clients: &'a dyn WindowClients,
}

impl<'a> NotificationClickRouter<'a> {
    pub fn new(notifications: &'a dyn NotificationCenter, clients: &'a dyn WindowClients) -> Self {
        Self {
            notifications,
            clients,
        }
    }

    /// Target URL for a notification, `/` when none is attached.
    pub fn target_url(notification: &DisplayedNotification) -> &str {
        notification
            .data
            .url
            .as_deref()
            .unwrap_or(DEFAULT_TARGET_URL)
    }

    /// Handle one click.
    ///
    /// The notification is closed before anything else happens. Window
    /// matching is exact string equality on the URL.
    pub async fn route(&self, event: &NotificationClickEvent) -> Result<ClickOutcome> {
        self.notifications.close(&event.notification).await?;

        let action = ClickAction::parse(&event.action);
        if action == ClickAction::Dismiss {
            debug!(tag = %event.notification.tag, "Notification dismissed");
            return Ok(ClickOutcome::Dismissed);
        }

        let target = Self::target_url(&event.notification);
        let windows = self
            .clients
            .match_all(ClientMatchOptions::all_windows())
            .await?;

        if let Some(window) = windows.iter().find(|w| w.url == target) {
            self.clients.focus(&window.id).await?;
            info!(client = %window.id, url = target, "Focused existing window");
            return Ok(ClickOutcome::Focused {
                client: window.id.clone(),
            });
        }

        if !self.clients.supports_open_window() {
            debug!(url = target, "Host cannot open windows");
            return Ok(ClickOutcome::OpenUnsupported {
                url: target.to_string(),
            });
        }

        let client = self.clients.open_window(target).await?;
        info!(url = target, "Opened new window");
        Ok(ClickOutcome::Opened {
            url: target.to_string(),
            client,
        })
    }
}
