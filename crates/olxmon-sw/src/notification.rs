//! Notification descriptions exchanged with the host tray.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Action identifier of the "open" button.
pub const ACTION_OPEN: &str = "open";
/// Action identifier of the "dismiss" button.
pub const ACTION_DISMISS: &str = "dismiss";

/// Data attached to a notification and handed back on click.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Application identifier of the ad; opaque to the agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_id: Option<JsonValue>,
}

/// An action button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// What the agent asks the host to display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOptions {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub tag: String,
    pub require_interaction: bool,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

/// A notification as the host reports it back on click.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayedNotification {
    pub title: String,
    pub tag: String,
    pub data: NotificationData,
}

impl From<&NotificationOptions> for DisplayedNotification {
    fn from(options: &NotificationOptions) -> Self {
        Self {
            title: options.title.clone(),
            tag: options.tag.clone(),
            data: options.data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_data_wire_names() {
        let data: NotificationData =
            serde_json::from_str(r#"{"url": "https://www.olx.com.br/item/1", "adId": 42}"#)
                .unwrap();
        assert_eq!(data.url.as_deref(), Some("https://www.olx.com.br/item/1"));
        assert_eq!(data.ad_id, Some(JsonValue::from(42)));

        let json = serde_json::to_value(NotificationData::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }
}
