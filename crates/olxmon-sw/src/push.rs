//! Push payload interpretation and notification display.
//!
//! A push may arrive with no payload, with garbage, or with a JSON object
//! whose fields are all optional. Only the last case shows anything; the
//! first two complete quietly so the push subscription is never penalised
//! for a bad message.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{debug, info, warn};

use crate::config::NotificationDefaults;
use crate::error::{PayloadError, Result};
use crate::notification::{
    NotificationAction, NotificationData, NotificationOptions, ACTION_DISMISS, ACTION_OPEN,
};
use crate::platform::NotificationCenter;

/// A push event as delivered by the host.
#[derive(Debug, Clone, Default)]
pub struct PushEvent {
    pub data: Option<PushMessageData>,
}

impl PushEvent {
    /// A push with no payload attached.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A push carrying raw bytes.
    pub fn with_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            data: Some(PushMessageData(bytes.into())),
        }
    }

    /// A push carrying a JSON document.
    pub fn with_json(value: &JsonValue) -> Self {
        Self::with_bytes(value.to_string())
    }
}

/// Raw push message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessageData(pub Bytes);

impl PushMessageData {
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&self.0)
    }
}

/// The JSON object the backend pushes. Every field is optional.
///
/// Reading is lenient: a known field holding the wrong JSON type counts as
/// absent, so its default applies.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_id: Option<JsonValue>,
    /// Some senders group `url`/`adId` under `data`; flat keys win.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<NotificationData>,
}

impl NotificationPayload {
    /// Interpret a raw push body.
    pub fn parse(raw: &[u8]) -> std::result::Result<Self, PayloadError> {
        let value: JsonValue = serde_json::from_slice(raw)?;
        let kind = match &value {
            JsonValue::Object(fields) => return Ok(Self::from_fields(fields)),
            JsonValue::Null => "null",
            JsonValue::Bool(_) => "boolean",
            JsonValue::Number(_) => "number",
            JsonValue::String(_) => "string",
            JsonValue::Array(_) => "array",
        };
        Err(PayloadError::NotAnObject(kind))
    }

    fn from_fields(fields: &JsonMap<String, JsonValue>) -> Self {
        let nested = fields
            .get("data")
            .and_then(JsonValue::as_object)
            .map(|data| NotificationData {
                url: text_field(data, "url"),
                ad_id: opaque_field(data, "adId"),
            });

        Self {
            title: text_field(fields, "title"),
            body: text_field(fields, "body"),
            icon: text_field(fields, "icon"),
            badge: text_field(fields, "badge"),
            image: text_field(fields, "image"),
            tag: text_field(fields, "tag"),
            url: text_field(fields, "url"),
            ad_id: opaque_field(fields, "adId"),
            data: nested,
        }
    }

    /// Payload for a price alert, in the format the monitor backend sends.
    pub fn price_alert(
        ad_title: &str,
        old_price: &str,
        new_price: &str,
        target_price: f64,
        ad_url: &str,
        ad_id: i64,
        image_url: Option<&str>,
    ) -> Self {
        let short_title: String = ad_title.chars().take(50).collect();
        Self {
            title: Some("Alerta de Preço - OLX Monitor".to_string()),
            body: Some(format!(
                "{short_title}...\nPreço: R$ {old_price} → R$ {new_price}\nAlvo: R$ {target_price:.2}"
            )),
            icon: Some("/static/icon-192.png".to_string()),
            image: image_url.map(str::to_string),
            tag: Some(format!("price-alert-{ad_id}")),
            url: Some(ad_url.to_string()),
            ad_id: Some(JsonValue::from(ad_id)),
            ..Default::default()
        }
    }

    /// Build the notification description, filling gaps from `defaults`.
    ///
    /// Empty strings count as missing. The action list is always exactly
    /// open + dismiss.
    pub fn into_options(self, defaults: &NotificationDefaults) -> NotificationOptions {
        fn or_default(value: Option<String>, default: &str) -> String {
            value
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        }

        let nested = self.data.unwrap_or_default();
        let data = NotificationData {
            url: self.url.or(nested.url),
            ad_id: self.ad_id.or(nested.ad_id),
        };

        NotificationOptions {
            title: or_default(self.title, &defaults.title),
            body: or_default(self.body, &defaults.body),
            icon: or_default(self.icon, &defaults.icon),
            badge: or_default(self.badge, &defaults.badge),
            image: self.image.filter(|v| !v.is_empty()),
            tag: or_default(self.tag, &defaults.tag),
            require_interaction: true,
            data,
            actions: vec![
                NotificationAction {
                    action: ACTION_OPEN.to_string(),
                    title: defaults.open_label.clone(),
                },
                NotificationAction {
                    action: ACTION_DISMISS.to_string(),
                    title: defaults.dismiss_label.clone(),
                },
            ],
        }
    }
}

fn text_field(fields: &JsonMap<String, JsonValue>, key: &str) -> Option<String> {
    fields.get(key).and_then(JsonValue::as_str).map(str::to_string)
}

fn opaque_field(fields: &JsonMap<String, JsonValue>, key: &str) -> Option<JsonValue> {
    fields.get(key).filter(|v| !v.is_null()).cloned()
}

/// What a push event led to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum PushOutcome {
    /// No payload attached; nothing shown.
    NoPayload,
    /// Payload could not be interpreted; nothing shown.
    Malformed { reason: String },
    /// A notification was displayed.
    Shown { tag: String, title: String },
}

/// Turns push events into displayed notifications.
pub struct PushNotificationPresenter<'a> {
    defaults: &'a NotificationDefaults,
    notifications: &'a dyn NotificationCenter,
}

impl<'a> PushNotificationPresenter<'a> {
    pub fn new(defaults: &'a NotificationDefaults, notifications: &'a dyn NotificationCenter) -> Self {
        Self {
            defaults,
            notifications,
        }
    }

    /// Handle one push event.
    ///
    /// Payload problems are logged and reported as an outcome; a failure to
    /// display is returned as an error.
    pub async fn present(&self, event: &PushEvent) -> Result<PushOutcome> {
        let Some(data) = &event.data else {
            debug!("Push without payload, nothing to show");
            return Ok(PushOutcome::NoPayload);
        };

        let payload = match NotificationPayload::parse(data.bytes()) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, bytes = data.bytes().len(), "Ignoring unreadable push payload");
                return Ok(PushOutcome::Malformed {
                    reason: e.to_string(),
                });
            }
        };

        let options = payload.into_options(self.defaults);
        self.notifications.show(&options).await?;

        info!(tag = %options.tag, title = %options.title, "Notification shown");
        Ok(PushOutcome::Shown {
            tag: options.tag,
            title: options.title,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defaults() -> NotificationDefaults {
        NotificationDefaults::default()
    }

    #[test]
    fn test_parse_full_payload() {
        let raw = json!({
            "title": "Alerta",
            "body": "Preço caiu",
            "icon": "/static/custom.png",
            "image": "https://img.olx.com.br/1.jpg",
            "tag": "price-alert-7",
            "url": "https://www.olx.com.br/item/7",
            "adId": 7
        })
        .to_string();

        let payload = NotificationPayload::parse(raw.as_bytes()).unwrap();
        assert_eq!(payload.title.as_deref(), Some("Alerta"));
        assert_eq!(payload.ad_id, Some(json!(7)));
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let err = NotificationPayload::parse(b"not json").unwrap_err();
        assert!(matches!(err, PayloadError::Malformed(_)));
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let err = NotificationPayload::parse(b"[1, 2]").unwrap_err();
        assert!(matches!(err, PayloadError::NotAnObject("array")));

        let err = NotificationPayload::parse(b"\"hello\"").unwrap_err();
        assert!(matches!(err, PayloadError::NotAnObject("string")));
    }

    #[test]
    fn test_wrong_field_types_fall_back_to_defaults() {
        let raw = br#"{"title": "Alerta", "tag": 42, "image": false, "data": "x", "adId": null}"#;
        let payload = NotificationPayload::parse(raw).unwrap();
        assert_eq!(payload.title.as_deref(), Some("Alerta"));
        assert_eq!(payload.tag, None);
        assert_eq!(payload.image, None);
        assert_eq!(payload.data, None);
        assert_eq!(payload.ad_id, None);

        let options = payload.into_options(&defaults());
        assert_eq!(options.title, "Alerta");
        assert_eq!(options.tag, "olx-monitor");
    }

    #[test]
    fn test_defaults_applied() {
        let options = NotificationPayload::default().into_options(&defaults());
        assert_eq!(options.title, "OLX Monitor");
        assert_eq!(options.body, "Nova atualização disponível");
        assert_eq!(options.icon, "/static/icon-192.png");
        assert_eq!(options.badge, "/static/icon-192.png");
        assert_eq!(options.tag, "olx-monitor");
        assert_eq!(options.image, None);
        assert_eq!(options.data, NotificationData::default());
    }

    #[test]
    fn test_empty_strings_fall_back() {
        let payload = NotificationPayload {
            title: Some(String::new()),
            body: Some(String::new()),
            ..Default::default()
        };
        let options = payload.into_options(&defaults());
        assert_eq!(options.title, "OLX Monitor");
        assert_eq!(options.body, "Nova atualização disponível");
    }

    #[test]
    fn test_fixed_actions_and_interaction() {
        let options = NotificationPayload::default().into_options(&defaults());
        assert!(options.require_interaction);
        let ids: Vec<_> = options.actions.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(ids, vec![ACTION_OPEN, ACTION_DISMISS]);
        assert_eq!(options.actions[0].title, "Ver anúncio");
        assert_eq!(options.actions[1].title, "Dispensar");
    }

    #[test]
    fn test_extra_actions_ignored() {
        let raw = br#"{"actions": [{"action": "buy", "title": "Comprar"}]}"#;
        let options = NotificationPayload::parse(raw).unwrap().into_options(&defaults());
        assert_eq!(options.actions.len(), 2);
    }

    #[test]
    fn test_flat_url_wins_over_nested() {
        let raw = br#"{"url": "https://a/", "data": {"url": "https://b/", "adId": "x"}}"#;
        let options = NotificationPayload::parse(raw).unwrap().into_options(&defaults());
        assert_eq!(options.data.url.as_deref(), Some("https://a/"));
        assert_eq!(options.data.ad_id, Some(json!("x")));
    }

    #[test]
    fn test_price_alert_payload() {
        let payload = NotificationPayload::price_alert(
            "Bicicleta aro 29 quadro alumínio",
            "1.200,00",
            "950,00",
            1000.0,
            "https://www.olx.com.br/item/99",
            99,
            None,
        );
        assert_eq!(payload.tag.as_deref(), Some("price-alert-99"));
        assert_eq!(
            payload.body.as_deref(),
            Some("Bicicleta aro 29 quadro alumínio...\nPreço: R$ 1.200,00 → R$ 950,00\nAlvo: R$ 1000.00")
        );

        let wire = serde_json::to_value(&payload).unwrap();
        assert_eq!(wire["adId"], json!(99));
        assert!(wire.get("image").is_none());

        let reparsed = NotificationPayload::parse(wire.to_string().as_bytes()).unwrap();
        assert_eq!(reparsed, payload);
    }

    #[test]
    fn test_price_alert_truncates_title() {
        let long_title = "á".repeat(80);
        let payload =
            NotificationPayload::price_alert(&long_title, "1", "2", 3.0, "https://a/", 1, None);
        let body = payload.body.unwrap();
        assert!(body.starts_with(&format!("{}...", "á".repeat(50))));
    }

    #[test]
    fn test_push_message_data() {
        let event = PushEvent::with_json(&json!({"title": "x"}));
        let data = event.data.unwrap();
        assert_eq!(data.text(), r#"{"title":"x"}"#);
        let value: JsonValue = data.json().unwrap();
        assert_eq!(value["title"], "x");
    }
}
