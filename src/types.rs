use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_NOTIFICATION_ICON, NOTIFICATION_TAG, NOTIFICATION_VIBRATION_PATTERN,
};
use crate::error::{invalid_payload, MessagingResult};

/// Visible part of a push payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Wire contract of a push delivery, shared verbatim by the foreground and
/// background paths. A payload with no `notification` entry is a valid
/// data-only push.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, String>>,
}

impl MessagePayload {
    pub fn from_json(raw: &str) -> MessagingResult<Self> {
        serde_json::from_str(raw)
            .map_err(|err| invalid_payload(format!("Malformed push payload: {err}")))
    }

    /// Value of a `data` entry, if the payload carries one.
    pub fn data_value(&self, key: &str) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|data| data.get(key))
            .map(String::as_str)
    }
}

/// Fully resolved "show notification" command handed to the platform.
///
/// Both delivery paths build this through [`notification_request`], which is
/// what keeps their rendered output identical for the same payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShowNotificationRequest {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub tag: String,
    pub vibrate: Vec<u32>,
    pub data: HashMap<String, String>,
}

/// Resolves a payload into the notification both paths display.
///
/// Returns `None` for data-only pushes; those stay invisible unless the
/// caller builds its own notification from `data`.
pub fn notification_request(payload: &MessagePayload) -> Option<ShowNotificationRequest> {
    let notification = payload.notification.as_ref()?;
    Some(ShowNotificationRequest {
        title: notification.title.clone().unwrap_or_default(),
        body: notification.body.clone().unwrap_or_default(),
        icon: DEFAULT_NOTIFICATION_ICON.to_string(),
        tag: NOTIFICATION_TAG.to_string(),
        vibrate: NOTIFICATION_VIBRATION_PATTERN.to_vec(),
        data: payload.data.clone().unwrap_or_default(),
    })
}

#[cfg(not(target_arch = "wasm32"))]
pub type MessageHandler = Arc<dyn Fn(MessagePayload) + Send + Sync + 'static>;
#[cfg(target_arch = "wasm32")]
pub type MessageHandler = Arc<dyn Fn(MessagePayload) + 'static>;

#[cfg(not(target_arch = "wasm32"))]
pub type Unsubscribe = Box<dyn FnOnce() + Send + 'static>;
#[cfg(target_arch = "wasm32")]
pub type Unsubscribe = Box<dyn FnOnce() + 'static>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_only_payload_parses_and_shows_nothing() {
        let payload = MessagePayload::from_json(r#"{"data":{"kind":"weekly-summary"}}"#).unwrap();
        assert!(payload.notification.is_none());
        assert_eq!(payload.data_value("kind"), Some("weekly-summary"));
        assert!(notification_request(&payload).is_none());
    }

    #[test]
    fn missing_fields_get_defaults() {
        let payload = MessagePayload::from_json(r#"{"notification":{"title":"Lunch"}}"#).unwrap();
        let request = notification_request(&payload).unwrap();
        assert_eq!(request.title, "Lunch");
        assert_eq!(request.body, "");
        assert_eq!(request.icon, DEFAULT_NOTIFICATION_ICON);
        assert_eq!(request.tag, NOTIFICATION_TAG);
        assert_eq!(request.vibrate, NOTIFICATION_VIBRATION_PATTERN.to_vec());
    }

    #[test]
    fn malformed_payload_is_an_invalid_payload_error() {
        let err = MessagePayload::from_json("not json").unwrap_err();
        assert_eq!(err.code_str(), "push/invalid-payload");
    }
}
