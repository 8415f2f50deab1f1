//! Raw focus events observed on a device.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed focus sample.
///
/// Events are immutable once written and ordered by timestamp. The observer
/// (outside this crate) emits one sample per polling tick; clustering them
/// into sessions is the sessionizer's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Unique identifier, also the primary key on the remote store.
    pub id: String,
    /// When the sample was taken.
    pub timestamp: DateTime<Utc>,
    /// The device that observed the sample.
    pub device_id: String,
    /// Package or executable identity of the focused application.
    pub app_pkg_name: String,
    /// Focused window title, when the platform exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_title: Option<String>,
    /// Whether the user was idle at sample time.
    #[serde(default)]
    pub is_idle: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_roundtrip() {
        let event = RawEvent {
            id: "event-1".to_string(),
            timestamp: "2025-06-01T10:00:00Z".parse().unwrap(),
            device_id: "laptop".to_string(),
            app_pkg_name: "com.example.editor".to_string(),
            window_title: Some("main.rs".to_string()),
            is_idle: false,
        };

        let json = serde_json::to_string(&event).unwrap();
        let parsed: RawEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn event_optional_fields_default() {
        let json = r#"{
            "id": "event-2",
            "timestamp": "2025-06-01T10:00:00Z",
            "device_id": "laptop",
            "app_pkg_name": "com.example.editor"
        }"#;
        let event: RawEvent = serde_json::from_str(json).unwrap();
        assert!(event.window_title.is_none());
        assert!(!event.is_idle);
    }
}
