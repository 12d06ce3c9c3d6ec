//! Log entries produced by evaluation (exposures) and by the host (custom
//! events), and the batch shape handed to the logging transport.
use std::collections::HashMap;

use derive_more::From;
use serde::Serialize;

use crate::snapshot::SecondaryExposure;
use crate::user::User;

pub(crate) const GATE_EXPOSURE_EVENT: &str = "gatekit::gate_exposure";
pub(crate) const CONFIG_EXPOSURE_EVENT: &str = "gatekit::config_exposure";
pub(crate) const LAYER_EXPOSURE_EVENT: &str = "gatekit::layer_exposure";
pub(crate) const DIAGNOSTICS_EVENT: &str = "gatekit::diagnostics";

/// Optional value attached to a custom event: a number or a free-form string.
#[derive(Debug, Clone, Serialize, PartialEq, From)]
#[serde(untagged)]
pub enum EventValue {
    /// A numeric value, e.g. a price or a duration.
    Number(f64),
    /// A free-form string value.
    Text(String),
}

impl From<&str> for EventValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// A single entry in the logging pipeline.
///
/// The embedded `user` is a copy taken at enqueue time (with private
/// attributes stripped), so later mutation of the client's user cannot
/// retroactively alter a queued entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    /// Name of the event: an exposure marker or a host-chosen name.
    pub event_name: String,
    /// Epoch milliseconds at enqueue time.
    pub time: i64,
    /// Optional value attached by the host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<EventValue>,
    /// String-to-string metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
    /// The user the entry was logged for, with private attributes stripped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// Evaluations the exposed result depended on. Exposure entries only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_exposures: Option<Vec<SecondaryExposure>>,
}

impl LogEvent {
    pub(crate) fn new(event_name: impl Into<String>) -> LogEvent {
        LogEvent {
            event_name: event_name.into(),
            time: chrono::Utc::now().timestamp_millis(),
            value: None,
            metadata: None,
            user: None,
            secondary_exposures: None,
        }
    }
}

/// SDK identification attached to every batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkMetadata {
    /// SDK language name.
    pub sdk_name: &'static str,
    /// SDK crate version.
    pub sdk_version: &'static str,
}

impl SdkMetadata {
    pub(crate) const CURRENT: SdkMetadata = SdkMetadata {
        sdk_name: "rust",
        sdk_version: env!("CARGO_PKG_VERSION"),
    };
}

/// An ordered batch of log entries, sent to the transport as a single unit.
/// Success or failure is reported for the batch as a whole.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogBatch {
    /// Entries in append order.
    pub events: Vec<LogEvent>,
    /// Which SDK produced the batch.
    pub sdk_metadata: SdkMetadata,
}

#[cfg(test)]
mod tests {
    use super::{EventValue, LogEvent};

    #[test]
    fn optional_fields_are_omitted_from_the_wire() {
        let event = LogEvent::new("test_event");
        let json = serde_json::to_value(&event).unwrap();

        let object = json.as_object().unwrap();
        assert_eq!(object.get("eventName").unwrap(), "test_event");
        assert!(object.contains_key("time"));
        assert!(!object.contains_key("value"));
        assert!(!object.contains_key("metadata"));
        assert!(!object.contains_key("user"));
        assert!(!object.contains_key("secondaryExposures"));
    }

    #[test]
    fn event_values_serialize_untagged() {
        assert_eq!(
            serde_json::to_value(EventValue::from(1.0)).unwrap(),
            serde_json::json!(1.0)
        );
        assert_eq!(
            serde_json::to_value(EventValue::from("1")).unwrap(),
            serde_json::json!("1")
        );
    }
}
