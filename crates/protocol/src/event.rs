use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Timestamp layout used by Asterisk (`2024-05-01T10:00:00.123+0000`).
const ARI_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// One event frame received on the event socket.
///
/// Only `type` is mandatory.  Every event-specific field, including embedded
/// resource payloads, lands in [`fields`](Self::fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AriEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asterisk_id: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl AriEvent {
    /// Decode a UTF-8 text frame.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Event-specific field by name.  `null` counts as absent.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// Parsed [`timestamp`](Self::timestamp), if present and well formed.
    pub fn parsed_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.timestamp.as_deref()?;
        DateTime::parse_from_str(raw, ARI_TIMESTAMP_FORMAT)
            .or_else(|_| DateTime::parse_from_rfc3339(raw))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_envelope_and_keeps_extra_fields() {
        let ev = AriEvent::from_json(
            r#"{"type":"ChannelHold","timestamp":"2024-05-01T10:00:00.123+0000",
                "application":"ivr","channel":{"id":"abc"},"musicclass":"default"}"#,
        )
        .unwrap();
        assert_eq!(ev.event_type, "ChannelHold");
        assert_eq!(ev.application.as_deref(), Some("ivr"));
        assert_eq!(ev.field("channel").unwrap()["id"], "abc");
        assert_eq!(ev.field("musicclass").unwrap(), "default");
        assert!(ev.field("type").is_none());
    }

    #[test]
    fn missing_type_is_an_error() {
        assert!(AriEvent::from_json(r#"{"channel":{"id":"abc"}}"#).is_err());
        assert!(AriEvent::from_json(r#"{"type":42}"#).is_err());
        assert!(AriEvent::from_json("not json").is_err());
    }

    #[test]
    fn null_field_is_absent() {
        let ev = AriEvent::from_json(r#"{"type":"ChannelVarset","channel":null}"#).unwrap();
        assert!(ev.field("channel").is_none());
    }

    #[test]
    fn parses_asterisk_timestamp() {
        let ev = AriEvent::from_json(
            r#"{"type":"StasisEnd","timestamp":"2024-05-01T10:00:00.123+0200"}"#,
        )
        .unwrap();
        let ts = ev.parsed_timestamp().unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 2 * 3600);
        assert_eq!(ts.timestamp_subsec_millis(), 123);
    }

    #[test]
    fn bad_timestamp_yields_none() {
        let ev = AriEvent::from_json(r#"{"type":"StasisEnd","timestamp":"yesterday"}"#).unwrap();
        assert!(ev.parsed_timestamp().is_none());
    }
}
