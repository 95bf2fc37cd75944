//! Event model: which fields each event type declares, and with what type.
//!
//! This is the boundary with schema introspection.  The realtime core only
//! asks two questions of it: "is this event type known?" and "which of its
//! fields are declared as a resource type?".

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resource::ResourceKind;

/// Errors raised while reading a Swagger `events.json` document.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document has no `models` object")]
    MissingModels,

    #[error("model {model}: {reason}")]
    InvalidModel { model: String, reason: String },
}

/// A field declared by an event model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub data_type: String,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    /// The resource kind this field embeds, if its declared type is one.
    pub fn resource_kind(&self) -> Option<ResourceKind> {
        self.data_type.parse().ok()
    }
}

/// Declared shape of one event type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventModel {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

impl EventModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        self.fields.push(FieldDecl::new(name, data_type));
        self
    }

    /// Fields whose declared type is a known resource kind.
    pub fn resource_fields(&self) -> impl Iterator<Item = (&FieldDecl, ResourceKind)> {
        self.fields
            .iter()
            .filter_map(|f| f.resource_kind().map(|k| (f, k)))
    }
}

/// Event models keyed by event type name.
#[derive(Debug, Clone, Default)]
pub struct ApiSchema {
    events: HashMap<String, EventModel>,
}

impl ApiSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a model.  Returns `&mut Self` for chaining.
    pub fn insert(&mut self, model: EventModel) -> &mut Self {
        self.events.insert(model.name.clone(), model);
        self
    }

    pub fn event(&self, name: &str) -> Option<&EventModel> {
        self.events.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.events.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Sorted event type names.
    pub fn event_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.events.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Parse the text of a Swagger 1.2 `events.json` document.
    pub fn from_events_json(text: &str) -> Result<Self, SchemaError> {
        let doc: Value = serde_json::from_str(text)?;
        Self::from_events_doc(&doc)
    }

    /// Build the schema from a decoded Swagger 1.2 `events.json` document.
    ///
    /// Each entry of `models` becomes an [`EventModel`]; property types are
    /// read from `type` (or `dataType`).  Models that `extends` another one
    /// inherit its properties first.
    pub fn from_events_doc(doc: &Value) -> Result<Self, SchemaError> {
        let models = doc
            .get("models")
            .and_then(Value::as_object)
            .ok_or(SchemaError::MissingModels)?;

        let mut schema = Self::new();
        for name in models.keys() {
            let mut fields = Vec::new();
            let mut seen = HashSet::new();
            collect_fields(models, name, &mut fields, &mut seen)?;
            schema.insert(EventModel {
                name: name.clone(),
                fields,
            });
        }
        Ok(schema)
    }
}

fn collect_fields(
    models: &serde_json::Map<String, Value>,
    name: &str,
    out: &mut Vec<FieldDecl>,
    seen: &mut HashSet<String>,
) -> Result<(), SchemaError> {
    if !seen.insert(name.to_string()) {
        return Err(SchemaError::InvalidModel {
            model: name.to_string(),
            reason: "cyclic `extends` chain".into(),
        });
    }

    let Some(model) = models.get(name) else {
        return Err(SchemaError::InvalidModel {
            model: name.to_string(),
            reason: "extends an undefined model".into(),
        });
    };

    if let Some(parent) = model.get("extends").and_then(Value::as_str) {
        collect_fields(models, parent, out, seen)?;
    }

    let Some(props) = model.get("properties") else {
        return Ok(());
    };
    let props = props.as_object().ok_or_else(|| SchemaError::InvalidModel {
        model: name.to_string(),
        reason: "`properties` is not an object".into(),
    })?;

    for (field, decl) in props {
        let data_type = decl
            .get("type")
            .or_else(|| decl.get("dataType"))
            .and_then(Value::as_str)
            .unwrap_or("object");
        out.retain(|f| f.name != *field);
        out.push(FieldDecl::new(field.clone(), data_type));
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Built-in catalogue
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const BUILTIN_EVENTS: &[(&str, &[(&str, &str)])] = &[
    ("ApplicationMoveFailed", &[("channel", "Channel"), ("destination", "string")]),
    ("ApplicationReplaced", &[]),
    (
        "BridgeAttendedTransfer",
        &[
            ("transferer_first_leg", "Channel"),
            ("transferer_second_leg", "Channel"),
            ("replace_channel", "Channel"),
            ("transferee", "Channel"),
            ("transfer_target", "Channel"),
            ("transferer_first_leg_bridge", "Bridge"),
            ("transferer_second_leg_bridge", "Bridge"),
            ("destination_threeway_channel", "Channel"),
            ("destination_threeway_bridge", "Bridge"),
            ("destination_link_first_leg", "Channel"),
            ("destination_link_second_leg", "Channel"),
            ("result", "string"),
        ],
    ),
    (
        "BridgeBlindTransfer",
        &[
            ("channel", "Channel"),
            ("replace_channel", "Channel"),
            ("transferee", "Channel"),
            ("bridge", "Bridge"),
            ("exten", "string"),
            ("context", "string"),
            ("result", "string"),
        ],
    ),
    ("BridgeCreated", &[("bridge", "Bridge")]),
    ("BridgeDestroyed", &[("bridge", "Bridge")]),
    ("BridgeMerged", &[("bridge", "Bridge"), ("bridge_from", "Bridge")]),
    ("BridgeVideoSourceChanged", &[("bridge", "Bridge"), ("old_video_source_id", "string")]),
    ("ChannelCallerId", &[("channel", "Channel"), ("caller_presentation", "int")]),
    ("ChannelConnectedLine", &[("channel", "Channel")]),
    ("ChannelCreated", &[("channel", "Channel")]),
    (
        "ChannelDestroyed",
        &[("channel", "Channel"), ("cause", "int"), ("cause_txt", "string")],
    ),
    (
        "ChannelDialplan",
        &[("channel", "Channel"), ("dialplan_app", "string"), ("dialplan_app_data", "string")],
    ),
    ("ChannelDtmfReceived", &[("channel", "Channel"), ("digit", "string"), ("duration_ms", "int")]),
    ("ChannelEnteredBridge", &[("bridge", "Bridge"), ("channel", "Channel")]),
    (
        "ChannelHangupRequest",
        &[("channel", "Channel"), ("cause", "int"), ("soft", "boolean")],
    ),
    ("ChannelHold", &[("channel", "Channel"), ("musicclass", "string")]),
    ("ChannelLeftBridge", &[("bridge", "Bridge"), ("channel", "Channel")]),
    ("ChannelStateChange", &[("channel", "Channel")]),
    ("ChannelTalkingFinished", &[("channel", "Channel"), ("duration", "int")]),
    ("ChannelTalkingStarted", &[("channel", "Channel")]),
    ("ChannelUnhold", &[("channel", "Channel")]),
    (
        "ChannelUserevent",
        &[
            ("eventname", "string"),
            ("channel", "Channel"),
            ("bridge", "Bridge"),
            ("endpoint", "Endpoint"),
            ("userevent", "object"),
        ],
    ),
    (
        "ChannelVarset",
        &[("variable", "string"), ("value", "string"), ("channel", "Channel")],
    ),
    ("ContactStatusChange", &[("endpoint", "Endpoint"), ("contact_info", "ContactInfo")]),
    ("DeviceStateChanged", &[("device_state", "DeviceState")]),
    (
        "Dial",
        &[
            ("caller", "Channel"),
            ("peer", "Channel"),
            ("forwarded", "Channel"),
            ("forward", "string"),
            ("dialstring", "string"),
            ("dialstatus", "string"),
        ],
    ),
    ("EndpointStateChange", &[("endpoint", "Endpoint")]),
    ("PeerStatusChange", &[("endpoint", "Endpoint"), ("peer", "Peer")]),
    ("PlaybackContinuing", &[("playback", "Playback")]),
    ("PlaybackFinished", &[("playback", "Playback")]),
    ("PlaybackStarted", &[("playback", "Playback")]),
    ("RecordingFailed", &[("recording", "LiveRecording")]),
    ("RecordingFinished", &[("recording", "LiveRecording")]),
    ("RecordingStarted", &[("recording", "LiveRecording")]),
    ("StasisEnd", &[("channel", "Channel")]),
    (
        "StasisStart",
        &[("args", "List[string]"), ("channel", "Channel"), ("replace_channel", "Channel")],
    ),
    ("TextMessageReceived", &[("message", "TextMessage"), ("endpoint", "Endpoint")]),
];

impl ApiSchema {
    /// Event catalogue compiled into the client.
    pub fn builtin() -> Self {
        let mut schema = Self::new();
        for (name, fields) in BUILTIN_EVENTS {
            let model = fields
                .iter()
                .fold(EventModel::new(*name), |m, (f, t)| m.field(*f, *t));
            schema.insert(model);
        }
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_knows_channel_events() {
        let schema = ApiSchema::builtin();
        let hold = schema.event("ChannelHold").unwrap();
        let resources: Vec<_> = hold.resource_fields().map(|(f, k)| (f.name.as_str(), k)).collect();
        assert_eq!(resources, vec![("channel", ResourceKind::Channel)]);
        assert!(schema.contains("StasisStart"));
        assert!(!schema.contains("NoSuchEvent"));
    }

    #[test]
    fn builtin_ignores_list_and_auxiliary_types() {
        let schema = ApiSchema::builtin();
        let start = schema.event("StasisStart").unwrap();
        let names: Vec<&str> = start.resource_fields().map(|(f, _)| f.name.as_str()).collect();
        assert_eq!(names, vec!["channel", "replace_channel"]);

        let peer = schema.event("PeerStatusChange").unwrap();
        assert_eq!(peer.resource_fields().count(), 1);
    }

    #[test]
    fn parses_swagger_models_with_extends() {
        let doc = serde_json::json!({
            "apiVersion": "2.0.0",
            "models": {
                "Message": {
                    "id": "Message",
                    "properties": {
                        "type": { "type": "string", "required": true },
                        "asterisk_id": { "type": "string" }
                    }
                },
                "Event": {
                    "id": "Event",
                    "extends": "Message",
                    "properties": {
                        "application": { "type": "string", "required": true },
                        "timestamp": { "type": "Date", "required": true }
                    }
                },
                "ChannelEnteredBridge": {
                    "id": "ChannelEnteredBridge",
                    "extends": "Event",
                    "properties": {
                        "bridge": { "type": "Bridge", "required": true },
                        "channel": { "type": "Channel" }
                    }
                }
            }
        });
        let schema = ApiSchema::from_events_doc(&doc).unwrap();
        assert_eq!(schema.len(), 3);
        let entered = schema.event("ChannelEnteredBridge").unwrap();
        let names: Vec<&str> = entered.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names.len(), 6);
        let pos = |n: &str| names.iter().position(|x| *x == n).unwrap();
        // Inherited properties come before the model's own.
        assert!(pos("type") < pos("application"));
        assert!(pos("timestamp") < pos("bridge"));
        assert!(pos("asterisk_id") < pos("channel"));
        assert_eq!(entered.resource_fields().count(), 2);
    }

    #[test]
    fn accepts_data_type_key() {
        let schema = ApiSchema::from_events_json(
            r#"{"models":{"PlaybackStarted":{"properties":{"playback":{"dataType":"Playback"}}}}}"#,
        )
        .unwrap();
        let (field, kind) = schema
            .event("PlaybackStarted")
            .unwrap()
            .resource_fields()
            .next()
            .unwrap();
        assert_eq!(field.name, "playback");
        assert_eq!(kind, ResourceKind::Playback);
    }

    #[test]
    fn rejects_documents_without_models() {
        assert!(matches!(
            ApiSchema::from_events_json(r#"{"apis":[]}"#),
            Err(SchemaError::MissingModels)
        ));
        assert!(matches!(
            ApiSchema::from_events_json("{"),
            Err(SchemaError::Json(_))
        ));
    }

    #[test]
    fn rejects_cyclic_extends() {
        let doc = serde_json::json!({
            "models": {
                "A": { "extends": "B", "properties": {} },
                "B": { "extends": "A", "properties": {} }
            }
        });
        assert!(matches!(
            ApiSchema::from_events_doc(&doc),
            Err(SchemaError::InvalidModel { .. })
        ));
    }
}
