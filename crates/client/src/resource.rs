//! Resource handles and the resource argument delivered with events.
//!
//! A [`Resource`] is a typed view over one decoded payload fragment.  It
//! holds a non-owning back-reference to the client so instance-scoped
//! subscriptions can be made straight from it; once the client is dropped
//! those calls fail with [`AriError::ClientDropped`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use ari_protocol::ResourceKind;
use percent_encoding::utf8_percent_encode;
use serde_json::Value;

use crate::client::ClientCore;
use crate::config::COMPONENT;
use crate::identity::{self, Identity};
use crate::listener::EventListener;
use crate::types::AriError;

#[derive(Clone)]
pub struct Resource {
    kind: ResourceKind,
    identity: Identity,
    payload: Value,
    generated: bool,
    core: Weak<ClientCore>,
}

impl Resource {
    pub(crate) fn new(
        kind: ResourceKind,
        identity: Identity,
        payload: Value,
        core: Weak<ClientCore>,
    ) -> Self {
        Self {
            kind,
            identity,
            payload,
            generated: false,
            core,
        }
    }

    pub(crate) fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Identity as text (`abc`, `PJSIP/100`).
    pub fn id(&self) -> String {
        self.identity.to_string()
    }

    /// Key of this instance in the listener registry.
    pub fn instance_key(&self) -> String {
        identity::instance_key(self.kind, &self.identity)
    }

    /// The payload the handle was built from.  Client-side handles carry
    /// only their identity fields.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// A payload field.  `null` counts as absent.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name).filter(|v| !v.is_null())
    }

    /// Whether the identity was generated locally rather than issued by
    /// the server.
    pub fn is_generated(&self) -> bool {
        self.generated
    }

    /// REST path of this instance relative to `/ari`, each identity part
    /// percent-encoded (`/channels/1700000000.42`, `/endpoints/PJSIP/100`).
    pub fn api_path(&self) -> String {
        let mut path = format!("/{}", self.kind.collection());
        for value in self.identity.values() {
            path.push('/');
            path.extend(utf8_percent_encode(value, COMPONENT));
        }
        path
    }

    // ── Instance-scoped listeners ───────────────────────────────────

    /// Listen for `event_type` on this instance until removed.
    pub fn on(&self, event_type: &str, listener: EventListener) -> Result<(), AriError> {
        self.core()?
            .registry
            .lock()
            .add(event_type, self.instance_key(), false, listener);
        Ok(())
    }

    /// Listen for the next `event_type` on this instance only.
    pub fn once(&self, event_type: &str, listener: EventListener) -> Result<(), AriError> {
        self.core()?
            .registry
            .lock()
            .add(event_type, self.instance_key(), true, listener);
        Ok(())
    }

    /// Remove one registration of `listener`; the most recent one when
    /// it was registered more than once.
    pub fn remove_listener(&self, event_type: &str, listener: &EventListener) -> Result<bool, AriError> {
        Ok(self
            .core()?
            .registry
            .lock()
            .remove(event_type, &self.instance_key(), listener))
    }

    pub fn remove_all_listeners(&self, event_type: &str) -> Result<usize, AriError> {
        Ok(self.core()?.registry.lock().remove_all(event_type, &self.instance_key()))
    }

    pub fn listener_count(&self, event_type: &str) -> Result<usize, AriError> {
        Ok(self.core()?.registry.lock().count(event_type, &self.instance_key()))
    }

    fn core(&self) -> Result<Arc<ClientCore>, AriError> {
        self.core.upgrade().ok_or(AriError::ClientDropped)
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("kind", &self.kind)
            .field("id", &self.id())
            .field("generated", &self.generated)
            .finish()
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.identity == other.identity && self.payload == other.payload
    }
}

/// Resources resolved from one event, as handed to listeners.
///
/// Exactly one resource field is delivered as the resource itself;
/// several come keyed by field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EventResources {
    #[default]
    None,
    Single(Resource),
    Many(BTreeMap<String, Resource>),
}

impl EventResources {
    /// Apply the promotion rule to `(field name, resource)` pairs.
    pub fn from_fields(fields: Vec<(String, Resource)>) -> Self {
        match fields.len() {
            0 => EventResources::None,
            1 => match fields.into_iter().next() {
                Some((_, resource)) => EventResources::Single(resource),
                None => EventResources::None,
            },
            _ => EventResources::Many(fields.into_iter().collect()),
        }
    }

    pub fn single(&self) -> Option<&Resource> {
        match self {
            EventResources::Single(r) => Some(r),
            _ => None,
        }
    }

    /// Resource by field name.  Only a keyed collection has names.
    pub fn get(&self, field: &str) -> Option<&Resource> {
        match self {
            EventResources::Many(map) => map.get(field),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            EventResources::None => 0,
            EventResources::Single(_) => 1,
            EventResources::Many(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &Resource> + '_> {
        match self {
            EventResources::None => Box::new(std::iter::empty()),
            EventResources::Single(r) => Box::new(std::iter::once(r)),
            EventResources::Many(map) => Box::new(map.values()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity;
    use serde_json::json;

    fn detached(type_name: &str, payload: Value) -> Resource {
        let (kind, id) = identity::resolve(type_name, &payload).unwrap();
        Resource::new(kind, id, payload, Weak::new())
    }

    #[test]
    fn api_path_encodes_each_part() {
        let ch = detached("Channel", json!({"id": "1700000000.42"}));
        assert_eq!(ch.api_path(), "/channels/1700000000.42");

        let ep = detached("Endpoint", json!({"technology": "PJSIP", "resource": "alice bob"}));
        assert_eq!(ep.api_path(), "/endpoints/PJSIP/alice%20bob");

        let rec = detached("StoredRecording", json!({"name": "a/b"}));
        assert_eq!(rec.api_path(), "/recordings/stored/a%2Fb");
    }

    #[test]
    fn listener_calls_fail_without_client() {
        let ch = detached("Channel", json!({"id": "abc"}));
        let l = EventListener::new(|_, _| {});
        assert!(matches!(ch.on("ChannelHold", l.clone()), Err(AriError::ClientDropped)));
        assert!(matches!(ch.remove_all_listeners("ChannelHold"), Err(AriError::ClientDropped)));
    }

    #[test]
    fn promotion_rule() {
        assert_eq!(EventResources::from_fields(vec![]), EventResources::None);

        let ch = detached("Channel", json!({"id": "abc"}));
        let single = EventResources::from_fields(vec![("channel".into(), ch.clone())]);
        assert_eq!(single.single().map(Resource::id).as_deref(), Some("abc"));
        assert_eq!(single.len(), 1);
        assert!(single.get("channel").is_none());

        let br = detached("Bridge", json!({"id": "b1"}));
        let many = EventResources::from_fields(vec![
            ("channel".into(), ch),
            ("bridge".into(), br),
        ]);
        assert!(many.single().is_none());
        assert_eq!(many.get("bridge").map(Resource::id).as_deref(), Some("b1"));
        assert_eq!(many.iter().count(), 2);
    }

    #[test]
    fn field_treats_null_as_absent() {
        let ch = detached("Channel", json!({"id": "abc", "caller": null, "state": "Up"}));
        assert!(ch.field("caller").is_none());
        assert_eq!(ch.field("state"), Some(&json!("Up")));
        assert!(!ch.is_generated());
    }
}
