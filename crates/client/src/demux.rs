//! Event demultiplexer: one decoded frame in, three tiers of delivery out.

use std::sync::Arc;

use ari_protocol::{ApiSchema, AriEvent};

use crate::client::ClientCore;
use crate::hub::Topic;
use crate::identity;
use crate::resource::{EventResources, Resource};
use crate::types::FrameError;

/// What one frame produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub event_type: String,
    /// Resource-typed fields that resolved to an identity.
    pub resource_fields: usize,
    /// Distinct instance keys (`Channel:abc`), in field declaration order.
    pub instances: Vec<String>,
    /// Instance-scoped listeners invoked.
    pub instance_deliveries: usize,
}

pub struct EventDemux {
    schema: Arc<ApiSchema>,
    core: Arc<ClientCore>,
}

impl EventDemux {
    pub(crate) fn new(schema: Arc<ApiSchema>, core: Arc<ClientCore>) -> Self {
        Self { schema, core }
    }

    /// Decode and deliver one text frame.  An error means the frame was
    /// dropped before any listener ran.
    pub fn handle(&self, text: &str) -> Result<Dispatch, FrameError> {
        let event = AriEvent::from_json(text).map_err(|e| FrameError::Malformed(e.to_string()))?;
        self.dispatch(event)
    }

    pub fn dispatch(&self, event: AriEvent) -> Result<Dispatch, FrameError> {
        let model = self
            .schema
            .event(&event.event_type)
            .ok_or_else(|| FrameError::UnknownEventType(event.event_type.clone()))?;

        let mut fields = Vec::new();
        let mut instances: Vec<String> = Vec::new();

        for (decl, kind) in model.resource_fields() {
            let Some(payload) = event.field(&decl.name) else {
                continue;
            };
            let identity = match identity::resolve_kind(kind, payload) {
                Ok(identity) => identity,
                Err(e) => {
                    tracing::trace!(
                        event_type = %event.event_type,
                        field = %decl.name,
                        error = %e,
                        "field is not resource-bearing"
                    );
                    continue;
                }
            };

            let key = identity::instance_key(kind, &identity);
            if !instances.contains(&key) {
                instances.push(key);
            }
            let resource = Resource::new(kind, identity, payload.clone(), Arc::downgrade(&self.core));
            fields.push((decl.name.clone(), resource));
        }

        let resource_fields = fields.len();
        let resources = EventResources::from_fields(fields);

        // Instance deliveries are fixed before any tier runs: a registration
        // made by a listener of this frame waits for the next one.
        let due: Vec<_> = {
            let mut registry = self.core.registry.lock();
            instances
                .iter()
                .flat_map(|key| registry.match_and_consume(&event.event_type, key))
                .collect()
        };

        let hub = &self.core.hub;
        hub.publish(&Topic::Any, &event, &resources);
        hub.publish(&Topic::Event(event.event_type.clone()), &event, &resources);

        for listener in &due {
            listener.call(&event, &resources);
        }
        let instance_deliveries = due.len();

        tracing::trace!(
            event_type = %event.event_type,
            resources = resource_fields,
            instance_deliveries,
            "event dispatched"
        );

        Ok(Dispatch {
            event_type: event.event_type,
            resource_fields,
            instances,
            instance_deliveries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ari_protocol::EventModel;
    use parking_lot::Mutex;

    use crate::listener::EventListener;

    fn schema() -> Arc<ApiSchema> {
        let mut s = ApiSchema::new();
        s.insert(EventModel::new("ChannelHold").field("channel", "Channel").field("musicclass", "string"))
            .insert(
                EventModel::new("Dial")
                    .field("caller", "Channel")
                    .field("peer", "Channel")
                    .field("forwarded", "Channel")
                    .field("dialstatus", "string"),
            )
            .insert(
                EventModel::new("ChannelEnteredBridge")
                    .field("bridge", "Bridge")
                    .field("channel", "Channel"),
            )
            .insert(EventModel::new("EndpointStateChange").field("endpoint", "Endpoint"))
            .insert(EventModel::new("Heartbeat"));
        Arc::new(s)
    }

    fn setup() -> (Arc<ClientCore>, EventDemux) {
        let core = Arc::new(ClientCore::default());
        let demux = EventDemux::new(schema(), core.clone());
        (core, demux)
    }

    type Seen = Arc<Mutex<Vec<(String, EventResources)>>>;

    fn recorder() -> (Seen, EventListener) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let l = EventListener::new(move |ev, res| s.lock().push((ev.event_type.clone(), res.clone())));
        (seen, l)
    }

    #[test]
    fn once_instance_listener_on_channel_hold() {
        let (core, demux) = setup();
        let (seen, l) = recorder();
        core.registry.lock().add("ChannelHold", "Channel:abc", true, l);

        let frame = r#"{"type":"ChannelHold","channel":{"id":"abc"}}"#;
        let d = demux.handle(frame).unwrap();
        assert_eq!(d.instance_deliveries, 1);
        assert_eq!(d.instances, vec!["Channel:abc".to_string()]);

        {
            let seen = seen.lock();
            assert_eq!(seen.len(), 1);
            let res = seen[0].1.single().expect("single resource");
            assert_eq!(res.id(), "abc");
            assert_eq!(res.kind(), ari_protocol::ResourceKind::Channel);
        }
        assert_eq!(core.registry.lock().count("ChannelHold", "Channel:abc"), 0);

        demux.handle(frame).unwrap();
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn same_instance_in_two_fields_fires_once() {
        let (core, demux) = setup();
        let (seen, l) = recorder();
        core.registry.lock().add("Dial", "Channel:abc", true, l);

        let d = demux
            .handle(r#"{"type":"Dial","caller":{"id":"abc"},"peer":{"id":"abc"},"dialstatus":""}"#)
            .unwrap();
        assert_eq!(d.resource_fields, 2);
        assert_eq!(d.instances.len(), 1);
        assert_eq!(seen.lock().len(), 1);
        assert!(matches!(seen.lock()[0].1, EventResources::Many(_)));
    }

    #[test]
    fn persistent_listener_fires_once_per_frame_across_fields() {
        let (core, demux) = setup();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        core.registry.lock().add(
            "Dial",
            "Channel:abc",
            false,
            EventListener::new(move |_, _| {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let frame = r#"{"type":"Dial","caller":{"id":"abc"},"peer":{"id":"abc"}}"#;
        demux.handle(frame).unwrap();
        demux.handle(frame).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn tiers_run_in_order() {
        let (core, demux) = setup();
        let order = Arc::new(Mutex::new(Vec::new()));
        let tag = |name: &'static str| {
            let o = order.clone();
            EventListener::new(move |_, _| o.lock().push(name))
        };
        core.registry.lock().add("ChannelHold", "Channel:abc", false, tag("instance"));
        core.hub.on(Topic::event("ChannelHold"), tag("type"));
        core.hub.on(Topic::Any, tag("any"));

        demux.handle(r#"{"type":"ChannelHold","channel":{"id":"abc"}}"#).unwrap();
        assert_eq!(*order.lock(), vec!["any", "type", "instance"]);
    }

    #[test]
    fn promotion_shapes() {
        let (core, demux) = setup();
        let (seen, l) = recorder();
        core.hub.on(Topic::Any, l);

        demux.handle(r#"{"type":"Heartbeat"}"#).unwrap();
        demux.handle(r#"{"type":"ChannelHold","channel":{"id":"abc"}}"#).unwrap();
        demux
            .handle(r#"{"type":"ChannelEnteredBridge","bridge":{"id":"b1"},"channel":{"id":"abc"}}"#)
            .unwrap();

        let seen = seen.lock();
        assert_eq!(seen[0].1, EventResources::None);
        assert!(seen[1].1.single().is_some());
        let many = &seen[2].1;
        assert_eq!(many.len(), 2);
        assert_eq!(many.get("bridge").map(|r| r.id()).as_deref(), Some("b1"));
        assert_eq!(many.get("channel").map(|r| r.id()).as_deref(), Some("abc"));
    }

    #[test]
    fn absent_or_unresolvable_fields_are_skipped() {
        let (_core, demux) = setup();
        // `peer` absent, `forwarded` null, `caller` lacks its id.
        let d = demux
            .handle(r#"{"type":"Dial","caller":{"name":"x"},"forwarded":null}"#)
            .unwrap();
        assert_eq!(d.resource_fields, 0);
        assert!(d.instances.is_empty());
    }

    #[test]
    fn composite_identity_is_keyed() {
        let (core, demux) = setup();
        let (seen, l) = recorder();
        core.registry.lock().add("EndpointStateChange", "Endpoint:PJSIP/100", true, l);

        demux
            .handle(r#"{"type":"EndpointStateChange","endpoint":{"technology":"PJSIP","resource":"100"}}"#)
            .unwrap();
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn bad_frames_are_rejected_without_delivery() {
        let (core, demux) = setup();
        let (seen, l) = recorder();
        core.hub.on(Topic::Any, l);

        assert!(matches!(demux.handle("{not json"), Err(FrameError::Malformed(_))));
        assert!(matches!(demux.handle(r#"{"channel":{}}"#), Err(FrameError::Malformed(_))));
        assert_eq!(
            demux.handle(r#"{"type":"NoSuchEvent"}"#),
            Err(FrameError::UnknownEventType("NoSuchEvent".into()))
        );
        assert!(seen.lock().is_empty());

        // The demultiplexer keeps working afterwards.
        demux.handle(r#"{"type":"Heartbeat"}"#).unwrap();
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn listener_may_remove_itself_while_running() {
        let (core, demux) = setup();
        let hits = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<EventListener>>> = Arc::new(Mutex::new(None));

        let (h, s, c) = (hits.clone(), slot.clone(), core.clone());
        let l = EventListener::new(move |_, res| {
            h.fetch_add(1, Ordering::SeqCst);
            if let (Some(me), Some(ch)) = (s.lock().clone(), res.single()) {
                ch.remove_listener("ChannelHold", &me).unwrap();
            }
            // The registry is free while listeners run.
            assert!(c.registry.try_lock().is_some());
        });
        *slot.lock() = Some(l.clone());
        core.registry.lock().add("ChannelHold", "Channel:abc", false, l);

        let frame = r#"{"type":"ChannelHold","channel":{"id":"abc"}}"#;
        demux.handle(frame).unwrap();
        demux.handle(frame).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn resources_subscribe_through_the_core() {
        let (core, demux) = setup();
        let (seen, l) = recorder();
        let (first, watcher) = recorder();

        // Subscribe from inside a type-tier delivery using the handle.
        core.hub.once(
            Topic::event("ChannelHold"),
            EventListener::new({
                let l = l.clone();
                move |_, res| {
                    if let Some(ch) = res.single() {
                        ch.once("ChannelUnhold", l.clone()).unwrap();
                    }
                }
            }),
        );
        core.hub.on(Topic::Any, watcher);

        demux.handle(r#"{"type":"ChannelHold","channel":{"id":"abc"}}"#).unwrap();
        assert_eq!(core.registry.lock().count("ChannelUnhold", "Channel:abc"), 1);
        assert!(seen.lock().is_empty());
        assert_eq!(first.lock().len(), 1);
    }

    #[test]
    fn registration_made_during_a_frame_waits_for_the_next() {
        let (core, demux) = setup();
        let (seen, next_hold) = recorder();

        core.hub.once(
            Topic::event("ChannelHold"),
            EventListener::new({
                let next_hold = next_hold.clone();
                move |_, res| {
                    if let Some(ch) = res.single() {
                        ch.once("ChannelHold", next_hold.clone()).unwrap();
                    }
                }
            }),
        );

        let frame = r#"{"type":"ChannelHold","channel":{"id":"abc"}}"#;
        let d = demux.handle(frame).unwrap();
        assert_eq!(d.instance_deliveries, 0);
        assert!(seen.lock().is_empty());
        assert_eq!(core.registry.lock().count("ChannelHold", "Channel:abc"), 1);

        demux.handle(frame).unwrap();
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(core.registry.lock().count("ChannelHold", "Channel:abc"), 0);
    }

    #[test]
    fn same_id_on_another_kind_does_not_match() {
        let (core, demux) = setup();
        let (seen, l) = recorder();
        let ch = Resource::new(
            ari_protocol::ResourceKind::Channel,
            identity::Identity::Simple("abc".into()),
            serde_json::json!({"id": "abc"}),
            Arc::downgrade(&core),
        );
        ch.on("ChannelEnteredBridge", l).unwrap();

        let d = demux
            .handle(r#"{"type":"ChannelEnteredBridge","bridge":{"id":"abc"},"channel":{"id":"xyz"}}"#)
            .unwrap();
        assert_eq!(d.instances, vec!["Bridge:abc".to_string(), "Channel:xyz".to_string()]);
        assert!(seen.lock().is_empty());

        demux
            .handle(r#"{"type":"ChannelEnteredBridge","bridge":{"id":"b1"},"channel":{"id":"abc"}}"#)
            .unwrap();
        assert_eq!(seen.lock().len(), 1);
    }
}
