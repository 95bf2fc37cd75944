//! Publish-subscribe hub for the wildcard and event-type tiers, plus
//! lifecycle notification listeners.
//!
//! One hub per client, shared by reference with every resource handle.

use std::collections::HashMap;
use std::fmt;

use ari_protocol::AriEvent;
use parking_lot::Mutex;

use crate::listener::{EventListener, NotificationListener};
use crate::resource::EventResources;
use crate::types::Notification;

/// Topic name that subscribes to every event.
pub const WILDCARD: &str = "*";

/// A delivery channel on the hub.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Every inbound event, whatever its type.
    Any,
    /// Events of one type.
    Event(String),
}

impl Topic {
    pub fn event(name: impl Into<String>) -> Self {
        Topic::Event(name.into())
    }
}

impl From<&str> for Topic {
    fn from(name: &str) -> Self {
        if name == WILDCARD {
            Topic::Any
        } else {
            Topic::Event(name.to_string())
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Any => f.write_str(WILDCARD),
            Topic::Event(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    listener: EventListener,
    once: bool,
}

#[derive(Default)]
pub struct Hub {
    topics: Mutex<HashMap<Topic, Vec<Entry>>>,
    notifications: Mutex<Vec<NotificationListener>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Event tiers ─────────────────────────────────────────────────

    pub fn on(&self, topic: Topic, listener: EventListener) {
        self.add(topic, listener, false);
    }

    pub fn once(&self, topic: Topic, listener: EventListener) {
        self.add(topic, listener, true);
    }

    /// Remove the most recently registered copy of `listener` on `topic`.
    pub fn remove_listener(&self, topic: &Topic, listener: &EventListener) -> bool {
        let mut topics = self.topics.lock();
        let Some(list) = topics.get_mut(topic) else {
            return false;
        };
        let Some(pos) = list.iter().rposition(|e| e.listener.same(listener)) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            topics.remove(topic);
        }
        true
    }

    /// Drop every listener on `topic`.  Returns how many were removed.
    pub fn remove_all_listeners(&self, topic: &Topic) -> usize {
        self.topics
            .lock()
            .remove(topic)
            .map(|list| list.len())
            .unwrap_or(0)
    }

    pub fn listener_count(&self, topic: &Topic) -> usize {
        self.topics.lock().get(topic).map(Vec::len).unwrap_or(0)
    }

    /// Deliver to every listener on `topic`.  Returns how many were invoked.
    ///
    /// The listener list is snapshotted and one-shot entries are removed
    /// before anything runs, so listeners may (un)register freely.
    pub fn publish(&self, topic: &Topic, event: &AriEvent, resources: &EventResources) -> usize {
        let due: Vec<EventListener> = {
            let mut topics = self.topics.lock();
            let Some(list) = topics.get_mut(topic) else {
                return 0;
            };
            let due = list.iter().map(|e| e.listener.clone()).collect();
            list.retain(|e| !e.once);
            if list.is_empty() {
                topics.remove(topic);
            }
            due
        };

        for listener in &due {
            listener.call(event, resources);
        }
        due.len()
    }

    fn add(&self, topic: Topic, listener: EventListener, once: bool) {
        self.topics
            .lock()
            .entry(topic)
            .or_default()
            .push(Entry { listener, once });
    }

    // ── Notifications ───────────────────────────────────────────────

    pub fn on_notification(&self, listener: NotificationListener) {
        self.notifications.lock().push(listener);
    }

    pub fn remove_notification_listener(&self, listener: &NotificationListener) -> bool {
        let mut list = self.notifications.lock();
        match list.iter().rposition(|l| l.same(listener)) {
            Some(pos) => {
                list.remove(pos);
                true
            }
            None => false,
        }
    }

    pub(crate) fn notify(&self, notification: &Notification) {
        tracing::trace!(notification = notification.name(), "notify");
        let listeners = self.notifications.lock().clone();
        for listener in &listeners {
            listener.call(notification);
        }
    }
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics = self.topics.lock();
        f.debug_struct("Hub")
            .field("topics", &topics.keys().collect::<Vec<_>>())
            .field("notification_listeners", &self.notifications.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn event(kind: &str) -> AriEvent {
        AriEvent::from_json(&format!(r#"{{"type":"{kind}"}}"#)).unwrap()
    }

    fn counter() -> (Arc<AtomicUsize>, EventListener) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let l = EventListener::new(move |_, _| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        (hits, l)
    }

    #[test]
    fn topic_from_str() {
        assert_eq!(Topic::from("*"), Topic::Any);
        assert_eq!(Topic::from("StasisStart"), Topic::event("StasisStart"));
        assert_eq!(Topic::Any.to_string(), "*");
    }

    #[test]
    fn persistent_and_once() {
        let hub = Hub::new();
        let (p_hits, p) = counter();
        let (o_hits, o) = counter();
        let topic = Topic::event("StasisStart");
        hub.on(topic.clone(), p);
        hub.once(topic.clone(), o);

        let ev = event("StasisStart");
        assert_eq!(hub.publish(&topic, &ev, &EventResources::None), 2);
        assert_eq!(hub.publish(&topic, &ev, &EventResources::None), 1);
        assert_eq!(p_hits.load(Ordering::SeqCst), 2);
        assert_eq!(o_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn topics_are_isolated() {
        let hub = Hub::new();
        let (hits, l) = counter();
        hub.on(Topic::event("StasisEnd"), l);
        hub.publish(&Topic::event("StasisStart"), &event("StasisStart"), &EventResources::None);
        hub.publish(&Topic::Any, &event("StasisStart"), &EventResources::None);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remove_listener_takes_last_duplicate() {
        let hub = Hub::new();
        let (hits, l) = counter();
        hub.on(Topic::Any, l.clone());
        hub.once(Topic::Any, l.clone());

        assert!(hub.remove_listener(&Topic::Any, &l));
        assert_eq!(hub.listener_count(&Topic::Any), 1);

        let ev = event("Dial");
        hub.publish(&Topic::Any, &ev, &EventResources::None);
        hub.publish(&Topic::Any, &ev, &EventResources::None);
        // The remaining registration is the persistent one.
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn remove_all_listeners() {
        let hub = Hub::new();
        hub.on(Topic::Any, EventListener::new(|_, _| {}));
        hub.on(Topic::Any, EventListener::new(|_, _| {}));
        assert_eq!(hub.remove_all_listeners(&Topic::Any), 2);
        assert_eq!(hub.listener_count(&Topic::Any), 0);
        assert!(!hub.remove_listener(&Topic::Any, &EventListener::new(|_, _| {})));
    }

    #[test]
    fn listener_may_unregister_itself() {
        let hub = Arc::new(Hub::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<EventListener>>> = Arc::new(Mutex::new(None));

        let (h, s, hub2) = (hits.clone(), slot.clone(), hub.clone());
        let l = EventListener::new(move |_, _| {
            h.fetch_add(1, Ordering::SeqCst);
            if let Some(me) = s.lock().clone() {
                hub2.remove_listener(&Topic::Any, &me);
            }
        });
        *slot.lock() = Some(l.clone());
        hub.on(Topic::Any, l);

        let ev = event("Dial");
        hub.publish(&Topic::Any, &ev, &EventResources::None);
        hub.publish(&Topic::Any, &ev, &EventResources::None);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn notifications_reach_listeners() {
        let hub = Hub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let l = NotificationListener::new(move |n| s.lock().push(n.name()));
        hub.on_notification(l.clone());

        hub.notify(&Notification::Connected);
        hub.notify(&Notification::Pong);
        assert!(hub.remove_notification_listener(&l));
        hub.notify(&Notification::Stopped);

        assert_eq!(*seen.lock(), vec!["WebSocketConnected", "pong"]);
    }
}
