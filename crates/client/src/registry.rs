//! Instance listener registry: subscriptions per (event type, instance).
//!
//! Registrations are owned by the client, not by a socket session, so they
//! survive reconnects.  Cleanup is the caller's job: nothing is removed
//! except by explicit removal or by a one-shot registration firing.

use std::collections::HashMap;

use crate::listener::EventListener;

/// One instance-scoped subscription.
#[derive(Debug, Clone)]
pub struct ListenerRegistration {
    pub event_type: String,
    pub instance_id: String,
    pub once: bool,
    pub listener: EventListener,
}

/// Registrations keyed by event type, each list in registration order.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    by_event: HashMap<String, Vec<ListenerRegistration>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `event_type` on `instance_id`.
    ///
    /// Duplicate registrations are kept; each one fires.
    ///
    /// Returns `&mut Self` for method chaining.
    pub fn add(
        &mut self,
        event_type: impl Into<String>,
        instance_id: impl Into<String>,
        once: bool,
        listener: EventListener,
    ) -> &mut Self {
        let event_type = event_type.into();
        let registration = ListenerRegistration {
            event_type: event_type.clone(),
            instance_id: instance_id.into(),
            once,
            listener,
        };
        self.by_event.entry(event_type).or_default().push(registration);
        self
    }

    /// Remove one registration of `listener`.  When duplicates exist the most
    /// recently registered one goes; earlier ones stay.
    pub fn remove(&mut self, event_type: &str, instance_id: &str, listener: &EventListener) -> bool {
        let Some(list) = self.by_event.get_mut(event_type) else {
            return false;
        };
        let Some(pos) = list
            .iter()
            .rposition(|r| r.instance_id == instance_id && r.listener.same(listener))
        else {
            return false;
        };
        list.remove(pos);
        self.prune(event_type);
        true
    }

    /// Remove every registration for the pair.  Returns how many were removed.
    pub fn remove_all(&mut self, event_type: &str, instance_id: &str) -> usize {
        let Some(list) = self.by_event.get_mut(event_type) else {
            return 0;
        };
        let before = list.len();
        list.retain(|r| r.instance_id != instance_id);
        let removed = before - list.len();
        self.prune(event_type);
        removed
    }

    /// Listeners due for `event_type` on `instance_id`, in registration
    /// order.  One-shot registrations among them are removed by this call,
    /// before the caller gets a chance to invoke anything.
    pub fn match_and_consume(&mut self, event_type: &str, instance_id: &str) -> Vec<EventListener> {
        let Some(list) = self.by_event.get_mut(event_type) else {
            return Vec::new();
        };

        let mut matched = Vec::new();
        list.retain(|r| {
            if r.instance_id != instance_id {
                return true;
            }
            matched.push(r.listener.clone());
            !r.once
        });
        self.prune(event_type);
        matched
    }

    /// Registrations for the pair.
    pub fn count(&self, event_type: &str, instance_id: &str) -> usize {
        self.by_event
            .get(event_type)
            .map(|list| list.iter().filter(|r| r.instance_id == instance_id).count())
            .unwrap_or(0)
    }

    /// Whether anything at all listens for `event_type`.
    pub fn has_event(&self, event_type: &str) -> bool {
        self.by_event.contains_key(event_type)
    }

    /// Total registrations.
    pub fn len(&self) -> usize {
        self.by_event.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_event.is_empty()
    }

    fn prune(&mut self, event_type: &str) {
        if self.by_event.get(event_type).is_some_and(Vec::is_empty) {
            self.by_event.remove(event_type);
        }
    }
}
