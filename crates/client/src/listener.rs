//! Listener handles.
//!
//! A handle wraps an `Arc`'d callback; clones of one handle compare equal,
//! which is what removal matches on.

use std::fmt;
use std::sync::Arc;

use ari_protocol::AriEvent;

use crate::resource::EventResources;
use crate::types::Notification;

type EventFn = dyn Fn(&AriEvent, &EventResources) + Send + Sync;
type NotificationFn = dyn Fn(&Notification) + Send + Sync;

/// Callback invoked with an event and the resources resolved from it.
#[derive(Clone)]
pub struct EventListener(Arc<EventFn>);

impl EventListener {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&AriEvent, &EventResources) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, event: &AriEvent, resources: &EventResources) {
        (self.0)(event, resources)
    }

    /// Whether both handles point at the same callback.
    pub fn same(&self, other: &EventListener) -> bool {
        Arc::as_ptr(&self.0) as *const () == Arc::as_ptr(&other.0) as *const ()
    }
}

impl PartialEq for EventListener {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for EventListener {}

impl fmt::Debug for EventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventListener({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// Callback invoked with a lifecycle [`Notification`].
#[derive(Clone)]
pub struct NotificationListener(Arc<NotificationFn>);

impl NotificationListener {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, notification: &Notification) {
        (self.0)(notification)
    }

    pub fn same(&self, other: &NotificationListener) -> bool {
        Arc::as_ptr(&self.0) as *const () == Arc::as_ptr(&other.0) as *const ()
    }
}

impl fmt::Debug for NotificationListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NotificationListener({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}
