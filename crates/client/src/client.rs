//! The client façade: start/stop the event socket, subscribe to the three
//! delivery tiers, create resource handles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ari_protocol::{ApiSchema, ResourceKind};
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::backoff::ReconnectBackoff;
use crate::config::ConnectionConfig;
use crate::connection::{ConnectionState, StartOutcome};
use crate::demux::EventDemux;
use crate::driver::{self, Command, SessionHandle};
use crate::hub::{Hub, Topic};
use crate::identity::{self, Identity};
use crate::listener::{EventListener, NotificationListener};
use crate::registry::InstanceRegistry;
use crate::resource::Resource;
use crate::schema::SchemaSource;
use crate::types::{AriError, Notification};

/// State shared by the façade, the session task and every resource handle.
#[derive(Debug, Default)]
pub struct ClientCore {
    pub(crate) registry: Mutex<InstanceRegistry>,
    pub(crate) hub: Hub,
}

/// A client for one Asterisk server.
///
/// Create via [`AriClientBuilder`](crate::builder::AriClientBuilder).
/// Listener registrations live as long as the client and survive
/// reconnects; dropping the client stops its session.
pub struct AriClient {
    pub(crate) core: Arc<ClientCore>,
    pub(crate) connection: ConnectionConfig,
    pub(crate) reconnect_backoff: ReconnectBackoff,
    pub(crate) schema_source: Arc<dyn SchemaSource>,
    pub(crate) schema: Mutex<Option<Arc<ApiSchema>>>,
    pub(crate) session: Mutex<Option<SessionHandle>>,
    /// Set by `stop` while no session is running, so a `start` still
    /// loading its schema gives up instead of connecting.
    pub(crate) stop_requested: AtomicBool,
}

impl AriClient {
    /// Start a new builder.
    pub fn builder() -> crate::builder::AriClientBuilder {
        crate::builder::AriClientBuilder::new()
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Open the event socket for `apps` and wait for it to open.
    ///
    /// Loads the event schema on first use.  Fails if the schema cannot be
    /// loaded (no retry), if every reconnect attempt fails before the
    /// socket ever opens, or if [`stop`](Self::stop) is called first.  Once
    /// this has returned `Ok`, later outages are retried in the background
    /// and reported through notifications only.
    pub async fn start(&self, apps: Vec<String>, subscribe_all: bool) -> Result<(), AriError> {
        {
            let session = self.session.lock();
            if session.as_ref().is_some_and(|s| !s.is_finished()) {
                return Err(AriError::AlreadyStarted);
            }
            self.stop_requested.store(false, Ordering::SeqCst);
        }
        let schema = self.load_schema().await?;

        let conn = self.connection.clone().with_subscription(apps, subscribe_all);
        let demux = EventDemux::new(schema, self.core.clone());

        let spawned = {
            let mut session = self.session.lock();
            if session.as_ref().is_some_and(|s| !s.is_finished()) {
                return Err(AriError::AlreadyStarted);
            }
            if self.stop_requested.swap(false, Ordering::SeqCst) {
                None
            } else {
                tracing::info!(apps = ?conn.apps, subscribe_all = conn.subscribe_all, "starting");
                let (handle, outcome) =
                    driver::spawn(conn, self.reconnect_backoff.clone(), demux, self.core.clone());
                *session = Some(handle);
                Some(outcome)
            }
        };

        let Some(outcome) = spawned else {
            tracing::info!("stopped before the event socket was opened");
            self.core.hub.notify(&Notification::Stopped);
            return Err(AriError::Stopped);
        };

        match outcome.await {
            Ok(StartOutcome::Opened) => Ok(()),
            Ok(StartOutcome::Exhausted { attempts, message }) => {
                Err(AriError::RetriesExhausted { attempts, message })
            }
            Ok(StartOutcome::Stopped) | Err(_) => Err(AriError::Stopped),
        }
    }

    /// [`start`](Self::start) with the applications given to the builder.
    pub async fn connect(&self) -> Result<(), AriError> {
        self.start(self.connection.apps.clone(), self.connection.subscribe_all)
            .await
    }

    /// Close the event socket without reconnecting.  Idempotent; returns
    /// immediately, see [`wait_closed`](Self::wait_closed).
    pub fn stop(&self) {
        let session = self.session.lock();
        match session.as_ref() {
            Some(s) if !s.is_finished() => {
                let _ = s.commands.send(Command::Stop);
            }
            _ => self.stop_requested.store(true, Ordering::SeqCst),
        }
    }

    /// Send a liveness ping if the socket is open.  The answer arrives as
    /// [`Notification::Pong`].
    pub fn ping(&self) {
        self.send(Command::Ping);
    }

    pub fn state(&self) -> ConnectionState {
        self.session
            .lock()
            .as_ref()
            .map(|s| *s.state.borrow())
            .unwrap_or(ConnectionState::Idle)
    }

    /// Resolves once the current session has closed (stopped or out of
    /// retries).  Immediate when nothing was started.
    pub async fn wait_closed(&self) {
        let rx = self.session.lock().as_ref().map(|s| s.state.clone());
        if let Some(mut rx) = rx {
            let _ = rx.wait_for(|s| *s == ConnectionState::Closed).await;
        }
    }

    // ── Wildcard and event-type tiers ───────────────────────────────

    /// Listen on a topic.  `"*"` is every event, anything else an event type.
    pub fn on(&self, topic: impl Into<Topic>, listener: EventListener) {
        self.core.hub.on(topic.into(), listener);
    }

    pub fn once(&self, topic: impl Into<Topic>, listener: EventListener) {
        self.core.hub.once(topic.into(), listener);
    }

    pub fn remove_listener(&self, topic: impl Into<Topic>, listener: &EventListener) -> bool {
        self.core.hub.remove_listener(&topic.into(), listener)
    }

    pub fn remove_all_listeners(&self, topic: impl Into<Topic>) -> usize {
        self.core.hub.remove_all_listeners(&topic.into())
    }

    pub fn listener_count(&self, topic: impl Into<Topic>) -> usize {
        self.core.hub.listener_count(&topic.into())
    }

    pub fn on_notification(&self, listener: NotificationListener) {
        self.core.hub.on_notification(listener);
    }

    pub fn remove_notification_listener(&self, listener: &NotificationListener) -> bool {
        self.core.hub.remove_notification_listener(listener)
    }

    // ── Resource handles ────────────────────────────────────────────

    /// Handle for an existing instance with a single-field identity.
    pub fn resource(&self, kind: ResourceKind, id: impl Into<String>) -> Result<Resource, AriError> {
        let identity = identity::from_values(kind, vec![id.into()])?;
        Ok(self.handle(kind, identity))
    }

    /// Handle for an endpoint, identified by technology and resource.
    pub fn endpoint(
        &self,
        technology: impl Into<String>,
        resource: impl Into<String>,
    ) -> Result<Resource, AriError> {
        let identity =
            identity::from_values(ResourceKind::Endpoint, vec![technology.into(), resource.into()])?;
        Ok(self.handle(ResourceKind::Endpoint, identity))
    }

    /// Handle with a fresh UUID, for resources the application creates
    /// (originate a channel, create a bridge, start a playback).  Listeners
    /// can be attached before the server knows the id.
    pub fn generate(&self, kind: ResourceKind) -> Result<Resource, AriError> {
        let id = uuid::Uuid::new_v4().to_string();
        let identity = identity::from_values(kind, vec![id])?;
        Ok(self.handle(kind, identity).generated())
    }

    // ── Introspection ───────────────────────────────────────────────

    /// The event schema, once [`start`](Self::start) has loaded it.
    pub fn schema(&self) -> Option<Arc<ApiSchema>> {
        self.schema.lock().clone()
    }

    pub fn connection(&self) -> &ConnectionConfig {
        &self.connection
    }

    /// Instance-scoped registrations across all resources.
    pub fn instance_listener_count(&self) -> usize {
        self.core.registry.lock().len()
    }

    // ── Internals ───────────────────────────────────────────────────

    fn handle(&self, kind: ResourceKind, identity: Identity) -> Resource {
        let mut payload = Map::new();
        for (field, value) in kind.identity_fields().iter().zip(identity.values()) {
            payload.insert((*field).to_string(), Value::String(value.to_string()));
        }
        Resource::new(kind, identity, Value::Object(payload), Arc::downgrade(&self.core))
    }

    async fn load_schema(&self) -> Result<Arc<ApiSchema>, AriError> {
        let cached = self.schema.lock().clone();
        if let Some(schema) = cached {
            return Ok(schema);
        }

        match self.schema_source.load(&self.connection).await {
            Ok(schema) => {
                let schema = Arc::new(schema);
                *self.schema.lock() = Some(schema.clone());
                Ok(schema)
            }
            Err(e) if e.is_network() => {
                tracing::error!(error = %e, "network error while loading event schema");
                let message = e.to_string();
                self.core.hub.notify(&Notification::NetworkError {
                    message: message.clone(),
                });
                Err(AriError::Network(message))
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load event schema");
                let message = e.to_string();
                self.core.hub.notify(&Notification::ApiLoadError {
                    message: message.clone(),
                });
                Err(AriError::SchemaLoad(message))
            }
        }
    }

    fn send(&self, command: Command) {
        if let Some(session) = self.session.lock().as_ref() {
            let _ = session.commands.send(command);
        }
    }
}

impl Drop for AriClient {
    fn drop(&mut self) {
        self.send(Command::Stop);
    }
}

impl std::fmt::Debug for AriClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AriClient")
            .field("host", &self.connection.host)
            .field("state", &self.state())
            .finish()
    }
}
