//! `ari-client`: realtime event client for the Asterisk REST Interface.
//!
//! Connects to the ARI event socket, keeps it open with capped exponential
//! back-off, and fans every event out to three tiers of listeners.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  AriClient (façade)                                          │
//! │    start / stop / ping          on / once / remove_listener  │
//! │        │                                 │                   │
//! │        ▼                                 ▼                   │
//! │  session task ──────────────────►  ClientCore                │
//! │    ConnectionMachine (+ backoff)     Hub        ("*", type)  │
//! │    tokio-tungstenite socket          InstanceRegistry        │
//! │    EventDemux ───────────────────►   (type, instance id)     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Delivery order for one frame
//!
//! 1. Decode, look the event type up in the schema.
//! 2. Resolve every resource-typed field to a [`Resource`].
//! 3. Wildcard listeners (`"*"`), then listeners for the event type.
//! 4. Instance listeners, once per distinct instance in the frame.
//!
//! Listeners receive the event plus an [`EventResources`]: nothing, the
//! single resource, or the resources keyed by field name.
//!
//! # Example
//!
//! ```rust,no_run
//! # use ari_client::{AriClient, EventListener};
//! # async fn run() -> Result<(), ari_client::AriError> {
//! let client = AriClient::builder()
//!     .base_url("http://localhost:8088")
//!     .password("secret")
//!     .build()?;
//!
//! client.on("StasisStart", EventListener::new(|event, resources| {
//!     for resource in resources.iter() {
//!         println!("{} {} entered {:?}", resource.kind(), resource.id(), event.application);
//!     }
//! }));
//! client.start(vec!["ivr".into()], false).await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod builder;
pub mod client;
pub mod config;
pub mod connection;
pub mod demux;
mod driver;
pub mod hub;
pub mod identity;
pub mod listener;
pub mod registry;
pub mod resource;
pub mod schema;
pub mod types;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use backoff::{BackoffScheduler, ReconnectBackoff, RetryDecision};
pub use builder::AriClientBuilder;
pub use client::AriClient;
pub use config::ConnectionConfig;
pub use connection::ConnectionState;
pub use hub::Topic;
pub use identity::{Identity, IdentityError};
pub use listener::{EventListener, NotificationListener};
pub use resource::{EventResources, Resource};
pub use schema::{HttpSchemaSource, SchemaLoadError, SchemaSource, StaticSchema};
pub use types::{AriError, FrameError, Notification};

// Re-export protocol types so applications never need ari-protocol directly.
pub use ari_protocol::{ApiSchema, AriEvent, EventModel, ResourceKind};
