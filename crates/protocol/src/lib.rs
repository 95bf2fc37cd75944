//! ARI protocol: the inbound event envelope, the closed set of resource
//! kinds, and the event model that describes which fields of each event
//! carry embedded resources.
//!
//! The event model normally comes from the server's Swagger description
//! (`/ari/api-docs/events.json`); [`ApiSchema::builtin`] provides the
//! catalogue compiled into the client for offline use.

pub mod event;
pub mod resource;
pub mod schema;

pub use event::AriEvent;
pub use resource::{ResourceKind, UnknownResourceKind};
pub use schema::{ApiSchema, EventModel, FieldDecl, SchemaError};
