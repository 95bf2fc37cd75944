//! Core types: errors and lifecycle notifications.

use std::time::Duration;

use crate::identity::IdentityError;

/// Top-level client error.
#[derive(thiserror::Error, Debug)]
pub enum AriError {
    #[error("config: {0}")]
    Config(String),
    #[error("API load: {0}")]
    SchemaLoad(String),
    #[error("network: {0}")]
    Network(String),
    #[error("connection attempts exceeded max retries ({attempts}): {message}")]
    RetriesExhausted { attempts: u32, message: String },
    #[error("stopped before the event socket opened")]
    Stopped,
    #[error("client already started")]
    AlreadyStarted,
    #[error("client has been dropped")]
    ClientDropped,
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Why a single inbound frame was dropped.  Never fatal to the connection.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("unknown event type: {0}")]
    UnknownEventType(String),
    #[error("binary frame is not valid UTF-8")]
    NotUtf8,
}

/// Lifecycle notifications delivered to notification listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The event socket opened (first connect or any reconnect).
    Connected,
    /// A reconnect attempt is scheduled after `delay`.
    Reconnecting {
        attempt: u32,
        delay: Duration,
        error: Option<String>,
    },
    /// The retry budget is spent; the client will not reconnect.
    MaxRetriesExceeded {
        attempts: u32,
        error: Option<String>,
    },
    /// Liveness pong received.
    Pong,
    /// Event schema could not be loaded (host unreachable or invalid document).
    ApiLoadError { message: String },
    /// Transport failure during non-event HTTP traffic.
    NetworkError { message: String },
    /// One inbound frame was discarded.
    FrameDropped { reason: FrameError },
    /// `stop()` completed.
    Stopped,
}

impl Notification {
    /// Stable name, as used by other ARI client libraries.
    pub fn name(&self) -> &'static str {
        match self {
            Notification::Connected => "WebSocketConnected",
            Notification::Reconnecting { .. } => "WebSocketReconnecting",
            Notification::MaxRetriesExceeded { .. } => "WebSocketMaxRetries",
            Notification::Pong => "pong",
            Notification::ApiLoadError { .. } => "APILoadError",
            Notification::NetworkError { .. } => "APINetworkError",
            Notification::FrameDropped { .. } => "FrameDropped",
            Notification::Stopped => "WebSocketStopped",
        }
    }
}
