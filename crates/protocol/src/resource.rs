//! The closed set of resource kinds that can appear embedded in events.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A first-class ARI resource type, named as in the Swagger models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Application,
    Asterisk,
    Bridge,
    Channel,
    DeviceState,
    Endpoint,
    LiveRecording,
    Mailbox,
    Playback,
    Sound,
    StoredRecording,
}

/// Returned when a declared data type is not one of the known resource kinds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource type: {0}")]
pub struct UnknownResourceKind(pub String);

impl ResourceKind {
    pub const ALL: [ResourceKind; 11] = [
        ResourceKind::Application,
        ResourceKind::Asterisk,
        ResourceKind::Bridge,
        ResourceKind::Channel,
        ResourceKind::DeviceState,
        ResourceKind::Endpoint,
        ResourceKind::LiveRecording,
        ResourceKind::Mailbox,
        ResourceKind::Playback,
        ResourceKind::Sound,
        ResourceKind::StoredRecording,
    ];

    /// Model name as it appears in `dataType`/`type` declarations.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Application => "Application",
            ResourceKind::Asterisk => "Asterisk",
            ResourceKind::Bridge => "Bridge",
            ResourceKind::Channel => "Channel",
            ResourceKind::DeviceState => "DeviceState",
            ResourceKind::Endpoint => "Endpoint",
            ResourceKind::LiveRecording => "LiveRecording",
            ResourceKind::Mailbox => "Mailbox",
            ResourceKind::Playback => "Playback",
            ResourceKind::Sound => "Sound",
            ResourceKind::StoredRecording => "StoredRecording",
        }
    }

    /// Payload fields that make up the identity, in rendering order.
    ///
    /// Empty for singletons (`Asterisk`), which cannot be addressed per instance.
    pub fn identity_fields(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Application
            | ResourceKind::DeviceState
            | ResourceKind::LiveRecording
            | ResourceKind::Mailbox
            | ResourceKind::StoredRecording => &["name"],
            ResourceKind::Bridge
            | ResourceKind::Channel
            | ResourceKind::Playback
            | ResourceKind::Sound => &["id"],
            ResourceKind::Endpoint => &["technology", "resource"],
            ResourceKind::Asterisk => &[],
        }
    }

    /// REST collection path under `/ari`.
    pub fn collection(&self) -> &'static str {
        match self {
            ResourceKind::Application => "applications",
            ResourceKind::Asterisk => "asterisk",
            ResourceKind::Bridge => "bridges",
            ResourceKind::Channel => "channels",
            ResourceKind::DeviceState => "deviceStates",
            ResourceKind::Endpoint => "endpoints",
            ResourceKind::LiveRecording => "recordings/live",
            ResourceKind::Mailbox => "mailboxes",
            ResourceKind::Playback => "playbacks",
            ResourceKind::Sound => "sounds",
            ResourceKind::StoredRecording => "recordings/stored",
        }
    }

    /// Names of the path parameters that carry the identity in REST calls,
    /// parallel to [`identity_fields`](Self::identity_fields).
    pub fn path_params(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Application => &["applicationName"],
            ResourceKind::Asterisk => &[],
            ResourceKind::Bridge => &["bridgeId"],
            ResourceKind::Channel => &["channelId"],
            ResourceKind::DeviceState => &["deviceName"],
            ResourceKind::Endpoint => &["tech", "resource"],
            ResourceKind::LiveRecording | ResourceKind::StoredRecording => &["recordingName"],
            ResourceKind::Mailbox => &["mailboxName"],
            ResourceKind::Playback => &["playbackId"],
            ResourceKind::Sound => &["soundId"],
        }
    }

    /// Whether instances can be keyed (and therefore listened to) individually.
    pub fn is_addressable(&self) -> bool {
        !self.identity_fields().is_empty()
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = UnknownResourceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownResourceKind(s.to_string()))
    }
}
