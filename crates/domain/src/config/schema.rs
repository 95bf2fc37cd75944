use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event schema
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where the event model (field names and declared types per event) comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaSourceKind {
    /// Download `api-docs/events.json` from the server before connecting.
    #[default]
    Remote,
    /// Use the event catalogue compiled into the client.
    Builtin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub source: SchemaSourceKind,
    /// HTTP timeout for the schema download.
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            source: SchemaSourceKind::default(),
            timeout_ms: d_timeout_ms(),
        }
    }
}

fn d_timeout_ms() -> u64 {
    10_000
}
