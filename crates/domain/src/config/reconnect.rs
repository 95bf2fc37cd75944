use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Reconnect back-off
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Exponential back-off applied when the event socket drops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt.
    #[serde(default = "d_100")]
    pub initial_delay_ms: u64,
    /// Ceiling for the doubled delay.
    #[serde(default = "d_10000")]
    pub max_delay_ms: u64,
    /// Reconnect delays that may be scheduled before the connection is
    /// declared permanently failed.  Reset on every successful open.
    #[serde(default = "d_10")]
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: d_100(),
            max_delay_ms: d_10000(),
            max_attempts: d_10(),
        }
    }
}

impl ReconnectConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

fn d_100() -> u64 {
    100
}

fn d_10000() -> u64 {
    10_000
}

fn d_10() -> u32 {
    10
}
