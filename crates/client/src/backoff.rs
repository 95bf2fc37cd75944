//! Reconnect policy with doubling, capped back-off and a bounded attempt budget.

use std::time::Duration;

use ari_domain::config::ReconnectConfig;

/// Controls how the client reconnects after the event socket drops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectBackoff {
    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (cap).
    pub max_delay: Duration,
    /// Reconnect delays that may be scheduled between two successful opens.
    /// The next failure after the budget is spent is fatal.
    pub max_attempts: u32,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            max_attempts: 10,
        }
    }
}

impl From<&ReconnectConfig> for ReconnectBackoff {
    fn from(cfg: &ReconnectConfig) -> Self {
        Self {
            initial_delay: cfg.initial_delay(),
            max_delay: cfg.max_delay(),
            max_attempts: cfg.max_attempts,
        }
    }
}

impl ReconnectBackoff {
    /// Delay for the given attempt number (1-indexed):
    /// `min(max_delay, initial_delay * 2^(attempt - 1))`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1);
        let factor = 1u32.checked_shl(shift).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Outcome of asking the scheduler for another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Reconnect after `delay`; `attempt` counts from 1 since the last open.
    Retry { attempt: u32, delay: Duration },
    /// Budget exhausted after `attempts` scheduled retries.
    GiveUp { attempts: u32 },
}

/// Stateful back-off counter.  Scheduling the timer is the caller's job.
#[derive(Debug, Clone)]
pub struct BackoffScheduler {
    policy: ReconnectBackoff,
    attempts: u32,
    current: Duration,
}

impl BackoffScheduler {
    pub fn new(policy: ReconnectBackoff) -> Self {
        let current = policy.initial_delay.min(policy.max_delay);
        Self {
            policy,
            attempts: 0,
            current,
        }
    }

    /// Consume one attempt.  The delay doubles (up to the cap) on every
    /// permitted call.
    pub fn next(&mut self) -> RetryDecision {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts > self.policy.max_attempts {
            return RetryDecision::GiveUp {
                attempts: self.policy.max_attempts,
            };
        }

        let delay = self.current;
        self.current = self
            .current
            .checked_mul(2)
            .unwrap_or(self.policy.max_delay)
            .min(self.policy.max_delay);

        RetryDecision::Retry {
            attempt: self.attempts,
            delay,
        }
    }

    /// Back to the initial delay with a full budget.  Called when a session
    /// starts and on every successful transport open.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.current = self.policy.initial_delay.min(self.policy.max_delay);
    }

    /// Attempts consumed since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> &ReconnectBackoff {
        &self.policy
    }
}
