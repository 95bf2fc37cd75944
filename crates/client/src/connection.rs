//! Connection state machine.
//!
//! Pure state: every input returns the [`Effect`]s the driver must carry
//! out, in order.  No I/O, no timers, no listeners run in here, which keeps
//! the reconnect rules testable without a socket.

use std::time::Duration;

use crate::backoff::{BackoffScheduler, ReconnectBackoff, RetryDecision};
use crate::types::Notification;

/// Message used when a failure carried no error of its own.
const UNKNOWN_ERROR: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not started yet.
    Idle,
    /// Transport open in flight.
    Connecting,
    Open,
    /// Waiting out a back-off delay.
    Reconnecting,
    /// Stopped, or the retry budget ran out.
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        }
    }
}

/// How the `start` call ends.  Settled at most once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Opened,
    Exhausted { attempts: u32, message: String },
    Stopped,
}

/// Work requested of the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open the transport.
    Connect,
    /// Arm the retry timer; expiry feeds [`ConnectionMachine::on_retry_due`].
    ScheduleReconnect(Duration),
    /// Disarm the retry timer.
    CancelReconnect,
    /// Close the transport (or abandon an open in flight), then report
    /// [`ConnectionMachine::on_closed`].
    Close,
    SendPing,
    Notify(Notification),
    SettleStart(StartOutcome),
}

#[derive(Debug)]
pub struct ConnectionMachine {
    state: ConnectionState,
    backoff: BackoffScheduler,
    /// An error already triggered the reconnect procedure; the close that
    /// follows it is not a second failure.
    processing_error: bool,
    /// `stop()` asked for the close; absorb the next close signal.
    close_requested: bool,
    start_settled: bool,
}

impl ConnectionMachine {
    pub fn new(policy: ReconnectBackoff) -> Self {
        Self {
            state: ConnectionState::Idle,
            backoff: BackoffScheduler::new(policy),
            processing_error: false,
            close_requested: false,
            start_settled: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Stopped or out of retries.  The driver exits once this holds.
    pub fn is_finished(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    /// Retries consumed since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.backoff.attempts()
    }

    // ── Inputs ──────────────────────────────────────────────────────

    pub fn start(&mut self) -> Vec<Effect> {
        if !matches!(self.state, ConnectionState::Idle | ConnectionState::Closed) {
            return Vec::new();
        }
        self.backoff.reset();
        self.processing_error = false;
        self.close_requested = false;
        self.start_settled = false;
        self.state = ConnectionState::Connecting;
        vec![Effect::Connect]
    }

    pub fn on_opened(&mut self) -> Vec<Effect> {
        if self.state != ConnectionState::Connecting {
            return Vec::new();
        }
        if self.close_requested {
            return vec![Effect::Close];
        }

        self.processing_error = false;
        self.backoff.reset();
        self.state = ConnectionState::Open;

        let mut effects = vec![Effect::Notify(Notification::Connected)];
        if let Some(settle) = self.settle(StartOutcome::Opened) {
            effects.push(settle);
        }
        effects
    }

    pub fn on_error(&mut self, error: impl Into<String>) -> Vec<Effect> {
        if self.close_requested || !self.is_live() {
            return Vec::new();
        }
        self.processing_error = true;
        self.reconnect(Some(error.into()))
    }

    pub fn on_closed(&mut self) -> Vec<Effect> {
        if self.close_requested {
            self.close_requested = false;
            return self.finish_stop();
        }
        if std::mem::take(&mut self.processing_error) || !self.is_live() {
            return Vec::new();
        }
        self.reconnect(None)
    }

    pub fn on_retry_due(&mut self) -> Vec<Effect> {
        if self.state != ConnectionState::Reconnecting {
            return Vec::new();
        }
        self.processing_error = false;
        self.state = ConnectionState::Connecting;
        vec![Effect::Connect]
    }

    pub fn on_pong(&mut self) -> Vec<Effect> {
        if self.state != ConnectionState::Open {
            return Vec::new();
        }
        vec![Effect::Notify(Notification::Pong)]
    }

    /// Idempotent.  While a retry is pending there is no transport to
    /// close, so the session ends here and then.
    pub fn stop(&mut self) -> Vec<Effect> {
        match self.state {
            ConnectionState::Idle | ConnectionState::Closed => Vec::new(),
            ConnectionState::Reconnecting => {
                let mut effects = vec![Effect::CancelReconnect];
                effects.extend(self.finish_stop());
                effects
            }
            ConnectionState::Connecting | ConnectionState::Open => {
                if self.close_requested {
                    return Vec::new();
                }
                self.close_requested = true;
                vec![Effect::Close]
            }
        }
    }

    pub fn ping(&mut self) -> Vec<Effect> {
        if self.state != ConnectionState::Open || self.close_requested {
            return Vec::new();
        }
        vec![Effect::SendPing]
    }

    // ── Internals ───────────────────────────────────────────────────

    fn is_live(&self) -> bool {
        matches!(self.state, ConnectionState::Connecting | ConnectionState::Open)
    }

    fn reconnect(&mut self, error: Option<String>) -> Vec<Effect> {
        match self.backoff.next() {
            RetryDecision::Retry { attempt, delay } => {
                self.state = ConnectionState::Reconnecting;
                vec![
                    Effect::ScheduleReconnect(delay),
                    Effect::Notify(Notification::Reconnecting {
                        attempt,
                        delay,
                        error,
                    }),
                ]
            }
            RetryDecision::GiveUp { attempts } => {
                self.state = ConnectionState::Closed;
                self.processing_error = false;
                let message = error.clone().unwrap_or_else(|| UNKNOWN_ERROR.to_string());

                let mut effects = vec![Effect::Notify(Notification::MaxRetriesExceeded {
                    attempts,
                    error,
                })];
                if let Some(settle) = self.settle(StartOutcome::Exhausted { attempts, message }) {
                    effects.push(settle);
                }
                effects
            }
        }
    }

    fn finish_stop(&mut self) -> Vec<Effect> {
        self.state = ConnectionState::Closed;
        self.processing_error = false;
        let mut effects = vec![Effect::Notify(Notification::Stopped)];
        if let Some(settle) = self.settle(StartOutcome::Stopped) {
            effects.push(settle);
        }
        effects
    }

    fn settle(&mut self, outcome: StartOutcome) -> Option<Effect> {
        if self.start_settled {
            return None;
        }
        self.start_settled = true;
        Some(Effect::SettleStart(outcome))
    }
}
