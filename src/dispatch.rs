//! Rate-limited dispatch of light states to the publish capability

use crate::audio::LedState;
use crate::protocol::{LedCommand, Publisher};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sends a light state only when it differs from the last one sent, or when
/// the minimum interval has passed since the last send.
///
/// Publish failures are logged and dropped; the next frame carries a fresh state.
pub struct ActuationDispatcher {
    publisher: Arc<dyn Publisher>,
    topic: String,
    min_interval: Duration,
    last_sent: LedState,
    last_sent_at: Option<Instant>,
    failures: u64,
}

impl ActuationDispatcher {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        topic: impl Into<String>,
        min_interval: Duration,
    ) -> Self {
        Self {
            publisher,
            topic: topic.into(),
            min_interval,
            last_sent: LedState::OFF,
            last_sent_at: None,
            failures: 0,
        }
    }

    /// Forget the last sent state so the next call always emits.
    pub fn reset(&mut self) {
        self.last_sent = LedState::OFF;
        self.last_sent_at = None;
    }

    /// Emit `state` if it changed or the interval elapsed. Returns whether a
    /// command was emitted (regardless of publish success).
    pub fn maybe_dispatch(&mut self, state: LedState, now: Instant) -> bool {
        let changed = state != self.last_sent;
        let elapsed = self
            .last_sent_at
            .map(|at| now.saturating_duration_since(at) >= self.min_interval)
            .unwrap_or(true);

        if !(changed || elapsed) {
            return false;
        }

        self.publish(&LedCommand::set(state));
        self.last_sent = state;
        self.last_sent_at = Some(now);
        true
    }

    /// Unconditionally turn every light off.
    pub fn force_off(&mut self, now: Instant) {
        self.publish(&LedCommand::off());
        self.last_sent = LedState::OFF;
        self.last_sent_at = Some(now);
    }

    pub fn last_sent(&self) -> LedState {
        self.last_sent
    }

    pub fn last_sent_at(&self) -> Option<Instant> {
        self.last_sent_at
    }

    /// Number of publish attempts that failed
    pub fn failures(&self) -> u64 {
        self.failures
    }

    fn publish(&mut self, command: &LedCommand) {
        let payload = match command.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                self.failures += 1;
                log::error!("Failed to encode light command: {}", e);
                return;
            }
        };

        match self.publisher.send(&self.topic, &payload) {
            Ok(()) => log::trace!("Sent [{}]: {}", self.topic, payload),
            Err(e) => {
                self.failures += 1;
                log::debug!("Dropped light command {}: {}", payload, e);
            }
        }
    }
}
