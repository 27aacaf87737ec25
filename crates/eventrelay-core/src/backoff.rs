//! Exponential reconnect backoff.
//!
//! The policy is pure: it maps a [`BackoffState`] to the delay to sleep and
//! the state to carry into the next attempt. The stream client owns the state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the reconnect backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first reconnect attempt.
    #[serde(default = "default_initial_delay", with = "duration_ms")]
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    #[serde(default = "default_max_delay", with = "duration_ms")]
    pub max_delay: Duration,
    /// Growth factor applied after each failure.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_initial_delay() -> Duration { Duration::from_secs(1) }
fn default_max_delay() -> Duration { Duration::from_secs(30) }
fn default_multiplier() -> f64 { 2.0 }

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            multiplier: default_multiplier(),
        }
    }
}

/// Backoff progress between reconnect attempts.
///
/// Invariant: `initial_delay <= current_delay <= max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffState {
    pub current_delay: Duration,
    pub consecutive_failures: u32,
}

/// Stateless backoff policy.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub config: BackoffConfig,
}

impl BackoffPolicy {
    pub fn new(config: BackoffConfig) -> Self {
        let mut config = config;
        if config.max_delay < config.initial_delay {
            config.max_delay = config.initial_delay;
        }
        if config.multiplier.is_nan() || config.multiplier < 1.0 {
            config.multiplier = 1.0;
        }
        Self { config }
    }

    /// State after a successful connection (and the starting state).
    pub fn reset(&self) -> BackoffState {
        BackoffState {
            current_delay: self.config.initial_delay,
            consecutive_failures: 0,
        }
    }

    /// Record a failure: returns the state for the next attempt and the delay to sleep now.
    pub fn next_delay(&self, state: BackoffState) -> (BackoffState, Duration) {
        let delay = state.current_delay.min(self.config.max_delay);
        let grown = delay.as_secs_f64() * self.config.multiplier;
        let next = if grown >= self.config.max_delay.as_secs_f64() {
            self.config.max_delay
        } else {
            Duration::from_secs_f64(grown).max(self.config.initial_delay)
        };

        let state = BackoffState {
            current_delay: next,
            consecutive_failures: state.consecutive_failures.saturating_add(1),
        };
        (state, delay)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

/// Serialize durations as integer milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
