//! Bounded delay between failed watch attempts.

use std::time::Duration;

/// Exponential delay applied after a transient watch error.
///
/// The delay starts at `initial`, grows by `multiplier` after each consecutive
/// failure, never exceeds `max`, and resets once a value arrives. A backoff of
/// zero retries immediately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: u32,
}

impl Backoff {
    /// Doubling backoff from `initial` up to `max`.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            multiplier: 2,
        }
    }

    /// Retry immediately after every error.
    pub fn none() -> Self {
        Self {
            initial: Duration::ZERO,
            max: Duration::ZERO,
            multiplier: 1,
        }
    }

    /// Set the growth factor. Zero is treated as one.
    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier.max(1);
        self
    }

    /// Delay to wait after `failures` consecutive errors (1-based).
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 || self.initial.is_zero() {
            return Duration::ZERO;
        }
        if self.multiplier == 1 {
            return self.initial.min(self.max);
        }
        let mut delay = self.initial;
        for _ in 1..failures {
            match delay.checked_mul(self.multiplier) {
                Some(next) if next < self.max => delay = next,
                _ => return self.max,
            }
        }
        delay.min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::exponential(Duration::from_millis(100), Duration::from_secs(30))
    }
}
