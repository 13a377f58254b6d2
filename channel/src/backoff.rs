//! Reconnect delay schedule: capped exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// First retry delay, matching the dashboard's original reconnect interval.
const INITIAL_DELAY_MS: u64 = 500;
const MAX_DELAY_MS: u64 = 10_000;

pub(crate) struct Backoff {
    attempt: u32,
}

impl Backoff {
    pub(crate) fn new() -> Self {
        Self { attempt: 0 }
    }

    /// Restart the schedule after a successful connection.
    pub(crate) fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Next delay: doubles per attempt up to the cap, plus uniform jitter of
    /// up to half the base so simultaneous clients spread out.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let base = base_delay_ms(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        let jitter = rand::rng().random_range(0..=base / 2);
        Duration::from_millis(base + jitter)
    }
}

fn base_delay_ms(attempt: u32) -> u64 {
    INITIAL_DELAY_MS
        .saturating_mul(1_u64 << attempt.min(6))
        .min(MAX_DELAY_MS)
}

#[cfg(test)]
#[path = "backoff_test.rs"]
mod tests;
