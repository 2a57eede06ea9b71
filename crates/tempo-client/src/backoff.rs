//! Reconnect backoff policy.
//!
//! The delay schedule is a value, not a loop: the connection actor asks
//! `delay_for(attempt)` when scheduling and `exhausted(attempt)` when
//! deciding whether to give up, so the parameters are testable without a
//! transport anywhere in sight.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// Exponential backoff parameters for automatic reconnection.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay before the first attempt. Default: 5 seconds.
    pub base: Duration,
    /// Growth factor per attempt. Default: 2.0.
    pub multiplier: f64,
    /// Upper bound on any single delay. Default: 60 seconds.
    pub max_delay: Duration,
    /// Attempts before giving up and entering the Failed state.
    /// Default: 10.
    pub max_attempts: u32,
    /// Random 0..jitter added to each delay so a fleet of clients that
    /// lost the same server doesn't redial in lockstep. Default: 1 second.
    pub jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            max_attempts: 10,
            jitter: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    /// Clamp out-of-range values so the policy is safe to use.
    ///
    /// Rules: `multiplier` at least 1.0, `max_attempts` at least 1,
    /// `max_delay` at least `base`.
    pub fn validated(mut self) -> Self {
        if self.multiplier < 1.0 {
            warn!(
                multiplier = self.multiplier,
                "backoff multiplier below 1.0 — clamping"
            );
            self.multiplier = 1.0;
        }
        if self.max_attempts == 0 {
            warn!("backoff max_attempts of 0 — clamping to 1");
            self.max_attempts = 1;
        }
        if self.max_delay < self.base {
            self.max_delay = self.base;
        }
        self
    }

    /// The deterministic delay before attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let raw =
            self.base.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = raw.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// `delay_for` plus random jitter in `0..jitter`.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let mut delay = self.delay_for(attempt);
        if !self.jitter.is_zero() {
            let extra_us = rand::rng()
                .random_range(0..self.jitter.as_micros().max(1) as u64);
            delay += Duration::from_micros(extra_us);
        }
        delay
    }

    /// Whether attempt `attempt` is past the cap.
    pub fn exhausted(&self, attempt: u32) -> bool {
        attempt > self.max_attempts
    }
}
