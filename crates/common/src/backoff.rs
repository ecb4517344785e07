//! Exponential backoff for bounded retries.

use std::time::Duration;

/// Exponential backoff over a bounded number of attempts.
///
/// Attempt `n` (0-indexed) gets `initial * multiplier^n`, capped at `max`.
/// The same shape serves two callers: pauses between vote attempts that hit
/// a write conflict, and growing connect budgets for the startup ping.
#[derive(Debug, Clone)]
pub struct Backoff {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Budget for the first attempt.
    pub initial: Duration,
    /// Upper bound for any single budget.
    pub max: Duration,
    /// Growth factor between consecutive attempts.
    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial: Duration::from_millis(10),
            max: Duration::from_millis(250),
            multiplier: 2.0,
        }
    }
}

impl Backoff {
    /// Backoff used for the startup database ping: 2s growing by 1.25 per attempt.
    #[must_use]
    pub const fn startup() -> Self {
        Self {
            max_attempts: 5,
            initial: Duration::from_secs(2),
            max: Duration::from_secs(30),
            multiplier: 1.25,
        }
    }

    /// Budget for the given attempt number (0-indexed).
    #[must_use]
    pub fn budget_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let nanos = self.initial.as_nanos() as f64 * self.multiplier.powi(exponent);
        if !nanos.is_finite() || nanos >= self.max.as_nanos() as f64 {
            return self.max;
        }
        Duration::from_nanos(nanos.round() as u64)
    }

    /// Whether another attempt is allowed after `attempts` have been made.
    #[must_use]
    pub const fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Iterate over the budgets of every allowed attempt.
    pub fn budgets(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts).map(|attempt| self.budget_for_attempt(attempt))
    }
}
