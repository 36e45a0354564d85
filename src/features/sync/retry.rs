//! Bounded retry with exponential backoff.
//!
//! The policy only answers "may I try again, and after how long". The engine
//! owns the loop because each failure kind is handled differently.

use std::time::Duration;

use super::operation::ErrorType;

/// Retry behaviour for transient delivery failures within one sync pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per operation per pass, including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy with no waiting between attempts.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            factor: 1.0,
        }
    }

    /// Delay before retry number `retry` (0 for the first retry).
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.factor.powi(exponent);

        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }

    /// Whether a failure of `kind` after `attempts` tries in this pass
    /// warrants another try right away (after [`delay`](Self::delay)).
    ///
    /// Network failures end the pass instead and validation failures are final.
    #[must_use]
    pub const fn should_retry(&self, kind: ErrorType, attempts: u32) -> bool {
        matches!(kind, ErrorType::Timeout | ErrorType::Server) && attempts < self.max_attempts
    }
}
