//! Retry policies
//!
//! Delays grow multiplicatively and strictly between attempts.

use crate::error::PolicyError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Attempt budget and backoff schedule for one call class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay_ms: u64,
    /// Growth factor applied after each retry
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Critical-path defaults: more attempts, longer delays, doubling
    #[must_use]
    pub fn critical() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 1_500,
            backoff_multiplier: 2.0,
        }
    }

    /// Asset-path defaults: fewer attempts, shorter delays, gentler growth
    #[must_use]
    pub fn asset() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            backoff_multiplier: 1.5,
        }
    }

    /// With attempt budget
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// With initial delay
    #[inline]
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With backoff multiplier
    #[inline]
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Delay before the second attempt
    #[inline]
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Delay following `current`
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        let current_ms = u64::try_from(current.as_millis()).unwrap_or(u64::MAX);
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let scaled = (current_ms as f64 * self.backoff_multiplier).round() as u64;
        Duration::from_millis(scaled.max(current_ms.saturating_add(1)))
    }

    /// Sleeps between attempts when every attempt fails transiently
    #[must_use]
    pub fn delay_schedule(&self) -> Vec<Duration> {
        let retries = self.max_attempts.saturating_sub(1) as usize;
        let mut schedule = Vec::with_capacity(retries);
        let mut delay = self.initial_delay();
        for _ in 0..retries {
            schedule.push(delay);
            delay = self.next_delay(delay);
        }
        schedule
    }

    /// Check the policy is usable
    ///
    /// # Errors
    /// Returns a [`PolicyError`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_attempts == 0 {
            return Err(PolicyError::NoAttempts);
        }
        if !(self.backoff_multiplier.is_finite() && self.backoff_multiplier > 1.0) {
            return Err(PolicyError::NonIncreasingBackoff(self.backoff_multiplier));
        }
        Ok(())
    }
}
