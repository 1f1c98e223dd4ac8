//! Retry backoff policy shared by every provider call.
//!
//! `delay(attempt)` is a pure function of the attempt number: exponential
//! growth from a base delay up to a ceiling. Jitter, when configured, is
//! added on top by `delay_with_jitter` and never pushes the total below the
//! deterministic delay.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Backoff policy for failed provider calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Maximum number of attempts per provider (including first try)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Ceiling on any single delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Growth factor (delay *= multiplier after each retry)
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Fraction of the delay added as uniform random jitter (0.0 disables)
    #[serde(default)]
    pub jitter_fraction: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay() -> u64 {
    2000
}
fn default_max_delay() -> u64 {
    30000
}
fn default_multiplier() -> f64 {
    2.0
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            multiplier: default_multiplier(),
            jitter_fraction: 0.0,
        }
    }
}

impl BackoffPolicy {
    /// Deterministic delay for a specific attempt (1-indexed), without jitter.
    ///
    /// Non-decreasing in the attempt number up to `max_delay_ms`.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::from_millis(self.base_delay_ms.min(self.max_delay_ms));
        }

        let delay = self.base_delay_ms as f64 * self.multiplier.powi((attempt - 1) as i32);
        let capped = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }

    /// Delay with bounded random jitter added on top.
    pub fn delay_with_jitter(&self, attempt: u32) -> Duration {
        let base = self.delay(attempt);
        if self.jitter_fraction <= 0.0 {
            return base;
        }

        let spread = base.as_millis() as f64 * self.jitter_fraction;
        let extra = rand::thread_rng().gen_range(0.0..=spread);
        base + Duration::from_millis(extra as u64)
    }

    /// Check if another attempt is allowed after `attempt` failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_progression() {
        let policy = BackoffPolicy {
            base_delay_ms: 1000,
            multiplier: 2.0,
            max_delay_ms: 10000,
            ..Default::default()
        };

        assert_eq!(policy.delay(1), Duration::from_millis(1000));
        assert_eq!(policy.delay(2), Duration::from_millis(2000));
        assert_eq!(policy.delay(3), Duration::from_millis(4000));
        assert_eq!(policy.delay(4), Duration::from_millis(8000));
        assert_eq!(policy.delay(5), Duration::from_millis(10000)); // Capped
        assert_eq!(policy.delay(6), Duration::from_millis(10000));
    }

    #[test]
    fn test_delay_non_decreasing() {
        let policy = BackoffPolicy {
            base_delay_ms: 500,
            multiplier: 1.7,
            max_delay_ms: 60000,
            ..Default::default()
        };

        let mut previous = Duration::ZERO;
        for attempt in 1..20 {
            let delay = policy.delay(attempt);
            assert!(delay >= previous, "delay decreased at attempt {attempt}");
            previous = delay;
        }
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = BackoffPolicy {
            base_delay_ms: 1000,
            jitter_fraction: 0.5,
            ..Default::default()
        };

        for _ in 0..50 {
            let jittered = policy.delay_with_jitter(1);
            assert!(jittered >= Duration::from_millis(1000));
            assert!(jittered <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn test_zero_jitter_is_deterministic() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_with_jitter(2), policy.delay(2));
    }

    #[test]
    fn test_should_retry() {
        let policy = BackoffPolicy {
            max_attempts: 3,
            ..Default::default()
        };

        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(4));
    }
}
