//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Immutable retry policy.
///
/// `jitter` must stay below 1.0; [`crate::config::validate_config`] enforces
/// this for loaded configuration, and [`RetryPolicy::backoff`] clamps anyway.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per call, including the first one.
    pub max_attempts: u32,
    /// Base wait before the first retry.
    pub initial_interval: Duration,
    /// Cap for any single wait.
    pub max_interval: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Fraction of the wait that is randomized, in `[0, 1)`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_interval: Duration::from_millis(config.initial_interval_ms),
            max_interval: Duration::from_millis(config.max_interval_ms),
            multiplier: config.multiplier,
            jitter: config.jitter,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// The un-jittered wait for `attempt`: `initial * multiplier^attempt`, capped.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let max_secs = self.max_interval.as_secs_f64();
        let secs = self.initial_interval.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= max_secs {
            return self.max_interval;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Wait before the retry following `attempt` (0-based).
    ///
    /// Jitter draws `u` uniformly from `[-1, 1)` and adds `u * d * jitter`.
    /// The result is clamped to `[0, max_interval]`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_secs_f64();
        let jitter = self.jitter.clamp(0.0, 1.0);
        let offset = if jitter > 0.0 && base > 0.0 {
            rand::thread_rng().gen_range(-1.0..1.0) * base * jitter
        } else {
            0.0
        };

        let secs = (base + offset).clamp(0.0, self.max_interval.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter: f64) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(1_000),
            multiplier: 2.0,
            jitter,
        }
    }

    #[test]
    fn test_backoff_without_jitter_is_exact() {
        let p = policy(0.0);
        assert_eq!(p.backoff(0), Duration::from_millis(100));
        assert_eq!(p.backoff(1), Duration::from_millis(200));
        assert_eq!(p.backoff(2), Duration::from_millis(400));
        assert_eq!(p.backoff(3), Duration::from_millis(800));
        assert_eq!(p.backoff(4), Duration::from_millis(1_000));
        assert_eq!(p.backoff(u32::MAX), Duration::from_millis(1_000));
    }

    #[test]
    fn test_backoff_stays_within_jitter_band_and_cap() {
        let p = policy(0.5);
        for attempt in 0..12 {
            let base = p.base_delay(attempt);
            for _ in 0..200 {
                let d = p.backoff(attempt);
                assert!(d >= base.mul_f64(0.5), "attempt {attempt}: {d:?} below band");
                assert!(d <= p.max_interval, "attempt {attempt}: {d:?} above cap");
            }
        }
    }

    #[test]
    fn test_backoff_mean_is_non_decreasing() {
        let p = policy(0.3);
        let mean = |attempt: u32| -> f64 {
            (0..2_000).map(|_| p.backoff(attempt).as_secs_f64()).sum::<f64>() / 2_000.0
        };

        let means: Vec<f64> = (0..8).map(mean).collect();
        for pair in means.windows(2) {
            // Tolerance for sampling noise once both sit at the cap.
            assert!(pair[1] + 0.02 >= pair[0], "means regressed: {means:?}");
        }
    }

    #[test]
    fn test_backoff_never_negative_with_oversized_jitter() {
        let p = policy(5.0);
        for attempt in 0..6 {
            for _ in 0..100 {
                assert!(p.backoff(attempt) <= p.max_interval);
            }
        }
    }

    #[test]
    fn test_policy_from_config() {
        let p = RetryPolicy::from(&RetryConfig {
            max_attempts: 0,
            initial_interval_ms: 50,
            max_interval_ms: 400,
            multiplier: 3.0,
            jitter: 0.2,
        });
        assert_eq!(p.max_attempts, 1);
        assert_eq!(p.base_delay(1), Duration::from_millis(150));
        assert_eq!(p.base_delay(2), Duration::from_millis(400));
    }
}
