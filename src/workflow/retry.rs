//! Per-step retry policy
//!
//! Only transient capability errors are retried. The delay before retry `n`
//! (1-based, counting failed attempts) is `interval * backoff_rate^(n-1)`, capped
//! at `max_delay`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::definition::DefinitionError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    #[serde(default = "default_backoff_rate")]
    pub backoff_rate: f64,

    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    /// Randomize delays by up to `jitter_factor` of their length
    #[serde(default)]
    pub jitter: bool,

    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            backoff_rate: default_backoff_rate(),
            max_attempts: default_max_attempts(),
            max_delay: default_max_delay(),
            jitter: false,
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt may follow `attempt` failed attempts
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the retry that follows failed attempt `attempt`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let seconds = self.interval.as_secs_f64() * self.backoff_rate.powi(exponent);
        let delay = if seconds.is_finite() {
            Duration::from_secs_f64(seconds.min(self.max_delay.as_secs_f64()))
        } else {
            self.max_delay
        };
        self.apply_jitter(delay.min(self.max_delay))
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if !self.jitter || self.jitter_factor <= 0.0 {
            return delay;
        }
        let mut rng = rand::rng();
        let range = delay.as_secs_f64() * self.jitter_factor;
        let jitter = rng.random_range(-range / 2.0..=range / 2.0);
        Duration::from_secs_f64((delay.as_secs_f64() + jitter).max(0.0))
    }

    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.max_attempts == 0 {
            return Err(DefinitionError::InvalidRetry(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.backoff_rate.is_finite() || self.backoff_rate < 1.0 {
            return Err(DefinitionError::InvalidRetry(format!(
                "backoff_rate must be >= 1.0, got {}",
                self.backoff_rate
            )));
        }
        if self.interval > self.max_delay {
            return Err(DefinitionError::InvalidRetry(format!(
                "interval {:?} exceeds max_delay {:?}",
                self.interval, self.max_delay
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(DefinitionError::InvalidRetry(format!(
                "jitter_factor must be between 0 and 1, got {}",
                self.jitter_factor
            )));
        }
        Ok(())
    }
}

fn default_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_backoff_rate() -> f64 {
    2.0
}

fn default_max_attempts() -> u32 {
    3
}

fn default_max_delay() -> Duration {
    Duration::from_secs(300)
}

fn default_jitter_factor() -> f64 {
    0.3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(5));
        assert_eq!(policy.delay_after(2), Duration::from_secs(10));
        assert!(policy.allows_retry_after(2));
        assert!(!policy.allows_retry_after(3));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(12),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_after(3), Duration::from_secs(12));
        assert_eq!(policy.delay_after(60), Duration::from_secs(12));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy {
            jitter: true,
            jitter_factor: 0.5,
            ..RetryPolicy::default()
        };
        for _ in 0..20 {
            let secs = policy.delay_after(2).as_secs_f64();
            assert!((7.5..=12.5).contains(&secs));
        }
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::default().validate().is_ok());
        let zero = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        assert!(zero.validate().is_err());
        let shrinking = RetryPolicy {
            backoff_rate: 0.5,
            ..RetryPolicy::default()
        };
        assert!(shrinking.validate().is_err());
    }

    #[test]
    fn test_deserialize_humantime() {
        let policy: RetryPolicy =
            toml::from_str("interval = \"2s\"\nbackoff_rate = 3.0\nmax_attempts = 4").unwrap();
        assert_eq!(policy.interval, Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(18));
        assert_eq!(policy.max_delay, Duration::from_secs(300));
    }
}
