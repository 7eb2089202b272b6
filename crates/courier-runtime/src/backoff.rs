//! Delay policy between failed fetches.

use std::time::Duration;

use rand::Rng;

use courier_core::TransportError;

use crate::config::BackoffConfig;

/// Exponential backoff with optional jitter and no retry ceiling.
///
/// The delay after the `n`-th consecutive failure (1-based) is
/// `initial * multiplier^(n-1)`, capped at `max`, then spread by up to
/// `± jitter` of itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound on the computed delay, before jitter.
    pub max_delay: Duration,
    /// Growth factor per consecutive failure.
    pub multiplier: f64,
    /// Random spread as a fraction of the delay.
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&BackoffConfig::default())
    }
}

impl From<&BackoffConfig> for BackoffPolicy {
    fn from(config: &BackoffConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
            jitter: config.jitter,
        }
    }
}

impl BackoffPolicy {
    /// Returns the capped delay without jitter. Zero failures means no delay.
    pub fn base_delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(failures - 1).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Returns the delay with jitter, where `unit` in `[-1, 1]` picks the
    /// point in the jitter range.
    pub fn delay_with(&self, failures: u32, unit: f64) -> Duration {
        let base = self.base_delay(failures);
        let factor = 1.0 + self.jitter * unit.clamp(-1.0, 1.0);
        base.mul_f64(factor.max(0.0))
    }

    /// Returns a randomly jittered delay.
    pub fn next_delay(&self, failures: u32) -> Duration {
        let unit = if self.jitter > 0.0 {
            rand::thread_rng().gen_range(-1.0..=1.0)
        } else {
            0.0
        };
        self.delay_with(failures, unit)
    }

    /// Returns the delay after `error`, honoring a platform-suggested wait
    /// when it is longer than the computed one.
    pub fn delay_for(&self, error: &TransportError, failures: u32) -> Duration {
        let computed = self.next_delay(failures);
        match error.retry_after() {
            Some(suggested) => computed.max(suggested),
            None => computed,
        }
    }
}
