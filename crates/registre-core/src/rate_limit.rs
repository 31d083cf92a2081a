//! Per traffic class call spacing.
//!
//! Each limiter enforces a minimum interval between permitted calls, derived
//! from a requests-per-minute ceiling, plus a small uniform jitter. There is
//! no burst capacity: the upstream services police the average rate.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use rand::Rng;

/// Default jitter ceiling added to every wait
const DEFAULT_JITTER: Duration = Duration::from_millis(80);

#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    max_jitter: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Limiter allowing at most `rpm` calls per minute. `rpm == 0` disables it.
    pub fn per_minute(rpm: u32) -> Self {
        if rpm == 0 {
            return Self::unlimited();
        }
        Self::with_interval(Duration::from_secs_f64(60.0 / f64::from(rpm)), DEFAULT_JITTER)
    }

    pub fn with_interval(min_interval: Duration, max_jitter: Duration) -> Self {
        Self {
            min_interval,
            max_jitter,
            last_call: Mutex::new(None),
        }
    }

    /// No spacing, no jitter
    pub fn unlimited() -> Self {
        Self::with_interval(Duration::ZERO, Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until `last_call + min_interval + jitter` has passed, then record the call.
    ///
    /// The guard is held across the sleep so concurrent callers serialize.
    pub fn wait(&self) {
        let mut last = self.last_call.lock().unwrap_or_else(PoisonError::into_inner);
        if self.min_interval.is_zero() {
            *last = Some(Instant::now());
            return;
        }

        if let Some(prev) = *last {
            let target = prev + self.min_interval + self.jitter();
            let now = Instant::now();
            if target > now {
                std::thread::sleep(target - now);
            }
        }
        *last = Some(Instant::now());
    }

    fn jitter(&self) -> Duration {
        let max = self.max_jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}
