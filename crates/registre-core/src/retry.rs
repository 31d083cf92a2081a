//! Outcome classification and backoff schedule for authenticated calls

use std::time::Duration;

use rand::Rng;

use crate::client::TrafficClass;
use crate::http::{ApiResponse, TransportError};

/// Attempt ceiling observed against the registry APIs
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Backoff before retrying a metadata call (3s, 8s, 20s)
pub const METADATA_BACKOFF: [Duration; 3] = [
    Duration::from_secs(3),
    Duration::from_secs(8),
    Duration::from_secs(20),
];

/// Backoff before retrying a binary download (8s, 20s, 45s)
pub const DOWNLOAD_BACKOFF: [Duration; 3] = [
    Duration::from_secs(8),
    Duration::from_secs(20),
    Duration::from_secs(45),
];

/// What the client should do with the result of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Success,
    /// 401: discard the credential, log in again, retry once
    Reauthenticate,
    /// 403: skip this item
    Forbidden,
    /// 429
    QuotaExceeded,
    /// 5xx, 408, connection failure, timeout
    Retry,
    /// Any other status; not retried
    Reject,
}

/// Classify the result of a single attempt.
pub fn classify(result: &Result<ApiResponse, TransportError>) -> Disposition {
    match result {
        Ok(resp) => classify_status(resp.status),
        Err(e) if e.is_retryable() => Disposition::Retry,
        Err(_) => Disposition::Reject,
    }
}

pub fn classify_status(status: u16) -> Disposition {
    match status {
        200..=299 => Disposition::Success,
        401 => Disposition::Reauthenticate,
        403 => Disposition::Forbidden,
        429 => Disposition::QuotaExceeded,
        408 | 500..=599 => Disposition::Retry,
        _ => Disposition::Reject,
    }
}

/// How a 429 is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaPolicy {
    /// The quota window is long (daily): stop the whole run
    Stop,
    /// The window is short: back off and retry like a server error
    Backoff,
}

/// Retry ceiling, backoff schedule per traffic class and jitter window.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub metadata_backoff: Vec<Duration>,
    pub download_backoff: Vec<Duration>,
    pub jitter_min: Duration,
    pub jitter_max: Duration,
    pub on_quota: QuotaPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            metadata_backoff: METADATA_BACKOFF.to_vec(),
            download_backoff: DOWNLOAD_BACKOFF.to_vec(),
            jitter_min: Duration::from_millis(500),
            jitter_max: Duration::from_millis(1500),
            on_quota: QuotaPolicy::Stop,
        }
    }
}

impl RetryPolicy {
    /// Policy with no backoff and no jitter (for tests and dry runs)
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            metadata_backoff: vec![Duration::ZERO],
            download_backoff: vec![Duration::ZERO],
            jitter_min: Duration::ZERO,
            jitter_max: Duration::ZERO,
            on_quota: QuotaPolicy::Stop,
        }
    }

    /// Base delay before the retry that follows failed attempt `attempt` (1-indexed).
    ///
    /// The last entry of the schedule repeats when attempts outrun it.
    pub fn base_delay(&self, class: TrafficClass, attempt: u32) -> Duration {
        let schedule = match class {
            TrafficClass::Metadata => &self.metadata_backoff,
            TrafficClass::Download => &self.download_backoff,
        };
        let idx = (attempt.saturating_sub(1) as usize).min(schedule.len().saturating_sub(1));
        schedule.get(idx).copied().unwrap_or(Duration::ZERO)
    }

    /// Base delay plus uniform jitter
    pub fn delay(&self, class: TrafficClass, attempt: u32) -> Duration {
        self.base_delay(class, attempt) + self.jitter()
    }

    fn jitter(&self) -> Duration {
        let lo = self.jitter_min.as_millis() as u64;
        let hi = (self.jitter_max.as_millis() as u64).max(lo);
        if hi == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }
}

/// Blocking pause used for backoff and politeness delays.
pub trait Sleep: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Real sleep on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes() {
        assert_eq!(classify_status(200), Disposition::Success);
        assert_eq!(classify_status(204), Disposition::Success);
        assert_eq!(classify_status(401), Disposition::Reauthenticate);
        assert_eq!(classify_status(403), Disposition::Forbidden);
        assert_eq!(classify_status(429), Disposition::QuotaExceeded);
        assert_eq!(classify_status(500), Disposition::Retry);
        assert_eq!(classify_status(503), Disposition::Retry);
        assert_eq!(classify_status(408), Disposition::Retry);
        assert_eq!(classify_status(404), Disposition::Reject);
        assert_eq!(classify_status(409), Disposition::Reject);
    }

    #[test]
    fn connection_failure_is_retried() {
        let result = Err(TransportError::Connect("refused".into()));
        assert_eq!(classify(&result), Disposition::Retry);
    }

    #[test]
    fn disk_full_is_rejected() {
        let result = Err(TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::StorageFull,
            "full",
        )));
        assert_eq!(classify(&result), Disposition::Reject);
    }

    #[test]
    fn metadata_schedule() {
        let policy = RetryPolicy::default();
        let class = TrafficClass::Metadata;
        assert_eq!(policy.base_delay(class, 1), Duration::from_secs(3));
        assert_eq!(policy.base_delay(class, 2), Duration::from_secs(8));
        assert_eq!(policy.base_delay(class, 3), Duration::from_secs(20));
        // schedule tail repeats
        assert_eq!(policy.base_delay(class, 7), Duration::from_secs(20));
    }

    #[test]
    fn download_schedule() {
        let policy = RetryPolicy::default();
        let class = TrafficClass::Download;
        assert_eq!(policy.base_delay(class, 1), Duration::from_secs(8));
        assert_eq!(policy.base_delay(class, 2), Duration::from_secs(20));
        assert_eq!(policy.base_delay(class, 3), Duration::from_secs(45));
    }

    #[test]
    fn jitter_within_window() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let d = policy.delay(TrafficClass::Metadata, 1);
            assert!(d >= Duration::from_millis(3500));
            assert!(d <= Duration::from_millis(4500));
        }
    }

    #[test]
    fn immediate_policy_never_waits() {
        let policy = RetryPolicy::immediate(4);
        assert_eq!(policy.delay(TrafficClass::Download, 3), Duration::ZERO);
    }
}
