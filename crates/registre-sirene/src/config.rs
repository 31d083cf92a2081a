//! SIRENE sampling configuration

use std::path::PathBuf;
use std::time::Duration;

use registre_core::{QuotaPolicy, RetryPolicy};

pub const DEFAULT_SEARCH_URL: &str = "https://api.insee.fr/api-sirene/3.11/siren";
pub const API_KEY_HEADER: &str = "X-INSEE-Api-Key-Integration";
/// Identifiers file read by the document pullers
pub const DEFAULT_OUTPUT: &str = "sirens_existing_diffusible.txt";

#[derive(Debug, Clone)]
pub struct Config {
    pub search_url: String,
    pub api_key: String,
    pub sample_size: usize,
    pub range_start: u32,
    /// Inclusive
    pub range_end: u32,
    /// SIRENs OR'ed into one query; ~80 keeps the URL under a few KB
    pub batch_size: usize,
    pub pause_between_batches: Duration,
    pub request_timeout: Duration,
    pub output: PathBuf,
    /// Fixed seed for a reproducible sample
    pub seed: Option<u64>,
    pub retry: RetryPolicy,
}

/// The search API enforces a per-minute window, so a 429 is waited out here.
pub fn search_retry_policy() -> RetryPolicy {
    let backoff = vec![
        Duration::from_millis(1200),
        Duration::from_millis(2400),
        Duration::from_millis(4800),
    ];
    RetryPolicy {
        max_attempts: 4,
        metadata_backoff: backoff.clone(),
        download_backoff: backoff,
        on_quota: QuotaPolicy::Backoff,
        ..RetryPolicy::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            api_key: String::new(),
            sample_size: 1_000,
            range_start: 821_000_000,
            range_end: 990_000_000,
            batch_size: 80,
            pause_between_batches: Duration::from_millis(50),
            request_timeout: Duration::from_secs(18),
            output: PathBuf::from(DEFAULT_OUTPUT),
            seed: None,
            retry: search_retry_policy(),
        }
    }
}
