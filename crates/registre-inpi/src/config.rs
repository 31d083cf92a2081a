//! National registry (INPI) runtime configuration

use std::path::PathBuf;
use std::time::Duration;

use registre_core::{AllowList, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://registre-national-entreprises.inpi.fr";

/// Acte types fetched by default (matched accent-insensitively, by substring)
pub const DEFAULT_ALLOWED_TYPES: &[&str] = &[
    "statuts constitutifs",
    "attestation de depot des fonds",
    "attestation bancaire",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Persisted bearer token
    pub token_file: PathBuf,
    pub allowed_types: Vec<String>,
    /// Listing calls per minute (provider limit is 250 per token)
    pub metadata_rpm: u32,
    /// Downloads per minute (provider limit is 50 per token)
    pub download_rpm: u32,
    pub pause_between_sirens: Duration,
    pub pause_after_download: Duration,
    pub metadata_timeout: Duration,
    pub download_timeout: Duration,
    pub output_dir: PathBuf,
    /// Check the credential against the first SIREN before the batch
    pub probe: bool,
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            username: String::new(),
            password: String::new(),
            token_file: PathBuf::from("inpi_token.txt"),
            allowed_types: DEFAULT_ALLOWED_TYPES.iter().map(|s| s.to_string()).collect(),
            metadata_rpm: 200,
            download_rpm: 40,
            pause_between_sirens: Duration::from_secs(1),
            pause_after_download: Duration::from_secs(1),
            metadata_timeout: Duration::from_secs(20),
            download_timeout: Duration::from_secs(30),
            output_dir: PathBuf::from("."),
            probe: true,
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    pub fn login_url(&self) -> String {
        format!("{}/api/sso/login", self.base_url.trim_end_matches('/'))
    }

    pub fn allow_list(&self) -> AllowList {
        AllowList::new(&self.allowed_types)
    }
}
