//! Qard aggregator runtime configuration

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use registre_core::{AllowList, MatchMode, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://api-demo.qardfinance.com";
pub const API_KEY_HEADER: &str = "X-API-KEY";

/// File datatypes fetched by default (exact, upper-case match)
pub const DEFAULT_ALLOWED_DATATYPES: &[&str] =
    &["ACT", "ARTICLES_OF_ASSOCIATION", "LEGAL_NOTICE", "AVIS_SIREN"];

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub api_key: String,
    pub allowed_datatypes: BTreeSet<String>,
    /// Politeness pause between calls
    pub call_pause: Duration,
    pub per_page: u32,
    pub output_dir: PathBuf,
    /// Keep every allowed file per user instead of the first one
    pub all_files: bool,
    pub max_files_per_user: usize,
    /// Re-download files already present (CSV-driven download)
    pub overwrite: bool,
    pub metadata_timeout: Duration,
    pub download_timeout: Duration,
    /// Upper bound on waiting for a data sync
    pub sync_timeout: Duration,
    pub sync_poll_interval: Duration,
    /// Create a legal user when none exists for a SIREN
    pub create_missing_users: bool,
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            allowed_datatypes: DEFAULT_ALLOWED_DATATYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            call_pause: Duration::from_millis(200),
            per_page: 100,
            output_dir: PathBuf::from("."),
            all_files: false,
            max_files_per_user: 10,
            overwrite: false,
            metadata_timeout: Duration::from_secs(20),
            download_timeout: Duration::from_secs(60),
            sync_timeout: Duration::from_secs(180),
            sync_poll_interval: Duration::from_secs(3),
            create_missing_users: true,
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Whether a file datatype is wanted; an empty set accepts everything
    /// Exact, case-insensitive datatype filter; `None` keeps every datatype
    pub fn datatype_filter(&self) -> Option<AllowList> {
        if self.allowed_datatypes.is_empty() {
            return None;
        }
        Some(AllowList::new(&self.allowed_datatypes).with_mode(MatchMode::Exact))
    }

    pub fn is_allowed_datatype(&self, datatype: &str) -> bool {
        match self.datatype_filter() {
            Some(filter) => filter.matches_label(datatype),
            None => true,
        }
    }

    /// Number of status polls that fit in the sync deadline
    pub fn max_sync_polls(&self) -> u32 {
        let interval = self.sync_poll_interval.as_millis().max(1);
        (self.sync_timeout.as_millis() / interval).max(1) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datatype_match_is_exact_and_case_insensitive() {
        let config = Config::default();
        assert!(config.is_allowed_datatype("act"));
        assert!(config.is_allowed_datatype("LEGAL_NOTICE"));
        assert!(!config.is_allowed_datatype("ACTS"));
        assert!(!config.is_allowed_datatype("BALANCE_SHEET"));
    }

    #[test]
    fn empty_set_accepts_all() {
        let config = Config {
            allowed_datatypes: BTreeSet::new(),
            ..Default::default()
        };
        assert!(config.is_allowed_datatype("ANYTHING"));
    }

    #[test]
    fn sync_polls_fit_deadline() {
        assert_eq!(Config::default().max_sync_polls(), 60);
    }
}
