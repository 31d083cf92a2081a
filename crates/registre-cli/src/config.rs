//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use registre_core::{HttpConfig, RetryPolicy};
use serde::Deserialize;

/// Global configuration for registre
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub http: HttpSection,
    pub retry: RetrySection,
    pub inpi: InpiSection,
    pub qard: QardSection,
    pub sirene: SireneSection,
    pub output: OutputSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub connect_timeout_secs: u64,
    /// Per-request timeouts; unset keeps each provider's own default
    pub metadata_timeout_secs: Option<u64>,
    pub download_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            connect_timeout_secs: HttpConfig::default().connect_timeout.as_secs(),
            metadata_timeout_secs: None,
            download_timeout_secs: None,
            user_agent: None,
        }
    }
}

impl HttpSection {
    pub fn transport_config(&self) -> HttpConfig {
        let mut config = HttpConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            ..Default::default()
        };
        if let Some(ua) = &self.user_agent {
            config.user_agent = ua.clone();
        }
        config
    }

    /// `(metadata, download)` request timeouts over the given defaults
    pub fn timeouts(&self, metadata: Duration, download: Duration) -> (Duration, Duration) {
        (
            self.metadata_timeout_secs.map_or(metadata, Duration::from_secs),
            self.download_timeout_secs.map_or(download, Duration::from_secs),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub metadata_backoff_secs: Vec<u64>,
    pub download_backoff_secs: Vec<u64>,
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            metadata_backoff_secs: vec![3, 8, 20],
            download_backoff_secs: vec![8, 20, 45],
            jitter_min_ms: 500,
            jitter_max_ms: 1500,
        }
    }
}

impl RetrySection {
    /// Document-API policy; 429 stops the run
    pub fn policy(&self) -> RetryPolicy {
        let secs = |v: &[u64]| v.iter().copied().map(Duration::from_secs).collect();
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            metadata_backoff: secs(&self.metadata_backoff_secs),
            download_backoff: secs(&self.download_backoff_secs),
            jitter_min: Duration::from_millis(self.jitter_min_ms),
            jitter_max: Duration::from_millis(self.jitter_max_ms.max(self.jitter_min_ms)),
            ..RetryPolicy::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InpiSection {
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub username: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub password: Option<String>,
    pub token_file: PathBuf,
    pub allowed_types: Vec<String>,
    pub metadata_rpm: u32,
    pub download_rpm: u32,
    pub pause_between_sirens_ms: u64,
    pub pause_after_download_ms: u64,
}

impl Default for InpiSection {
    fn default() -> Self {
        let defaults = registre_inpi::Config::default();
        Self {
            base_url: std::env::var("INPI_BASE").unwrap_or(defaults.base_url),
            username: std::env::var("INPI_USERNAME").ok(),
            password: std::env::var("INPI_PASSWORD").ok(),
            token_file: defaults.token_file,
            allowed_types: defaults.allowed_types,
            metadata_rpm: defaults.metadata_rpm,
            download_rpm: defaults.download_rpm,
            pause_between_sirens_ms: defaults.pause_between_sirens.as_millis() as u64,
            pause_after_download_ms: defaults.pause_after_download.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QardSection {
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub api_key: Option<String>,
    pub allowed_datatypes: Vec<String>,
    pub call_pause_ms: u64,
    pub per_page: u32,
    pub max_files_per_user: usize,
    pub create_missing_users: bool,
    pub acts_csv: PathBuf,
    pub users_report: PathBuf,
}

impl Default for QardSection {
    fn default() -> Self {
        let defaults = registre_qard::Config::default();
        Self {
            base_url: std::env::var("QARD_BASE").unwrap_or(defaults.base_url),
            api_key: std::env::var("QARD_API_KEY").ok(),
            allowed_datatypes: defaults.allowed_datatypes.into_iter().collect(),
            call_pause_ms: defaults.call_pause.as_millis() as u64,
            per_page: defaults.per_page,
            max_files_per_user: defaults.max_files_per_user,
            create_missing_users: defaults.create_missing_users,
            acts_csv: PathBuf::from("acts_results.csv"),
            users_report: PathBuf::from("users_status_report.csv"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SireneSection {
    pub search_url: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub api_key: Option<String>,
    pub sample_size: usize,
    pub range_start: u32,
    pub range_end: u32,
    pub batch_size: usize,
    pub pause_between_batches_ms: u64,
}

impl Default for SireneSection {
    fn default() -> Self {
        let defaults = registre_sirene::Config::default();
        Self {
            search_url: defaults.search_url,
            api_key: std::env::var("INSEE_API_KEY").ok(),
            sample_size: defaults.sample_size,
            range_start: defaults.range_start,
            range_end: defaults.range_end,
            batch_size: defaults.batch_size,
            pause_between_batches_ms: defaults.pause_between_batches.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub dir: PathBuf,
    /// Identifiers file shared by the pullers and `sirene sample`
    pub sirens_file: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data"),
            sirens_file: PathBuf::from(registre_sirene::config::DEFAULT_OUTPUT),
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./registre.toml (current directory)
    /// 2. ~/.config/registre/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("registre.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "registre") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.inpi.metadata_rpm, 200);
        assert_eq!(config.inpi.download_rpm, 40);
        assert_eq!(config.qard.call_pause_ms, 200);
        assert_eq!(config.sirene.batch_size, 80);
        assert_eq!(config.output.dir, PathBuf::from("./data"));
    }

    #[test]
    fn retry_policy_from_section() {
        let policy = RetrySection::default().policy();
        assert_eq!(policy.metadata_backoff[0], Duration::from_secs(3));
        assert_eq!(policy.download_backoff[2], Duration::from_secs(45));
        assert_eq!(policy.jitter_max, Duration::from_millis(1500));
    }

    #[test]
    fn request_timeouts_override_defaults() {
        let http = HttpSection {
            download_timeout_secs: Some(90),
            ..Default::default()
        };
        let (metadata, download) =
            http.timeouts(Duration::from_secs(20), Duration::from_secs(30));
        assert_eq!(metadata, Duration::from_secs(20));
        assert_eq!(download, Duration::from_secs(90));
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[retry]
max_attempts = 2
metadata_backoff_secs = [1]

[inpi]
username = "alice"
password = "${NONEXISTENT_VAR_12345}"
allowed_types = ["statuts constitutifs"]
download_rpm = 10

[qard]
call_pause_ms = 0

[output]
dir = "/tmp/actes"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.download_backoff_secs, vec![8, 20, 45]);
        assert_eq!(config.inpi.username.as_deref(), Some("alice"));
        assert_eq!(config.inpi.password, None);
        assert_eq!(config.inpi.allowed_types, vec!["statuts constitutifs"]);
        assert_eq!(config.inpi.download_rpm, 10);
        assert_eq!(config.inpi.metadata_rpm, 200);
        assert_eq!(config.qard.call_pause_ms, 0);
        assert_eq!(config.output.dir, PathBuf::from("/tmp/actes"));
    }
}
