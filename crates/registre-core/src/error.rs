//! Error types shared by the registry clients

use std::time::Duration;

/// Outcome of one authenticated call once the retry state machine gave up.
///
/// Each variant maps to one row of the failure table: per-call, per-item or
/// whole-run. Use [`CallError::is_run_terminating`] to tell them apart.
#[derive(Debug)]
pub enum CallError {
    /// 429: the provider quota is spent for this run
    QuotaExceeded { retry_after: Option<Duration> },
    /// 403: this item is not accessible, skip it
    Forbidden,
    /// 401 persisted after the single re-authentication
    Unauthorized,
    /// No credential could be obtained
    LoginFailed,
    /// Transient failures exhausted the attempt ceiling
    Exhausted { attempts: u32, last: String },
    /// Non-retryable HTTP status (404, 409, other 4xx)
    Rejected { status: u16, message: String },
    /// Response body did not have the expected shape
    Decode(String),
    /// Local I/O (token store, output file)
    Io(std::io::Error),
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuotaExceeded {
                retry_after: Some(d),
            } => write!(f, "quota exceeded (429), retry after {}s", d.as_secs()),
            Self::QuotaExceeded { retry_after: None } => write!(f, "quota exceeded (429)"),
            Self::Forbidden => write!(f, "forbidden (403)"),
            Self::Unauthorized => write!(f, "unauthorized (401) after re-authentication"),
            Self::LoginFailed => write!(f, "login failed, no credential available"),
            Self::Exhausted { attempts, last } => {
                write!(f, "failed after {attempts} attempts: {last}")
            }
            Self::Rejected { status, message } => write!(f, "HTTP {status}: {message}"),
            Self::Decode(m) => write!(f, "unexpected response: {m}"),
            Self::Io(e) => write!(f, "IO: {e}"),
        }
    }
}

impl std::error::Error for CallError {}

impl From<std::io::Error> for CallError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl CallError {
    /// Whether the whole run must halt (no further calls may be issued).
    pub fn is_run_terminating(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. } | Self::LoginFailed | Self::Io(_))
    }

    /// HTTP status of a rejected call, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Forbidden => Some(403),
            Self::Unauthorized => Some(401),
            Self::QuotaExceeded { .. } => Some(429),
            _ => None,
        }
    }

    /// Convert into a [`QuotaStop`] when this is a quota rejection
    pub fn as_quota_stop(&self) -> Option<QuotaStop> {
        match self {
            Self::QuotaExceeded { retry_after } => Some(QuotaStop {
                retry_after: *retry_after,
            }),
            _ => None,
        }
    }
}

/// Run-terminating signal raised by a quota rejection.
///
/// Propagates to the binary, which exits with a dedicated status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStop {
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for QuotaStop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.retry_after {
            Some(d) => write!(f, "run stopped: quota exceeded (retry after {}s)", d.as_secs()),
            None => write!(f, "run stopped: quota exceeded"),
        }
    }
}

impl std::error::Error for QuotaStop {}

/// Unrecoverable configuration problem detected before any network activity
#[derive(Debug)]
pub enum ConfigError {
    MissingInput(std::path::PathBuf),
    MissingCredential(&'static str),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingInput(p) => write!(f, "input file not found: {}", p.display()),
            Self::MissingCredential(what) => write!(f, "missing credential: {what}"),
            Self::Invalid(m) => write!(f, "invalid configuration: {m}"),
        }
    }
}

impl std::error::Error for ConfigError {}
