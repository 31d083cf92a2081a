//! HTTP transport behind a synchronous interface.
//!
//! Uses async reqwest internally on a shared tokio runtime, but presents a
//! blocking [`Transport`] so the registry clients stay single-threaded and
//! sequential. Tests substitute a scripted transport at the same seam.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::header::{CONTENT_DISPOSITION, HeaderMap, RETRY_AFTER};
use reqwest::Method;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Error types for transport operations
#[derive(Debug)]
pub enum TransportError {
    /// Could not establish a connection
    Connect(String),
    /// Request or body read exceeded its deadline
    Timeout(String),
    /// Any other failure from the HTTP stack
    Http(String),
    /// Local I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect(m) => write!(f, "connection error: {m}"),
            Self::Timeout(m) => write!(f, "timeout: {m}"),
            Self::Http(m) => write!(f, "HTTP error: {m}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl TransportError {
    /// Create transport error from reqwest error.
    ///
    /// The URL is stripped so query strings never leak into logs.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        let (timeout, connect) = (e.is_timeout(), e.is_connect());
        let message = e.without_url().to_string();
        if timeout {
            Self::Timeout(message)
        } else if connect {
            Self::Connect(message)
        } else {
            Self::Http(message)
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Timeout(_) | Self::Http(_) => true,
            Self::Io(e) => e.kind() != std::io::ErrorKind::StorageFull,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Fully resolved outbound request
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub json: Option<serde_json::Value>,
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            json: None,
            timeout: None,
        }
    }

    /// Look up a header value (case-insensitive name)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Look up a query parameter value
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Response with the body fully buffered
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Lossy text rendition of the first `max` bytes, for diagnostics
    pub fn snippet(&self, max: usize) -> String {
        let end = self.body.len().min(max);
        String::from_utf8_lossy(&self.body[..end]).into_owned()
    }

    /// Filename hint from `Content-Disposition`, if any
    pub fn filename(&self) -> Option<String> {
        let value = self.headers.get(CONTENT_DISPOSITION)?.to_str().ok()?;
        content_disposition_filename(value)
    }

    /// `Retry-After` hint relative to now
    pub fn retry_after(&self) -> Option<Duration> {
        let value = self.headers.get(RETRY_AFTER)?.to_str().ok()?;
        parse_retry_after(value, Utc::now())
    }
}

/// Blocking request/response seam used by [`crate::AuthClient`].
pub trait Transport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        (**self).send(request)
    }
}

/// Transport configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            user_agent: concat!("registre/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .pool_max_idle_per_host(4)
            .build()
            .map_err(TransportError::from_reqwest)?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(json) = &request.json {
            let body = serde_json::to_vec(json)
                .map_err(|e| TransportError::Http(format!("cannot encode body: {e}")))?;
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        SHARED_RUNTIME.handle().block_on(async {
            let response = builder.send().await.map_err(TransportError::from_reqwest)?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(TransportError::from_reqwest)?;
            Ok(ApiResponse {
                status,
                headers,
                body: body.to_vec(),
            })
        })
    }
}

static FILENAME_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)filename\*=UTF-8''([^;]+)").expect("valid regex"));
static FILENAME_PLAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)filename="?([^";]+)"?"#).expect("valid regex"));

/// Extract the filename from a `Content-Disposition` value.
///
/// The RFC 5987 `filename*=UTF-8''` form wins over the plain `filename=` form.
pub fn content_disposition_filename(value: &str) -> Option<String> {
    let raw = FILENAME_STAR
        .captures(value)
        .or_else(|| FILENAME_PLAIN.captures(value))?
        .get(1)?
        .as_str()
        .trim();
    if raw.is_empty() {
        return None;
    }
    Some(percent_decode(raw))
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP-date.
///
/// Dates in the past yield zero.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let when = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = when.with_timezone(&Utc) - now;
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}
