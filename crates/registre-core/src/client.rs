//! Authenticated, rate-limited, retrying client.
//!
//! One [`AuthClient::call`] runs an explicit state machine over the attempts
//! of a single request:
//!
//! - 2xx: done
//! - 401: discard the credential, log in once, resend (at most once per call)
//! - 403: item-scoped failure
//! - 429: run-terminating [`CallError::QuotaExceeded`] (or backoff, per policy)
//! - 5xx / 408 / transport error: backoff and resend up to the attempt ceiling
//! - anything else: rejected without retry
//!
//! Every attempt waits on the rate limiter of its traffic class first.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::Method;
use serde_json::Value;

use crate::error::CallError;
use crate::http::{ApiRequest, ApiResponse, Transport, TransportError};
use crate::rate_limit::RateLimiter;
use crate::retry::{Disposition, QuotaPolicy, RetryPolicy, Sleep, ThreadSleep, classify};
use crate::token_store::TokenStore;

const POLITENESS_JITTER_MS: u64 = 200;

/// Logical traffic class, each with its own limiter and backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficClass {
    Metadata,
    Download,
}

impl std::fmt::Display for TrafficClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Metadata => write!(f, "metadata"),
            Self::Download => write!(f, "download"),
        }
    }
}

/// Username/password login endpoint returning `{"token": "..."}`
#[derive(Debug, Clone)]
pub struct LoginConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

/// How calls prove their identity
#[derive(Debug, Clone)]
pub enum AuthScheme {
    /// Bearer token obtained by login and persisted in a [`TokenStore`]
    Bearer {
        login: LoginConfig,
        store: TokenStore,
    },
    /// Static key sent in a header on every call
    ApiKey { header: String, key: String },
    /// Unauthenticated
    Anonymous,
}

impl AuthScheme {
    fn can_login(&self) -> bool {
        matches!(self, Self::Bearer { .. })
    }
}

/// One logical request, resolved against the client base URL
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    /// Path relative to the base URL, or an absolute URL
    pub path: String,
    pub query: Vec<(String, String)>,
    pub json: Option<Value>,
    pub class: TrafficClass,
}

impl Call {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            json: None,
            class: TrafficClass::Metadata,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            json: Some(body),
            ..Self::get(path)
        }
    }

    /// Binary download (download limiter and backoff schedule)
    pub fn download(path: impl Into<String>) -> Self {
        Self {
            class: TrafficClass::Download,
            ..Self::get(path)
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Set a query parameter, replacing any previous value
    pub fn set_query(&mut self, key: &str, value: impl ToString) {
        self.query.retain(|(k, _)| k != key);
        self.query.push((key.to_string(), value.to_string()));
    }
}

/// Client bound to one provider.
///
/// Holds the only mutable credential of the run. Re-authentication replaces
/// it in place, so every request built afterwards carries the new value.
pub struct AuthClient<T: Transport> {
    transport: T,
    base_url: String,
    scheme: AuthScheme,
    token: Option<String>,
    policy: RetryPolicy,
    metadata_limiter: RateLimiter,
    download_limiter: RateLimiter,
    metadata_timeout: Option<Duration>,
    download_timeout: Option<Duration>,
    sleeper: Arc<dyn Sleep>,
}

impl<T: Transport> std::fmt::Debug for AuthClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("base_url", &self.base_url)
            .field("has_token", &self.token.is_some())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> AuthClient<T> {
    pub fn new(transport: T, base_url: impl Into<String>, scheme: AuthScheme) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            scheme,
            token: None,
            policy: RetryPolicy::default(),
            metadata_limiter: RateLimiter::unlimited(),
            download_limiter: RateLimiter::unlimited(),
            metadata_timeout: None,
            download_timeout: None,
            sleeper: Arc::new(ThreadSleep),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_limiters(mut self, metadata: RateLimiter, download: RateLimiter) -> Self {
        self.metadata_limiter = metadata;
        self.download_limiter = download;
        self
    }

    pub fn with_timeouts(mut self, metadata: Duration, download: Duration) -> Self {
        self.metadata_timeout = Some(metadata);
        self.download_timeout = Some(download);
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleep>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sleeper(&self) -> &Arc<dyn Sleep> {
        &self.sleeper
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_credential(&self) -> bool {
        match self.scheme {
            AuthScheme::Bearer { .. } => self.token.is_some(),
            _ => true,
        }
    }

    /// Make sure a credential is available: reuse the persisted token, else log in.
    pub fn ensure_credential(&mut self) -> Result<(), CallError> {
        if self.has_credential() {
            return Ok(());
        }
        if let AuthScheme::Bearer { store, .. } = &self.scheme {
            if let Some(token) = store.load() {
                log::debug!("Reusing persisted token from {}", store.path().display());
                self.token = Some(token);
                return Ok(());
            }
        }
        match self.login()? {
            Some(_) => Ok(()),
            None => Err(CallError::LoginFailed),
        }
    }

    /// Post credentials and persist the returned token.
    ///
    /// Any transport failure, non-2xx status or missing `token` field yields
    /// `Ok(None)`. Only a failure to persist the token is an error.
    pub fn login(&mut self) -> Result<Option<String>, CallError> {
        let AuthScheme::Bearer { login, store } = &self.scheme else {
            return Ok(None);
        };
        let mut request = ApiRequest::new(Method::POST, login.url.clone());
        request.headers.push(("Accept".into(), "application/json".into()));
        request.json = Some(serde_json::json!({
            "username": login.username,
            "password": login.password,
        }));
        request.timeout = self.metadata_timeout;

        log::info!("Logging in to {}", login.url);
        let response = match self.transport.send(&request) {
            Ok(r) => r,
            Err(e) => {
                log::error!("Login failed: {e}");
                return Ok(None);
            }
        };
        if !response.is_success() {
            log::error!(
                "Login failed: HTTP {} {}",
                response.status,
                response.snippet(200)
            );
            return Ok(None);
        }
        let token = response
            .json()
            .ok()
            .and_then(|v| v.get("token").and_then(Value::as_str).map(str::to_string))
            .filter(|t| !t.is_empty());
        let Some(token) = token else {
            log::error!("Login response carried no token field");
            return Ok(None);
        };

        store.save(&token)?;
        log::info!("Login OK, token saved to {}", store.path().display());
        self.token = Some(token.clone());
        Ok(Some(token))
    }

    /// Forget the current credential, in memory and on disk
    pub fn invalidate(&mut self) -> Result<(), CallError> {
        self.token = None;
        if let AuthScheme::Bearer { store, .. } = &self.scheme {
            store.clear()?;
        }
        Ok(())
    }

    fn limiter(&self, class: TrafficClass) -> &RateLimiter {
        match class {
            TrafficClass::Metadata => &self.metadata_limiter,
            TrafficClass::Download => &self.download_limiter,
        }
    }

    fn build_request(&self, call: &Call) -> ApiRequest {
        let url = if call.path.starts_with("http://") || call.path.starts_with("https://") {
            call.path.clone()
        } else {
            format!("{}/{}", self.base_url, call.path.trim_start_matches('/'))
        };
        let mut request = ApiRequest::new(call.method.clone(), url);
        request.query = call.query.clone();
        request.json = call.json.clone();
        match call.class {
            TrafficClass::Metadata => {
                request.headers.push(("Accept".into(), "application/json".into()));
                request.timeout = self.metadata_timeout;
            }
            TrafficClass::Download => {
                request.timeout = self.download_timeout;
            }
        }
        match &self.scheme {
            AuthScheme::Bearer { .. } => {
                if let Some(token) = &self.token {
                    request
                        .headers
                        .push(("Authorization".into(), format!("Bearer {token}")));
                }
            }
            AuthScheme::ApiKey { header, key } => {
                request.headers.push((header.clone(), key.clone()));
            }
            AuthScheme::Anonymous => {}
        }
        request
    }

    /// Perform one logical request through the retry state machine.
    pub fn call(&mut self, call: &Call) -> Result<ApiResponse, CallError> {
        self.ensure_credential()?;

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt: u32 = 0;
        let mut reauthenticated = false;

        loop {
            attempt += 1;
            self.limiter(call.class).wait();
            let request = self.build_request(call);
            log::debug!("{} {} (attempt {attempt})", request.method, request.url);

            let mut quota_hint = None;
            let result = self.transport.send(&request);
            let failure = match (classify(&result), result) {
                (Disposition::Reject, Err(TransportError::Io(e))) => return Err(CallError::Io(e)),
                (_, Err(e)) => e.to_string(),
                (Disposition::Success, Ok(response)) => return Ok(response),
                (Disposition::Reauthenticate, Ok(_)) => {
                    if reauthenticated || !self.scheme.can_login() {
                        log::error!("401 on {} persists, giving up", call.path);
                        return Err(CallError::Unauthorized);
                    }
                    log::warn!("401 on {}: token rejected, logging in again", call.path);
                    self.invalidate()?;
                    if self.login()?.is_none() {
                        return Err(CallError::LoginFailed);
                    }
                    reauthenticated = true;
                    // the resend does not consume an attempt
                    attempt -= 1;
                    continue;
                }
                (Disposition::Forbidden, Ok(_)) => {
                    log::warn!("403 on {}", call.path);
                    return Err(CallError::Forbidden);
                }
                (Disposition::QuotaExceeded, Ok(response)) => {
                    let retry_after = response.retry_after();
                    if self.policy.on_quota == QuotaPolicy::Stop {
                        log::error!(
                            "429 on {}: quota exceeded{}",
                            call.path,
                            retry_after
                                .map(|d| format!(", retry after {}s", d.as_secs()))
                                .unwrap_or_default()
                        );
                        return Err(CallError::QuotaExceeded { retry_after });
                    }
                    quota_hint = retry_after;
                    "HTTP 429".to_string()
                }
                (Disposition::Retry, Ok(response)) => {
                    format!("HTTP {} {}", response.status, response.snippet(200))
                }
                (Disposition::Reject, Ok(response)) => {
                    return Err(CallError::Rejected {
                        status: response.status,
                        message: response.snippet(300),
                    });
                }
            };

            if attempt >= max_attempts {
                log::error!(
                    "{} {} failed after {attempt} attempts: {failure}",
                    call.method,
                    call.path
                );
                return Err(CallError::Exhausted {
                    attempts: attempt,
                    last: failure,
                });
            }

            let mut delay = self.policy.delay(call.class, attempt);
            if let Some(hint) = quota_hint {
                delay = delay.max(hint);
            }
            log::warn!(
                "{} {} failed ({failure}), retry {}/{} in {:.1}s",
                call.method,
                call.path,
                attempt,
                max_attempts - 1,
                delay.as_secs_f64()
            );
            self.sleeper.sleep(delay);
        }
    }

    /// [`Self::call`] then decode the body as JSON
    pub fn get_json(&mut self, call: &Call) -> Result<Value, CallError> {
        let response = self.call(call)?;
        response
            .json()
            .map_err(|e| CallError::Decode(format!("{}: {e}", call.path)))
    }

    /// Politeness pause: `base` plus up to 200 ms of jitter
    pub fn pause(&self, base: Duration) {
        if base.is_zero() {
            return;
        }
        let extra = rand::thread_rng().gen_range(0..=POLITENESS_JITTER_MS);
        self.sleeper.sleep(base + Duration::from_millis(extra));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSleep, ScriptedTransport};
    use serde_json::json;

    fn bearer_client(
        dir: &std::path::Path,
        transport: ScriptedTransport,
    ) -> (AuthClient<ScriptedTransport>, Arc<RecordingSleep>) {
        let sleeper = RecordingSleep::new();
        let scheme = AuthScheme::Bearer {
            login: LoginConfig {
                url: "https://registry.test/api/sso/login".into(),
                username: "user".into(),
                password: "secret".into(),
            },
            store: TokenStore::new(dir.join("token.txt")),
        };
        let client = AuthClient::new(transport, "https://registry.test", scheme)
            .with_sleeper(sleeper.clone());
        (client, sleeper)
    }

    #[test]
    fn reuses_persisted_token() {
        let dir = tempfile::tempdir().unwrap();
        TokenStore::new(dir.path().join("token.txt")).save("stored").unwrap();
        let t = ScriptedTransport::new();
        t.respond_json(200, json!({"ok": true}));
        let (mut client, _) = bearer_client(dir.path(), t);

        client.call(&Call::get("/api/x")).unwrap();
        let reqs = client.transport().requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].header("authorization"), Some("Bearer stored"));
        assert_eq!(reqs[0].url, "https://registry.test/api/x");
    }

    #[test]
    fn logs_in_when_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let t = ScriptedTransport::new();
        t.respond_json(200, json!({"token": "fresh"}))
            .respond_json(200, json!([]));
        let (mut client, _) = bearer_client(dir.path(), t);

        client.call(&Call::get("/api/x")).unwrap();
        let reqs = client.transport().requests();
        assert_eq!(reqs[0].method, Method::POST);
        assert_eq!(reqs[0].json.as_ref().unwrap()["username"], "user");
        assert_eq!(reqs[1].header("authorization"), Some("Bearer fresh"));
        let saved = std::fs::read_to_string(dir.path().join("token.txt")).unwrap();
        assert_eq!(saved, "fresh");
    }

    #[test]
    fn login_without_token_field_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        let t = ScriptedTransport::new();
        t.respond_json(200, json!({"user": "x"}));
        let (mut client, _) = bearer_client(dir.path(), t);

        let err = client.call(&Call::get("/api/x")).unwrap_err();
        assert!(matches!(err, CallError::LoginFailed));
        assert!(err.is_run_terminating());
    }

    #[test]
    fn three_server_errors_then_success() {
        let dir = tempfile::tempdir().unwrap();
        TokenStore::new(dir.path().join("token.txt")).save("t").unwrap();
        let t = ScriptedTransport::new();
        t.respond(503, "").respond(500, "").respond(502, "").respond(200, "%PDF");
        let (client, sleeper) = bearer_client(dir.path(), t);
        let mut client = client.with_policy(RetryPolicy::default());

        let resp = client.call(&Call::download("/api/actes/1/download")).unwrap();
        assert_eq!(resp.body, b"%PDF");
        let slept = sleeper.recorded();
        assert_eq!(slept.len(), 3);
        // download schedule 8/20/45 plus jitter of at most 1.5s
        assert!(slept[0] >= Duration::from_secs(8) && slept[0] <= Duration::from_millis(9500));
        assert!(slept[2] >= Duration::from_secs(45));
        assert_eq!(client.transport().request_count(), 4);
    }

    #[test]
    fn exhausts_after_attempt_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        TokenStore::new(dir.path().join("token.txt")).save("t").unwrap();
        let t = ScriptedTransport::new();
        for _ in 0..6 {
            t.respond(500, "boom");
        }
        let (client, sleeper) = bearer_client(dir.path(), t);
        let mut client = client.with_policy(RetryPolicy::immediate(4));

        let err = client.call(&Call::get("/api/x")).unwrap_err();
        assert!(matches!(err, CallError::Exhausted { attempts: 4, .. }));
        assert!(!err.is_run_terminating());
        assert_eq!(client.transport().request_count(), 4);
        assert_eq!(sleeper.count(), 3);
    }

    #[test]
    fn connection_failures_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        TokenStore::new(dir.path().join("token.txt")).save("t").unwrap();
        let t = ScriptedTransport::new();
        t.fail_connect().respond(200, "{}");
        let (client, sleeper) = bearer_client(dir.path(), t);
        let mut client = client.with_policy(RetryPolicy::immediate(4));

        assert!(client.call(&Call::get("/api/x")).is_ok());
        assert_eq!(sleeper.count(), 1);
    }

    #[test]
    fn disk_full_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        TokenStore::new(dir.path().join("token.txt")).save("t").unwrap();
        let t = ScriptedTransport::new();
        t.push(Err(TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::StorageFull,
            "no space left",
        ))))
        .respond(200, "{}");
        let (client, sleeper) = bearer_client(dir.path(), t);
        let mut client = client.with_policy(RetryPolicy::immediate(4));

        let err = client.call(&Call::download("/api/actes/1/download")).unwrap_err();
        assert!(matches!(err, CallError::Io(_)));
        assert!(err.is_run_terminating());
        assert_eq!(client.transport().request_count(), 1);
        assert_eq!(sleeper.count(), 0);
    }

    #[test]
    fn single_reauth_on_401() {
        let dir = tempfile::tempdir().unwrap();
        TokenStore::new(dir.path().join("token.txt")).save("stale").unwrap();
        let t = ScriptedTransport::new();
        t.respond(401, "")
            .respond_json(200, json!({"token": "new"}))
            .respond_json(200, json!({"actes": []}));
        let (mut client, sleeper) = bearer_client(dir.path(), t);

        client.call(&Call::get("/api/x")).unwrap();
        let reqs = client.transport().requests();
        assert_eq!(reqs.len(), 3);
        assert_eq!(reqs[0].header("authorization"), Some("Bearer stale"));
        assert!(reqs[1].url.ends_with("/api/sso/login"));
        assert_eq!(reqs[2].header("authorization"), Some("Bearer new"));
        assert_eq!(reqs[2].url, reqs[0].url);
        assert_eq!(sleeper.count(), 0);
    }

    #[test]
    fn second_401_fails_the_call() {
        let dir = tempfile::tempdir().unwrap();
        TokenStore::new(dir.path().join("token.txt")).save("stale").unwrap();
        let t = ScriptedTransport::new();
        t.respond(401, "")
            .respond_json(200, json!({"token": "new"}))
            .respond(401, "")
            .respond(200, "{}");
        let (mut client, _) = bearer_client(dir.path(), t);

        let err = client.call(&Call::get("/api/x")).unwrap_err();
        assert!(matches!(err, CallError::Unauthorized));
        // one login, one retry, nothing more
        assert_eq!(client.transport().request_count(), 3);
        assert_eq!(client.transport().remaining(), 1);
    }

    #[test]
    fn resend_after_relogin_keeps_full_retry_budget() {
        let dir = tempfile::tempdir().unwrap();
        TokenStore::new(dir.path().join("token.txt")).save("stale").unwrap();
        let t = ScriptedTransport::new();
        t.respond(401, "")
            .respond_json(200, json!({"token": "new"}))
            .respond(503, "")
            .respond(503, "")
            .respond(200, "{}");
        let (mut client, sleeper) = bearer_client(dir.path(), t);
        client = client.with_policy(RetryPolicy::immediate(3));

        client.call(&Call::get("/api/x")).unwrap();
        assert_eq!(client.transport().remaining(), 0);
        assert_eq!(sleeper.count(), 2);
    }

    #[test]
    fn failed_relogin_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        TokenStore::new(dir.path().join("token.txt")).save("stale").unwrap();
        let t = ScriptedTransport::new();
        t.respond(401, "").respond(500, "down");
        let (mut client, _) = bearer_client(dir.path(), t);

        let err = client.call(&Call::get("/api/x")).unwrap_err();
        assert!(matches!(err, CallError::LoginFailed));
        assert!(!dir.path().join("token.txt").exists());
    }

    #[test]
    fn quota_stops_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        TokenStore::new(dir.path().join("token.txt")).save("t").unwrap();
        let t = ScriptedTransport::new();
        t.respond_with_headers(429, "", &[("retry-after", "3600")])
            .respond(200, "{}");
        let (mut client, sleeper) = bearer_client(dir.path(), t);

        let err = client.call(&Call::get("/api/x")).unwrap_err();
        assert_eq!(
            err.as_quota_stop().and_then(|q| q.retry_after),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(client.transport().request_count(), 1);
        assert_eq!(sleeper.count(), 0);
    }

    #[test]
    fn quota_backoff_policy_retries() {
        let t = ScriptedTransport::new();
        t.respond_with_headers(429, "", &[("retry-after", "2")])
            .respond(200, "{}");
        let sleeper = RecordingSleep::new();
        let mut policy = RetryPolicy::immediate(4);
        policy.on_quota = QuotaPolicy::Backoff;
        let mut client = AuthClient::new(t, "https://search.test", AuthScheme::Anonymous)
            .with_policy(policy)
            .with_sleeper(sleeper.clone());

        assert!(client.call(&Call::get("/siren")).is_ok());
        assert_eq!(sleeper.recorded(), vec![Duration::from_secs(2)]);
    }

    #[test]
    fn forbidden_is_not_retried() {
        let t = ScriptedTransport::new();
        t.respond(403, "").respond(200, "{}");
        let mut client = AuthClient::new(
            t,
            "https://agg.test",
            AuthScheme::ApiKey {
                header: "X-API-KEY".into(),
                key: "k".into(),
            },
        );

        assert!(matches!(
            client.call(&Call::get("/api/v6/users")),
            Err(CallError::Forbidden)
        ));
        let reqs = client.transport().requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].header("x-api-key"), Some("k"));
    }

    #[test]
    fn api_key_401_is_unauthorized() {
        let t = ScriptedTransport::new();
        t.respond(401, "");
        let mut client = AuthClient::new(
            t,
            "https://agg.test",
            AuthScheme::ApiKey {
                header: "X-API-KEY".into(),
                key: "bad".into(),
            },
        );
        assert!(matches!(
            client.call(&Call::get("/api/v6/clients")),
            Err(CallError::Unauthorized)
        ));
    }

    #[test]
    fn not_found_is_rejected_once() {
        let t = ScriptedTransport::new();
        t.respond(404, "no such user");
        let mut client = AuthClient::new(t, "https://agg.test", AuthScheme::Anonymous);
        let err = client.call(&Call::get("/api/v6/users/9/acts")).unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(client.transport().request_count(), 1);
    }

    #[test]
    fn absolute_url_and_query() {
        let t = ScriptedTransport::new();
        t.respond(200, "{}");
        let mut client = AuthClient::new(t, "https://agg.test/", AuthScheme::Anonymous);
        let call = Call::get("https://other.test/search").query("q", "siren:1");
        client.call(&call).unwrap();
        let req = &client.transport().requests()[0];
        assert_eq!(req.url, "https://other.test/search");
        assert_eq!(req.query_param("q"), Some("siren:1"));
    }

    #[test]
    fn pause_zero_is_noop() {
        let sleeper = RecordingSleep::new();
        let client = AuthClient::new(ScriptedTransport::new(), "https://x", AuthScheme::Anonymous)
            .with_sleeper(sleeper.clone());
        client.pause(Duration::ZERO);
        client.pause(Duration::from_secs(1));
        let slept = sleeper.recorded();
        assert_eq!(slept.len(), 1);
        assert!(slept[0] >= Duration::from_secs(1) && slept[0] <= Duration::from_millis(1200));
    }
}
