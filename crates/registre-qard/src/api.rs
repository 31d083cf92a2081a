//! Qard v6 endpoints.
//!
//! Listings come back as a bare array or wrapped under one of a few field
//! names depending on the tenant, so every listing helper accepts both and
//! falls back to alternative routes before giving up.

use std::sync::Arc;

use anyhow::Context;
use registre_core::filter::id_string;
use registre_core::{
    ApiResponse, AuthClient, AuthScheme, Call, CallError, ConfigError, ItemOutcome, Pages,
    RateLimiter, RunOutcome, RunStats, Sleep, Transport,
};
use serde_json::{Value, json};

use crate::config::{API_KEY_HEADER, Config};

pub const LEGAL_PROVIDER: &str = "company_legal_fr";
pub const ACT_DATATYPE: &str = "ACT";

const RESULT_KEYS: &[&str] = &["result"];
const SEARCH_PARAMS: &[&str] = &["siren", "query", "search", "q"];
const SEARCH_PER_PAGE: u32 = 50;
const FILE_KEYS: &[&str] = &["result", "files"];
const CONNECTION_KEYS: &[&str] = &["result", "data_connections", "connections"];
const ACT_KEYS: &[&str] = &["result", "acts"];
const SYNC_TERMINAL: &[&str] = &["SUCCESS", "FAILED", "CANCELED"];

/// Build the API-key client; pacing comes from the per-call politeness pause.
pub fn build_client<T: Transport>(
    config: &Config,
    transport: T,
    sleeper: Arc<dyn Sleep>,
) -> AuthClient<T> {
    let scheme = AuthScheme::ApiKey {
        header: API_KEY_HEADER.to_string(),
        key: config.api_key.clone(),
    };
    AuthClient::new(transport, &config.base_url, scheme)
        .with_policy(config.retry.clone())
        .with_limiters(RateLimiter::unlimited(), RateLimiter::unlimited())
        .with_timeouts(config.metadata_timeout, config.download_timeout)
        .with_sleeper(sleeper)
}

/// Errors after which no further call makes sense: quota, local I/O, or a
/// static key the provider rejects.
pub fn is_fatal(e: &CallError) -> bool {
    e.is_run_terminating() || matches!(e, CallError::Unauthorized)
}

/// Items of a listing body: a bare array, or the first array under `keys`
pub fn list_items(body: Value, keys: &[&str]) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => keys
            .iter()
            .find_map(|k| match map.remove(*k) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn siren_matches(user: &Value, siren: &str) -> bool {
    id_string(user.get("siren")).is_some_and(|s| s.trim() == siren)
}

/// `GET /api/v6/clients`; returns the client name
pub fn auth_check<T: Transport>(client: &mut AuthClient<T>) -> Result<String, CallError> {
    let me = client.get_json(&Call::get("/api/v6/clients"))?;
    let name = str_field(&me, "name");
    let name = if name.is_empty() { "unknown" } else { name };
    log::info!("Auth OK. Client: {name}");
    Ok(name.to_string())
}

/// Check the key and the credential before a batch.
///
/// Returns the quota outcome when the check itself hit the quota.
pub(crate) fn preflight<T: Transport>(
    client: &mut AuthClient<T>,
    config: &Config,
) -> anyhow::Result<Option<RunOutcome>> {
    if config.api_key.is_empty() {
        return Err(ConfigError::MissingCredential("QARD_API_KEY").into());
    }
    match auth_check(client) {
        Ok(_) => Ok(None),
        Err(e) => match e.as_quota_stop() {
            Some(q) => {
                log::error!("Auth check hit the quota, stopping");
                Ok(Some(RunOutcome::QuotaStopped {
                    retry_after: q.retry_after,
                }))
            }
            None => Err(e).context("Auth check failed on /api/v6/clients"),
        },
    }
}

/// Route a fatal error: a quota stop is recorded against `key` and ends the
/// loop cleanly, anything else aborts the run.
pub(crate) fn stop_run(e: CallError, key: &str, stats: &mut RunStats) -> anyhow::Result<()> {
    match e.as_quota_stop() {
        Some(q) => {
            log::error!("Quota exceeded while processing {key}, stopping the run");
            stats.record(ItemOutcome {
                siren: key.to_string(),
                status: "quota",
                found: 0,
                downloaded: 0,
                detail: e.to_string(),
            });
            stats.outcome = RunOutcome::QuotaStopped {
                retry_after: q.retry_after,
            };
            Ok(())
        }
        None => Err(e).with_context(|| format!("Run aborted at {key}")),
    }
}

/// Find the user registered for a SIREN.
///
/// Scans the paginated user list first, then tries the server-side search
/// parameters. Non-fatal listing failures just move on to the next strategy.
pub fn find_user_by_siren<T: Transport>(
    client: &mut AuthClient<T>,
    siren: &str,
    per_page: u32,
) -> Result<Option<Value>, CallError> {
    for item in Pages::new(client, Call::get("/api/v6/users"), per_page).item_keys(RESULT_KEYS) {
        match item {
            Ok(user) if siren_matches(&user, siren) => return Ok(Some(user)),
            Ok(_) => {}
            Err(e) if is_fatal(&e) => return Err(e),
            Err(e) => {
                log::debug!("User scan failed ({e}), trying search parameters");
                break;
            }
        }
    }

    for param in SEARCH_PARAMS {
        let call = Call::get("/api/v6/users")
            .query(*param, siren)
            .query("per_page", SEARCH_PER_PAGE);
        let body = match client.get_json(&call) {
            Ok(body) => body,
            Err(e) if is_fatal(&e) => return Err(e),
            Err(e) => {
                log::debug!("User search by '{param}' failed: {e}");
                continue;
            }
        };
        if let Some(user) = list_items(body, &["result", "users"])
            .into_iter()
            .find(|u| siren_matches(u, siren))
        {
            return Ok(Some(user));
        }
    }
    Ok(None)
}

/// `POST /api/v6/users/legal`
pub fn create_legal_user<T: Transport>(
    client: &mut AuthClient<T>,
    siren: &str,
) -> Result<Value, CallError> {
    let body = json!({ "name": format!("SIREN {siren}"), "siren": siren, "group": "default" });
    let user = client.get_json(&Call::post("/api/v6/users/legal", body))?;
    log::info!("Created user id={} for {siren}", user_id(&user).unwrap_or_default());
    Ok(user)
}

pub fn user_id(user: &Value) -> Option<String> {
    id_string(user.get("id"))
}

/// Files visible for a user: nested route, then flat listings by user id and by SIREN
pub fn list_files<T: Transport>(
    client: &mut AuthClient<T>,
    user_id: &str,
    siren: Option<&str>,
    per_page: u32,
) -> Result<Vec<Value>, CallError> {
    let mut routes = vec![
        Call::get(format!("/api/v6/users/{user_id}/files")).query("per_page", per_page),
        Call::get("/api/v6/files")
            .query("user_id", user_id)
            .query("per_page", per_page),
    ];
    if let Some(siren) = siren {
        routes.push(
            Call::get("/api/v6/files")
                .query("siren", siren)
                .query("per_page", per_page),
        );
    }
    first_listing(client, &routes, FILE_KEYS)
}

/// Items of the first route that answers 2xx with a recognised listing
fn first_listing<T: Transport>(
    client: &mut AuthClient<T>,
    routes: &[Call],
    keys: &[&str],
) -> Result<Vec<Value>, CallError> {
    for call in routes {
        match client.get_json(call) {
            Ok(body) => {
                let recognised = body.is_array()
                    || keys.iter().any(|k| body.get(*k).is_some_and(Value::is_array));
                if recognised {
                    return Ok(list_items(body, keys));
                }
            }
            Err(e) if is_fatal(&e) => return Err(e),
            Err(e) => log::debug!("{} failed: {e}", call.path),
        }
    }
    Ok(Vec::new())
}

/// `GET /api/v6/file/{id}`
pub fn download_file<T: Transport>(
    client: &mut AuthClient<T>,
    file_id: &str,
) -> Result<ApiResponse, CallError> {
    client.call(&Call::download(format!("/api/v6/file/{file_id}")))
}

/// `GET /api/v6/users/{id}`; `None` when the user is unknown or inaccessible
pub fn get_user<T: Transport>(
    client: &mut AuthClient<T>,
    user_id: &str,
) -> Result<Option<Value>, CallError> {
    match client.get_json(&Call::get(format!("/api/v6/users/{user_id}"))) {
        Ok(user) if user.is_object() => Ok(Some(user)),
        Ok(_) => Ok(None),
        Err(e) if is_fatal(&e) => Err(e),
        Err(e) => {
            log::debug!("User {user_id}: {e}");
            Ok(None)
        }
    }
}

/// Data connections of a user: nested route, then the flat listing
pub fn list_data_connections<T: Transport>(
    client: &mut AuthClient<T>,
    user_id: &str,
    per_page: u32,
) -> Result<Vec<Value>, CallError> {
    let routes = [
        Call::get(format!("/api/v6/users/{user_id}/data-connections")).query("per_page", per_page),
        Call::get("/api/v6/data-connections")
            .query("user_id", user_id)
            .query("per_page", per_page),
    ];
    first_listing(client, &routes, CONNECTION_KEYS)
}

pub fn provider_name(connection: &Value) -> &str {
    let name = str_field(connection, "provider_name");
    if name.is_empty() {
        str_field(connection, "provider")
    } else {
        name
    }
}

fn find_legal_connection(connections: Vec<Value>) -> Option<Value> {
    connections
        .into_iter()
        .find(|c| provider_name(c).eq_ignore_ascii_case(LEGAL_PROVIDER))
}

/// Make sure the user has a `company_legal_fr` connection requesting acts.
///
/// A 409 on creation means it appeared in the meantime; the list is read again.
pub fn ensure_legal_connection<T: Transport>(
    client: &mut AuthClient<T>,
    user_id: &str,
    per_page: u32,
) -> Result<Value, CallError> {
    if let Some(dc) = find_legal_connection(list_data_connections(client, user_id, per_page)?) {
        log::info!(
            "Found {LEGAL_PROVIDER} connection id={} (status={})",
            id_or_unknown(&dc),
            str_field(&dc, "status")
        );
        return Ok(dc);
    }
    let body = json!({ "provider_name": LEGAL_PROVIDER, "requested_data_types": [ACT_DATATYPE] });
    let path = format!("/api/v6/users/{user_id}/data-connections");
    match client.get_json(&Call::post(&path, body)) {
        Ok(dc) => {
            log::info!("Created {LEGAL_PROVIDER} connection id={}", id_or_unknown(&dc));
            Ok(dc)
        }
        Err(e) if e.status() == Some(409) => {
            find_legal_connection(list_data_connections(client, user_id, per_page)?).ok_or_else(
                || CallError::Decode(format!("{path}: 409 but no {LEGAL_PROVIDER} connection listed")),
            )
        }
        Err(e) => Err(e),
    }
}

fn id_or_unknown(value: &Value) -> String {
    id_string(value.get("id")).unwrap_or_else(|| "?".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncLaunch {
    Started,
    /// 409: a sync for this user is already running
    AlreadyRunning,
}

/// `POST /api/v6/users/{id}/sync` for acts only
pub fn launch_sync<T: Transport>(
    client: &mut AuthClient<T>,
    user_id: &str,
) -> Result<SyncLaunch, CallError> {
    let call = Call::post(
        format!("/api/v6/users/{user_id}/sync"),
        json!({ "data_types": [ACT_DATATYPE] }),
    );
    match client.call(&call) {
        Ok(_) => Ok(SyncLaunch::Started),
        Err(e) if e.status() == Some(409) => Ok(SyncLaunch::AlreadyRunning),
        Err(e) => Err(e),
    }
}

/// Status of the most recent sync, upper-cased
pub fn latest_sync_status<T: Transport>(
    client: &mut AuthClient<T>,
    user_id: &str,
) -> Result<Option<String>, CallError> {
    let call = Call::get(format!("/api/v6/users/{user_id}/sync")).query("per_page", 1);
    let body = client.get_json(&call)?;
    Ok(list_items(body, RESULT_KEYS)
        .first()
        .map(|s| str_field(s, "status").to_uppercase()))
}

/// Poll the latest sync until it reaches a terminal status or the deadline passes.
///
/// Returns the terminal status, `None` on timeout. Non-fatal polling errors
/// are ignored and polling continues.
pub fn wait_for_sync<T: Transport>(
    client: &mut AuthClient<T>,
    user_id: &str,
    config: &Config,
) -> Result<Option<String>, CallError> {
    let mut last = None;
    for _ in 0..config.max_sync_polls() {
        match latest_sync_status(client, user_id) {
            Ok(Some(status)) => {
                if last.as_ref() != Some(&status) {
                    log::info!("Sync status for user {user_id}: {status}");
                    last = Some(status.clone());
                }
                if SYNC_TERMINAL.contains(&status.as_str()) {
                    return Ok(Some(status));
                }
            }
            Ok(None) => {}
            Err(e) if is_fatal(&e) => return Err(e),
            Err(e) => log::debug!("Sync status for user {user_id}: {e}"),
        }
        client.sleeper().sleep(config.sync_poll_interval);
    }
    log::warn!(
        "Sync for user {user_id} still unfinished after {}s",
        config.sync_timeout.as_secs()
    );
    Ok(None)
}

/// One registry act as listed by the aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Act {
    pub file_id: String,
    pub titles: Vec<String>,
    pub date: String,
}

impl Act {
    fn from_json(value: &Value) -> Self {
        let titles = value
            .get("titles")
            .and_then(Value::as_array)
            .map(|t| {
                t.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            file_id: id_string(value.get("file_id")).unwrap_or_default(),
            titles,
            date: str_field(value, "date").to_string(),
        }
    }
}

/// `GET /api/v6/users/{id}/acts`; a 404 means no acts
pub fn list_acts<T: Transport>(
    client: &mut AuthClient<T>,
    user_id: &str,
    per_page: u32,
) -> Result<Vec<Act>, CallError> {
    let call = Call::get(format!("/api/v6/users/{user_id}/acts")).query("per_page", per_page);
    match client.get_json(&call) {
        Ok(body) => Ok(list_items(body, ACT_KEYS).iter().map(Act::from_json).collect()),
        Err(e) if e.status() == Some(404) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}
