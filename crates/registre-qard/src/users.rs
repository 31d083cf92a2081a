//! User activity report: existence, identity and connection status per user id

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use registre_core::{
    AuthClient, CallError, ItemOutcome, ProgressContext, RunOutcome, RunStats, Transport,
    is_shutdown_requested,
};
use serde_json::Value;

use crate::api;
use crate::config::Config;
use crate::records::{UserReportRow, load_user_ids, write_user_report};

const CONNECTED: &str = "CONNECTED";

/// Check every user listed in `csv_path` and write the report to `report_path`.
///
/// The report is written even when the run stops early.
pub fn run<T: Transport>(
    client: &mut AuthClient<T>,
    config: &Config,
    csv_path: &Path,
    report_path: &Path,
    progress: &ProgressContext,
) -> Result<RunStats> {
    let start = Instant::now();
    let user_ids = load_user_ids(csv_path)?;
    let mut stats = RunStats::new("Qard users", user_ids.len());
    if user_ids.is_empty() {
        log::warn!("No user ids in {}", csv_path.display());
        return Ok(stats);
    }
    if let Some(outcome) = api::preflight(client, config)? {
        stats.outcome = outcome;
        return Ok(stats);
    }

    let mut rows = Vec::with_capacity(user_ids.len());
    let mut fatal = None;
    let pb = progress.batch_bar("users", user_ids.len());
    for (idx, uid) in user_ids.iter().enumerate() {
        if is_shutdown_requested() {
            stats.outcome = RunOutcome::Interrupted;
            break;
        }
        pb.set_message(uid.clone());
        log::info!("[{}/{}] User {uid}", idx + 1, user_ids.len());

        match check_user(client, config, uid) {
            Ok(row) => {
                stats.record(ItemOutcome {
                    siren: uid.clone(),
                    status: if row.exists { "ok" } else { "empty" },
                    found: usize::from(row.exists),
                    downloaded: usize::from(row.active),
                    detail: row.connections.clone(),
                });
                rows.push(row);
            }
            Err(e) => {
                fatal = Some((e, uid.clone()));
                break;
            }
        }
        pb.inc(1);
        client.pause(config.call_pause);
    }
    pb.finish_and_clear();

    write_user_report(report_path, &rows)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;
    log::info!("Report written to {}", report_path.display());

    if let Some((e, uid)) = fatal {
        api::stop_run(e, &uid, &mut stats)?;
    }
    stats.elapsed = start.elapsed();
    Ok(stats)
}

fn display_name(user: &Value) -> String {
    let field = |k: &str| user.get(k).and_then(Value::as_str).unwrap_or_default();
    if !field("name").is_empty() {
        return field("name").to_string();
    }
    format!("{} {}", field("first_name"), field("last_name"))
        .trim()
        .to_string()
}

/// Active means at least one connection reports `CONNECTED`
pub fn summarize_connections(connections: &[Value]) -> (bool, String) {
    let mut active = false;
    let items: Vec<String> = connections
        .iter()
        .map(|c| {
            let provider = match api::provider_name(c) {
                "" => "?",
                p => p,
            };
            let status = c
                .get("status")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or("?")
                .to_uppercase();
            active |= status == CONNECTED;
            format!("{provider}:{status}")
        })
        .collect();
    (active, items.join("; "))
}

fn check_user<T: Transport>(
    client: &mut AuthClient<T>,
    config: &Config,
    uid: &str,
) -> Result<UserReportRow, CallError> {
    let Some(user) = api::get_user(client, uid)? else {
        log::warn!("User {uid} not found or inaccessible");
        return Ok(UserReportRow {
            user_id: uid.to_string(),
            ..Default::default()
        });
    };
    let kind = user
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_uppercase();
    let siren = registre_core::filter::id_string(user.get("siren")).unwrap_or_default();
    let name = display_name(&user);
    log::info!("User {uid} exists ({kind}) name='{name}' siren='{siren}'");

    let connections = api::list_data_connections(client, uid, config.per_page)?;
    let (active, summary) = summarize_connections(&connections);
    log::info!(
        "User {uid}: active={active} connections=[{}]",
        if summary.is_empty() { "-" } else { summary.as_str() }
    );
    Ok(UserReportRow {
        user_id: uid.to_string(),
        exists: true,
        kind,
        name,
        siren,
        active,
        connections: summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn active_when_any_connected() {
        let (active, summary) = summarize_connections(&[
            json!({"provider_name": "company_legal_fr", "status": "connected"}),
            json!({"provider": "bank", "status": "ERROR"}),
            json!({}),
        ]);
        assert!(active);
        assert_eq!(summary, "company_legal_fr:CONNECTED; bank:ERROR; ?:?");
    }

    #[test]
    fn inactive_without_connections() {
        assert_eq!(summarize_connections(&[]), (false, String::new()));
    }

    #[test]
    fn name_falls_back_to_person_fields() {
        assert_eq!(display_name(&json!({"first_name": "Ada", "last_name": "L"})), "Ada L");
        assert_eq!(display_name(&json!({"name": "ACME"})), "ACME");
    }
}
