//! Acts listing: make sure each SIREN has a user with a legal-data
//! connection, refresh its acts and append them to a CSV.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use registre_core::{
    AuthClient, CallError, ItemOutcome, ProgressContext, RunOutcome, RunStats, Transport,
    is_shutdown_requested,
};

use crate::api::{self, SyncLaunch};
use crate::config::Config;
use crate::records::{ActRow, append_act_rows};

pub fn run<T: Transport>(
    client: &mut AuthClient<T>,
    config: &Config,
    sirens: &[String],
    csv_path: &Path,
    progress: &ProgressContext,
) -> Result<RunStats> {
    let start = Instant::now();
    let mut stats = RunStats::new("Qard acts", sirens.len());

    append_act_rows(csv_path, &[])
        .with_context(|| format!("Failed to prepare {}", csv_path.display()))?;
    if sirens.is_empty() {
        log::warn!("No valid SIRENs to process");
        return Ok(stats);
    }
    if let Some(outcome) = api::preflight(client, config)? {
        stats.outcome = outcome;
        return Ok(stats);
    }

    let pb = progress.batch_bar("acts", sirens.len());
    for siren in sirens {
        if is_shutdown_requested() {
            log::warn!("Shutdown requested, stopping before SIREN {siren}");
            stats.outcome = RunOutcome::Interrupted;
            break;
        }
        pb.set_message(siren.clone());

        let rows = match process_siren(client, config, siren) {
            Ok(rows) => rows,
            Err(Halt::Skip(item)) => {
                stats.errors += 1;
                stats.record(item);
                pb.inc(1);
                client.pause(config.call_pause);
                continue;
            }
            Err(Halt::Fatal(e)) => {
                pb.finish_and_clear();
                api::stop_run(e, siren, &mut stats)?;
                break;
            }
        };
        append_act_rows(csv_path, &rows)
            .with_context(|| format!("Failed to append to {}", csv_path.display()))?;
        log::info!("Appended {} row(s) to {}", rows.len(), csv_path.display());
        stats.record(ItemOutcome {
            siren: siren.clone(),
            status: if rows.is_empty() { "empty" } else { "ok" },
            found: rows.len(),
            downloaded: 0,
            detail: String::new(),
        });
        pb.inc(1);
        client.pause(config.call_pause);
    }
    pb.finish_and_clear();

    stats.elapsed = start.elapsed();
    Ok(stats)
}

/// Why the processing of one SIREN stopped early
enum Halt {
    /// Only this SIREN is affected
    Skip(ItemOutcome),
    Fatal(CallError),
}

fn skip(siren: &str, detail: String) -> Halt {
    Halt::Skip(ItemOutcome {
        siren: siren.to_string(),
        status: "skipped",
        found: 0,
        downloaded: 0,
        detail,
    })
}

/// Tag a step failure as SIREN-scoped unless it is fatal
fn step<V>(siren: &str, name: &str, result: Result<V, CallError>) -> Result<V, Halt> {
    result.map_err(|e| {
        if api::is_fatal(&e) {
            Halt::Fatal(e)
        } else {
            log::error!("{siren}: {name} failed: {e}");
            skip(siren, format!("{name}: {e}"))
        }
    })
}

fn process_siren<T: Transport>(
    client: &mut AuthClient<T>,
    config: &Config,
    siren: &str,
) -> Result<Vec<ActRow>, Halt> {
    let found = step(
        siren,
        "user lookup",
        api::find_user_by_siren(client, siren, config.per_page),
    )?;
    let user = match found {
        Some(user) => user,
        None if config.create_missing_users => {
            step(siren, "user creation", api::create_legal_user(client, siren))?
        }
        None => {
            log::warn!("No user for SIREN {siren}, creation disabled");
            return Err(skip(siren, "no user".into()));
        }
    };
    let Some(user_id) = api::user_id(&user) else {
        return Err(skip(siren, "user without id".into()));
    };
    log::info!("{siren}: using user id={user_id}");

    step(
        siren,
        "data connection",
        api::ensure_legal_connection(client, &user_id, config.per_page),
    )?;

    match step(siren, "sync request", api::launch_sync(client, &user_id))? {
        SyncLaunch::Started => log::info!("{siren}: sync launched, waiting for completion"),
        SyncLaunch::AlreadyRunning => {
            log::info!("{siren}: a sync is already running, waiting for it to finish")
        }
    }
    if let Some(status) = api::wait_for_sync(client, &user_id, config).map_err(Halt::Fatal)? {
        log::info!("{siren}: sync finished with status={status}");
    }

    let acts = step(
        siren,
        "acts listing",
        api::list_acts(client, &user_id, config.per_page),
    )?;
    log::info!("{siren}: {} act(s)", acts.len());
    Ok(acts
        .into_iter()
        .map(|act| ActRow {
            siren: siren.to_string(),
            user_id: user_id.clone(),
            file_id: act.file_id,
            titles: act.titles.join("; "),
            date: act.date,
        })
        .collect())
}
