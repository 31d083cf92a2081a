//! Bulk download: for each SIREN find the user, list its files, keep the
//! allowed datatypes and save them as `<siren>_<DATATYPE>[_NN]__<name>`.

use std::time::Instant;

use anyhow::{Context, Result};
use registre_core::sink::cleanup_tmp_files;
use registre_core::{
    AuthClient, CallError, ItemOutcome, ProgressContext, RunOutcome, RunStats, Transport,
    is_shutdown_requested, write_atomic,
};

use crate::api;
use crate::config::Config;
use crate::files::{bulk_prefix, output_name, pick_files};

pub fn run<T: Transport>(
    client: &mut AuthClient<T>,
    config: &Config,
    sirens: &[String],
    progress: &ProgressContext,
) -> Result<RunStats> {
    let start = Instant::now();
    let mut stats = RunStats::new("Qard files", sirens.len());

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("Failed to create output directory {}", config.output_dir.display())
    })?;
    cleanup_tmp_files(&config.output_dir).context("Failed to clean stale tmp files")?;

    if sirens.is_empty() {
        log::warn!("No valid SIRENs to process");
        return Ok(stats);
    }
    if let Some(outcome) = api::preflight(client, config)? {
        stats.outcome = outcome;
        return Ok(stats);
    }

    let pb = progress.batch_bar("qard", sirens.len());
    for (idx, siren) in sirens.iter().enumerate() {
        if is_shutdown_requested() {
            log::warn!("Shutdown requested, stopping before SIREN {siren}");
            stats.outcome = RunOutcome::Interrupted;
            break;
        }
        pb.set_message(siren.clone());
        log::info!("[{}/{}] SIREN {siren}", idx + 1, sirens.len());

        match process_siren(client, config, siren, &mut stats) {
            Ok(item) => stats.record(item),
            Err(e) => {
                pb.finish_and_clear();
                api::stop_run(e, siren, &mut stats)?;
                break;
            }
        }
        pb.inc(1);
        client.pause(config.call_pause);
    }
    pb.finish_and_clear();

    stats.elapsed = start.elapsed();
    Ok(stats)
}

fn empty(siren: &str, detail: &str) -> ItemOutcome {
    ItemOutcome {
        siren: siren.to_string(),
        status: "empty",
        found: 0,
        downloaded: 0,
        detail: detail.to_string(),
    }
}

/// Errors returned here are fatal; everything else is folded into the outcome
fn process_siren<T: Transport>(
    client: &mut AuthClient<T>,
    config: &Config,
    siren: &str,
    stats: &mut RunStats,
) -> Result<ItemOutcome, CallError> {
    let user = match api::find_user_by_siren(client, siren, config.per_page)? {
        Some(user) => user,
        None => {
            log::warn!("No user found for SIREN {siren}");
            return Ok(empty(siren, "no user"));
        }
    };
    let Some(user_id) = api::user_id(&user) else {
        log::warn!("User for SIREN {siren} has no id");
        return Ok(empty(siren, "no user"));
    };
    log::info!(
        "User: {} (id={user_id})",
        user.get("name")
            .or_else(|| user.get("display_name"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
    );

    let files = api::list_files(client, &user_id, Some(siren), config.per_page)?;
    log::info!("{siren}: {} file(s) available", files.len());
    let chosen = pick_files(&files, config);
    if chosen.is_empty() {
        log::warn!("{siren}: no files matching allowed datatypes");
        return Ok(empty(siren, "no files"));
    }

    let mut downloaded = 0;
    let mut failures = Vec::new();
    for (n, file) in chosen.iter().enumerate() {
        let prefix = bulk_prefix(siren, file, n + 1, config.all_files);
        log::info!("Downloading {} (datatype={})", file.id, file.datatype);
        match api::download_file(client, &file.id) {
            Ok(response) => {
                let name = output_name(response.filename().as_deref(), &file.id, &prefix);
                let path = config.output_dir.join(name);
                write_atomic(&path, &response.body)?;
                log::info!("Saved {}", path.display());
                downloaded += 1;
            }
            Err(e) if api::is_fatal(&e) => return Err(e),
            Err(e) => {
                log::error!("Download failed for file {}: {e}", file.id);
                stats.errors += 1;
                failures.push(format!("{}: {e}", file.id));
            }
        }
        client.pause(config.call_pause);
    }

    Ok(ItemOutcome {
        siren: siren.to_string(),
        status: if failures.is_empty() { "ok" } else { "failed" },
        found: chosen.len(),
        downloaded,
        detail: failures.join("; "),
    })
}
