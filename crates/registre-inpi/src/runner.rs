//! Batch download of actes: one PDF per retained acte, named `<SIREN>_<id>.pdf`

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use registre_core::sink::{cleanup_tmp_files, is_complete};
use registre_core::{
    AuthClient, CallError, ItemOutcome, ProgressContext, RunOutcome, RunStats, Transport,
    is_shutdown_requested, write_atomic,
};

use crate::api;
use crate::config::Config;

/// Deterministic output name; acte ids are globally unique
pub fn acte_path(output_dir: &Path, siren: &str, acte_id: &str) -> PathBuf {
    output_dir.join(format!("{siren}_{acte_id}.pdf"))
}

/// What ended the processing of one SIREN early
enum Halt {
    Quota(RunOutcome),
    Fatal(CallError),
}

/// Run the download batch.
///
/// Quota exhaustion stops the loop at once and is reported through
/// [`RunStats::outcome`]. Authentication and local I/O failures abort with
/// an error.
pub fn run<T: Transport>(
    client: &mut AuthClient<T>,
    config: &Config,
    sirens: &[String],
    progress: &ProgressContext,
) -> Result<RunStats> {
    let start = Instant::now();
    let mut stats = RunStats::new("INPI actes", sirens.len());

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("Failed to create output directory {}", config.output_dir.display())
    })?;
    cleanup_tmp_files(&config.output_dir).context("Failed to clean stale tmp files")?;

    if sirens.is_empty() {
        log::warn!("No valid SIRENs to process");
        return Ok(stats);
    }

    client
        .ensure_credential()
        .context("Cannot proceed without a token")?;

    if config.probe {
        if let Err(e) = api::probe(client, &sirens[0]) {
            if let Some(q) = e.as_quota_stop() {
                log::error!("Token probe hit the quota, stopping");
                stats.outcome = RunOutcome::QuotaStopped {
                    retry_after: q.retry_after,
                };
                stats.elapsed = start.elapsed();
                return Ok(stats);
            }
            return Err(e).context("Cannot proceed without a valid token");
        }
    }

    let allow = config.allow_list();
    let pb = progress.batch_bar("inpi", sirens.len());

    for (idx, siren) in sirens.iter().enumerate() {
        if is_shutdown_requested() {
            log::warn!("Shutdown requested, stopping before SIREN {siren}");
            stats.outcome = RunOutcome::Interrupted;
            break;
        }
        pb.set_message(siren.clone());
        log::info!("[{}/{}] SIREN {siren}", idx + 1, sirens.len());

        match process_siren(client, config, &allow, siren, &mut stats) {
            Ok(item) => stats.record(item),
            Err(Halt::Quota(outcome)) => {
                stats.outcome = outcome;
                break;
            }
            Err(Halt::Fatal(e)) => {
                pb.finish_and_clear();
                return Err(e).with_context(|| format!("Run aborted at SIREN {siren}"));
            }
        }
        pb.inc(1);

        if idx + 1 < sirens.len() {
            client.pause(config.pause_between_sirens);
        }
    }
    pb.finish_and_clear();

    stats.elapsed = start.elapsed();
    Ok(stats)
}

/// Classify a run-terminating error, recording what the SIREN got so far
fn halt(e: CallError, siren: &str, found: usize, downloaded: usize, stats: &mut RunStats) -> Halt {
    match e.as_quota_stop() {
        Some(q) => {
            log::error!("Quota exceeded while processing {siren}, stopping the run");
            stats.record(ItemOutcome {
                siren: siren.to_string(),
                status: "quota",
                found,
                downloaded,
                detail: e.to_string(),
            });
            Halt::Quota(RunOutcome::QuotaStopped {
                retry_after: q.retry_after,
            })
        }
        None => Halt::Fatal(e),
    }
}

fn process_siren<T: Transport>(
    client: &mut AuthClient<T>,
    config: &Config,
    allow: &registre_core::AllowList,
    siren: &str,
    stats: &mut RunStats,
) -> Result<ItemOutcome, Halt> {
    let actes = match api::fetch_actes(client, siren) {
        Ok(actes) => actes,
        Err(e) if e.is_run_terminating() => return Err(halt(e, siren, 0, 0, stats)),
        Err(e) => {
            log::warn!("No attachments for {siren} ({e}), skipping");
            stats.errors += 1;
            return Ok(ItemOutcome {
                siren: siren.to_string(),
                status: "skipped",
                found: 0,
                downloaded: 0,
                detail: e.to_string(),
            });
        }
    };

    let retained: Vec<_> = actes.iter().filter(|d| allow.is_allowed(d)).collect();
    log::info!(
        "{siren}: {} matching acte(s) out of {}",
        retained.len(),
        actes.len()
    );
    if retained.is_empty() {
        return Ok(ItemOutcome {
            siren: siren.to_string(),
            status: "empty",
            found: 0,
            downloaded: 0,
            detail: String::new(),
        });
    }

    let mut downloaded = 0;
    let mut failures = Vec::new();
    for acte in &retained {
        let path = acte_path(&config.output_dir, siren, &acte.id);
        if is_complete(&path) {
            log::info!("{} already present", path.display());
            downloaded += 1;
            continue;
        }
        log::info!("Downloading {siren}: {} (ID {})", acte.name, acte.id);
        match api::download_acte(client, &acte.id) {
            Ok(bytes) => {
                if let Err(e) = write_atomic(&path, &bytes) {
                    return Err(halt(CallError::Io(e), siren, retained.len(), downloaded, stats));
                }
                log::info!("Saved {}", path.display());
                downloaded += 1;
                client.pause(config.pause_after_download);
            }
            Err(e) if e.is_run_terminating() => {
                return Err(halt(e, siren, retained.len(), downloaded, stats));
            }
            Err(e) => {
                log::error!("Failed to download {}: {e}", acte.id);
                stats.errors += 1;
                failures.push(format!("{}: {e}", acte.id));
            }
        }
    }

    Ok(ItemOutcome {
        siren: siren.to_string(),
        status: if failures.is_empty() { "ok" } else { "failed" },
        found: retained.len(),
        downloaded,
        detail: failures.join("; "),
    })
}
