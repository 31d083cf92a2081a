//! Download the files listed in a CSV of file ids

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use registre_core::sink::cleanup_tmp_files;
use registre_core::{
    AuthClient, ItemOutcome, ProgressContext, RunOutcome, RunStats, Transport,
    is_shutdown_requested, write_atomic,
};

use crate::api;
use crate::config::Config;
use crate::files::{act_prefix, output_name};
use crate::records::load_file_rows;

/// Existing files are kept unless `config.overwrite` is set. The final name
/// depends on the served filename, so the file is fetched before the check.
pub fn run<T: Transport>(
    client: &mut AuthClient<T>,
    config: &Config,
    csv_path: &Path,
    progress: &ProgressContext,
) -> Result<RunStats> {
    let start = Instant::now();
    let rows = load_file_rows(csv_path)?;
    let mut stats = RunStats::new("Qard CSV files", rows.len());

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("Failed to create output directory {}", config.output_dir.display())
    })?;
    cleanup_tmp_files(&config.output_dir).context("Failed to clean stale tmp files")?;

    if rows.is_empty() {
        log::warn!("No rows in {}", csv_path.display());
        return Ok(stats);
    }
    if let Some(outcome) = api::preflight(client, config)? {
        stats.outcome = outcome;
        return Ok(stats);
    }
    log::info!(
        "{} row(s) from {}, saving to {}",
        rows.len(),
        csv_path.display(),
        config.output_dir.display()
    );

    let pb = progress.batch_bar("csv", rows.len());
    for (idx, row) in rows.iter().enumerate() {
        if is_shutdown_requested() {
            log::warn!("Shutdown requested, stopping at row {}", idx + 1);
            stats.outcome = RunOutcome::Interrupted;
            break;
        }
        pb.inc(1);
        if row.file_id.is_empty() {
            log::warn!("[{}/{}] Missing file_id, skipping", idx + 1, rows.len());
            continue;
        }
        pb.set_message(row.file_id.clone());
        log::info!("[{}/{}] Downloading file_id={}", idx + 1, rows.len(), row.file_id);

        let key = if row.siren.is_empty() {
            row.file_id.clone()
        } else {
            row.siren.clone()
        };
        let mut item = ItemOutcome {
            siren: key.clone(),
            status: "ok",
            found: 1,
            downloaded: 0,
            detail: row.file_id.clone(),
        };
        match api::download_file(client, &row.file_id) {
            Ok(response) => {
                let prefix = act_prefix(&row.siren, &row.date, &row.titles);
                let name = output_name(response.filename().as_deref(), &row.file_id, &prefix);
                let path = config.output_dir.join(name);
                if path.exists() && !config.overwrite {
                    log::info!("{} already present, keeping it", path.display());
                } else {
                    write_atomic(&path, &response.body)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    log::info!("Saved {}", path.display());
                }
                item.downloaded = 1;
            }
            Err(e) if api::is_fatal(&e) => {
                pb.finish_and_clear();
                api::stop_run(e, &key, &mut stats)?;
                break;
            }
            Err(e) => {
                log::error!("Download failed for file_id={}: {e}", row.file_id);
                stats.errors += 1;
                item.status = "failed";
                item.detail = format!("{}: {e}", row.file_id);
            }
        }
        stats.record(item);
        client.pause(config.call_pause);
    }
    pb.finish_and_clear();

    stats.elapsed = start.elapsed();
    Ok(stats)
}
