//! Base64-in-JSON packaging of retained actes.
//!
//! Writes `inpi_actes_<SIREN>.json`: an array of
//! `{siren, typeActe, id, mime, document_base64}` entries.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use registre_core::{
    AllowList, AuthClient, CallError, ItemOutcome, ProgressContext, RunOutcome, RunStats,
    Transport, is_shutdown_requested, write_atomic,
};
use serde::Serialize;

use crate::api;
use crate::config::Config;

pub const PDF_MIME: &str = "application/pdf";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PackEntry {
    pub siren: String,
    #[serde(rename = "typeActe")]
    pub type_acte: String,
    pub id: String,
    pub mime: &'static str,
    pub document_base64: String,
}

pub fn pack_path(output_dir: &Path, siren: &str) -> PathBuf {
    output_dir.join(format!("inpi_actes_{siren}.json"))
}

/// Download the retained actes of each SIREN and write one JSON pack per SIREN.
pub fn run<T: Transport>(
    client: &mut AuthClient<T>,
    config: &Config,
    sirens: &[String],
    progress: &ProgressContext,
) -> Result<RunStats> {
    let start = Instant::now();
    let mut stats = RunStats::new("INPI pack", sirens.len());
    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("Failed to create output directory {}", config.output_dir.display())
    })?;
    client
        .ensure_credential()
        .context("Cannot proceed without a token")?;

    let allow = config.allow_list();
    let pb = progress.batch_bar("pack", sirens.len());

    for (idx, siren) in sirens.iter().enumerate() {
        if is_shutdown_requested() {
            stats.outcome = RunOutcome::Interrupted;
            break;
        }
        pb.set_message(siren.clone());

        let (item, halted) = pack_siren(client, config, &allow, siren, &mut stats)?;
        if let Some(item) = item {
            stats.record(item);
        }
        pb.inc(1);

        if let Some(e) = halted {
            if let Some(q) = e.as_quota_stop() {
                log::error!("Quota exceeded while processing {siren}, stopping");
                stats.outcome = RunOutcome::QuotaStopped {
                    retry_after: q.retry_after,
                };
                break;
            }
            pb.finish_and_clear();
            return Err(e).with_context(|| format!("Run aborted at SIREN {siren}"));
        }
        if idx + 1 < sirens.len() {
            client.pause(config.pause_between_sirens);
        }
    }
    pb.finish_and_clear();

    stats.elapsed = start.elapsed();
    Ok(stats)
}

/// Pack one SIREN; a run-terminating error comes back beside the partial outcome
fn pack_siren<T: Transport>(
    client: &mut AuthClient<T>,
    config: &Config,
    allow: &AllowList,
    siren: &str,
    stats: &mut RunStats,
) -> Result<(Option<ItemOutcome>, Option<CallError>)> {
    let actes = match api::fetch_actes(client, siren) {
        Ok(actes) => actes,
        Err(e) if e.is_run_terminating() => {
            let item = e.as_quota_stop().map(|_| ItemOutcome {
                siren: siren.to_string(),
                status: "quota",
                found: 0,
                downloaded: 0,
                detail: e.to_string(),
            });
            return Ok((item, Some(e)));
        }
        Err(e) => {
            log::warn!("No attachments for {siren} ({e}), skipping");
            stats.errors += 1;
            let item = ItemOutcome {
                siren: siren.to_string(),
                status: "skipped",
                found: 0,
                downloaded: 0,
                detail: e.to_string(),
            };
            return Ok((Some(item), None));
        }
    };

    let retained: Vec<_> = actes.iter().filter(|d| allow.is_allowed(d)).collect();
    log::info!("{siren}: {} acte(s) matching", retained.len());

    let mut entries = Vec::with_capacity(retained.len());
    let mut failures = Vec::new();
    let mut halted = None;
    for acte in &retained {
        match api::download_acte(client, &acte.id) {
            Ok(bytes) => {
                entries.push(PackEntry {
                    siren: siren.to_string(),
                    type_acte: allow.choose_label(acte),
                    id: acte.id.clone(),
                    mime: PDF_MIME,
                    document_base64: STANDARD.encode(&bytes),
                });
                client.pause(config.pause_after_download);
            }
            Err(e) if e.is_run_terminating() => {
                halted = Some(e);
                break;
            }
            Err(e) => {
                log::error!("Failed to download {}: {e}", acte.id);
                stats.errors += 1;
                failures.push(format!("{}: {e}", acte.id));
            }
        }
    }

    // Whatever was fetched before a stop is still written out
    let path = pack_path(&config.output_dir, siren);
    let json = serde_json::to_vec_pretty(&entries).context("Failed to encode pack")?;
    write_atomic(&path, &json).with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Wrote {} item(s) to {}", entries.len(), path.display());

    let status = if retained.is_empty() {
        "empty"
    } else if halted.as_ref().is_some_and(|e| e.as_quota_stop().is_some()) {
        "quota"
    } else if !failures.is_empty() {
        "failed"
    } else {
        "ok"
    };
    let item = ItemOutcome {
        siren: siren.to_string(),
        status,
        found: retained.len(),
        downloaded: entries.len(),
        detail: failures.join("; "),
    };
    Ok((Some(item), halted))
}
