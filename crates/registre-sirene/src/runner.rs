//! Draw candidate SIRENs, keep the diffusible ones, write the identifiers file

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use rand::Rng;
use registre_core::{
    AuthClient, ConfigError, ProgressContext, RunOutcome, RunStats, Transport, is_shutdown_requested,
    write_atomic,
};

use crate::api;
use crate::config::Config;
use crate::luhn::{format_siren, sample_valid_sirens};

/// One SIREN per line, sorted
pub fn write_sirens(path: &Path, sirens: &BTreeSet<String>) -> std::io::Result<()> {
    let mut text = String::with_capacity(sirens.len() * 10);
    for s in sirens {
        text.push_str(s);
        text.push('\n');
    }
    write_atomic(path, text.as_bytes())
}

/// Check the candidates batch by batch and write what was found.
///
/// Interrupted runs still write the SIRENs found so far.
pub fn check_candidates<T: Transport>(
    client: &mut AuthClient<T>,
    config: &Config,
    candidates: &[String],
    progress: &ProgressContext,
) -> Result<RunStats> {
    let start = Instant::now();
    let mut stats = RunStats::new("SIRENE sample", candidates.len());
    let batch_size = config.batch_size.max(1);
    let batches = candidates.len().div_ceil(batch_size);
    let mut existing = BTreeSet::new();

    let pb = progress.batch_bar("sirene", batches);
    for (n, chunk) in candidates.chunks(batch_size).enumerate() {
        if is_shutdown_requested() {
            log::warn!("Shutdown requested, stopping after {n} batch(es)");
            stats.outcome = RunOutcome::Interrupted;
            break;
        }
        let found = api::batch_diffusible_exists(client, &config.search_url, chunk)
            .context("Search batch failed")?;
        log::debug!("Batch {}/{batches}: {} diffusible", n + 1, found.len());
        stats.processed += chunk.len();
        stats.found += found.len();
        existing.extend(found);
        pb.inc(1);
        client.pause(config.pause_between_batches);
    }
    pb.finish_and_clear();

    log::info!(
        "Checked {} candidates in {batches} batch(es), {} diffusible",
        stats.processed,
        existing.len()
    );
    write_sirens(&config.output, &existing)
        .with_context(|| format!("Failed to write {}", config.output.display()))?;
    log::info!("Wrote {}", config.output.display());

    stats.elapsed = start.elapsed();
    Ok(stats)
}

/// Sample `config.sample_size` valid SIRENs in the configured range and check them
pub fn run<T: Transport, R: Rng + ?Sized>(
    client: &mut AuthClient<T>,
    config: &Config,
    rng: &mut R,
    progress: &ProgressContext,
) -> Result<RunStats> {
    let candidates: Vec<String> =
        sample_valid_sirens(config.range_start, config.range_end, config.sample_size, rng)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?
            .into_iter()
            .map(format_siren)
            .collect();
    log::info!(
        "Generated {} valid SIRENs in [{}, {}]",
        candidates.len(),
        config.range_start,
        config.range_end
    );
    check_candidates(client, config, &candidates, progress)
}
