pub mod inpi;
pub mod pages;
pub mod qard;
pub mod sirene;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use registre_core::{
    ConfigError, HttpTransport, ProgressContext, RunOutcome, RunStats, Sleep, ThreadSleep,
    load_sirens,
};

use crate::config::Config;

/// Real transport and sleeper for a live run
pub(crate) fn live_transport(config: &Config) -> Result<(HttpTransport, Arc<dyn Sleep>)> {
    let transport = HttpTransport::new(&config.http.transport_config())
        .context("Failed to build HTTP client")?;
    Ok((transport, Arc::new(ThreadSleep)))
}

/// SIREN list from `--sirens`, falling back to the configured file
pub(crate) fn read_sirens(arg: Option<PathBuf>, config: &Config) -> Result<Vec<String>> {
    let path = arg.unwrap_or_else(|| config.output.sirens_file.clone());
    Ok(load_sirens(&path)?)
}

pub(crate) fn require(value: &Option<String>, name: &'static str) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::MissingCredential(name).into()),
    }
}

/// Print the end-of-run summary and write the optional per-SIREN report
pub(crate) fn finish(
    stats: &RunStats,
    report: Option<&Path>,
    progress: &ProgressContext,
) -> Result<RunOutcome> {
    if progress.is_tty() {
        eprintln!("\n{}", stats.format_table());
    } else {
        stats.log();
    }
    if let Some(path) = report {
        stats
            .write_report(path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        log::info!("Report written to {}", path.display());
    }
    Ok(stats.outcome)
}
