//! registre - Document pullers for French business registries
//!
//! Fetches company documents (actes, statuts, legal notices) by SIREN from
//! the national registry and the Qard aggregator, and samples existing
//! SIRENs from the public search API.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use registre_core::{CallError, ConfigError, QuotaStop, RunOutcome};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "registre")]
#[command(about = "Document pullers for French business registries")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./registre.toml or ~/.config/registre/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// National registry (INPI) actes
    Inpi(cmd::inpi::InpiArgs),
    /// Qard aggregator files and acts
    Qard(cmd::qard::QardArgs),
    /// Sample existing SIRENs
    Sirene(cmd::sirene::SireneArgs),
    /// Pre-OCR page classification
    Pages(cmd::pages::PagesArgs),
    /// Show current configuration
    Config,
}

const EXIT_FAILURE: u8 = 1;
const EXIT_QUOTA: u8 = 2;
const EXIT_CONFIG: u8 = 3;
const EXIT_INTERRUPTED: u8 = 130;

fn outcome_code(outcome: RunOutcome) -> u8 {
    match outcome {
        RunOutcome::Completed => 0,
        RunOutcome::QuotaStopped { .. } => EXIT_QUOTA,
        RunOutcome::Interrupted => EXIT_INTERRUPTED,
    }
}

fn error_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if cause.is::<ConfigError>() {
            return EXIT_CONFIG;
        }
        if cause.is::<QuotaStop>() {
            return EXIT_QUOTA;
        }
        if let Some(CallError::QuotaExceeded { .. }) = cause.downcast_ref::<CallError>() {
            return EXIT_QUOTA;
        }
    }
    EXIT_FAILURE
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(registre_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, progress bars show activity
    //   non-TTY: info unless --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    if let Err(e) = registre_core::init_logging(quiet, cli.debug, multi) {
        eprintln!("Failed to initialize logging: {e}");
    }

    if let Err(e) = registre_core::install_signal_handlers() {
        log::warn!("Signal handlers not installed: {e}");
    }

    match run(cli, &progress) {
        Ok(outcome) => {
            if outcome != RunOutcome::Completed {
                log::warn!("Run {outcome}");
            }
            ExitCode::from(outcome_code(outcome))
        }
        Err(e) => {
            log::error!("{e:#}");
            if !log::log_enabled!(log::Level::Error) {
                eprintln!("Error: {e:#}");
            }
            ExitCode::from(error_code(&e))
        }
    }
}

fn run(cli: Cli, progress: &registre_core::SharedProgress) -> Result<RunOutcome> {
    let config = match cli.config {
        Some(path) => Config::from_file(&path),
        None => Config::load(),
    }
    .map_err(|e| ConfigError::Invalid(format!("{e:#}")))?;

    match cli.command {
        Command::Inpi(args) => cmd::inpi::run(args, &config, progress),
        Command::Qard(args) => cmd::qard::run(args, &config, progress),
        Command::Sirene(args) => cmd::sirene::run(args, &config, progress),
        Command::Pages(args) => cmd::pages::run(args),
        Command::Config => {
            print_config(&config);
            Ok(RunOutcome::Completed)
        }
    }
}

fn secret(value: &Option<String>) -> &'static str {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => "configured",
        _ => "not set",
    }
}

fn print_config(config: &Config) {
    use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec![
        "Output directory",
        &config.output.dir.display().to_string(),
    ]);
    table.add_row(vec![
        "SIREN list",
        &config.output.sirens_file.display().to_string(),
    ]);
    table.add_row(vec![
        "Retries",
        &format!(
            "{} attempts (metadata {:?}s, download {:?}s)",
            config.retry.max_attempts,
            config.retry.metadata_backoff_secs,
            config.retry.download_backoff_secs
        ),
    ]);
    table.add_row(vec!["INPI base URL", &config.inpi.base_url]);
    table.add_row(vec!["INPI username", secret(&config.inpi.username)]);
    table.add_row(vec!["INPI password", secret(&config.inpi.password)]);
    table.add_row(vec![
        "INPI rate",
        &format!(
            "{}/min metadata, {}/min download",
            config.inpi.metadata_rpm, config.inpi.download_rpm
        ),
    ]);
    table.add_row(vec!["INPI types", &config.inpi.allowed_types.join(", ")]);
    table.add_row(vec!["Qard base URL", &config.qard.base_url]);
    table.add_row(vec!["Qard API key", secret(&config.qard.api_key)]);
    table.add_row(vec![
        "Qard datatypes",
        &config.qard.allowed_datatypes.join(", "),
    ]);
    table.add_row(vec!["Qard pause", &format!("{}ms", config.qard.call_pause_ms)]);
    table.add_row(vec!["SIRENE search URL", &config.sirene.search_url]);
    table.add_row(vec!["SIRENE API key", secret(&config.sirene.api_key)]);
    table.add_row(vec![
        "SIRENE range",
        &format!("{}..={}", config.sirene.range_start, config.sirene.range_end),
    ]);

    eprintln!("\n{table}");
}
