//! Qard subcommands - aggregator files, acts listing and user audit

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Subcommand};
use registre_core::{RunOutcome, SharedProgress};

use super::{finish, live_transport, read_sirens, require};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct QardArgs {
    #[command(subcommand)]
    pub command: QardCommand,
}

#[derive(Subcommand, Debug)]
pub enum QardCommand {
    /// Download the allowed files of each SIREN's user
    Download(DownloadArgs),
    /// Sync legal data and append each SIREN's acts to a CSV
    Acts(ActsArgs),
    /// Download the file ids listed in a CSV
    FromCsv(FromCsvArgs),
    /// Audit the users listed in a CSV
    Users(UsersArgs),
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// SIREN list, one per line
    #[arg(short, long)]
    pub sirens: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep every allowed file instead of the first one
    #[arg(long)]
    pub all_files: bool,

    /// Cap on files per user with --all-files
    #[arg(long)]
    pub max_files_per_user: Option<usize>,

    /// Write a per-SIREN CSV report
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ActsArgs {
    /// SIREN list, one per line
    #[arg(short, long)]
    pub sirens: Option<PathBuf>,

    /// Acts CSV to append to
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Do not create a legal user for SIRENs without one
    #[arg(long)]
    pub no_create: bool,
}

#[derive(Args, Debug)]
pub struct FromCsvArgs {
    /// CSV with a file_id column (siren, titles and date optional)
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Replace files already present
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Args, Debug)]
pub struct UsersArgs {
    /// CSV with a user_id column
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Report CSV
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Map the file configuration onto the Qard runtime settings
pub fn runtime_config(config: &Config, output: Option<PathBuf>) -> Result<registre_qard::Config> {
    let section = &config.qard;
    let defaults = registre_qard::Config::default();
    let (metadata_timeout, download_timeout) = config
        .http
        .timeouts(defaults.metadata_timeout, defaults.download_timeout);
    Ok(registre_qard::Config {
        base_url: section.base_url.clone(),
        api_key: require(&section.api_key, "QARD_API_KEY")?,
        allowed_datatypes: section
            .allowed_datatypes
            .iter()
            .map(|d| d.trim().to_uppercase())
            .collect(),
        call_pause: Duration::from_millis(section.call_pause_ms),
        per_page: section.per_page,
        output_dir: output.unwrap_or_else(|| config.output.dir.join("qard")),
        max_files_per_user: section.max_files_per_user,
        create_missing_users: section.create_missing_users,
        metadata_timeout,
        download_timeout,
        retry: config.retry.policy(),
        ..defaults
    })
}

pub fn run(args: QardArgs, config: &Config, progress: &SharedProgress) -> Result<RunOutcome> {
    let section = &config.qard;
    match args.command {
        QardCommand::Download(args) => {
            let mut qard = runtime_config(config, args.output)?;
            qard.all_files = args.all_files;
            if let Some(n) = args.max_files_per_user {
                qard.max_files_per_user = n;
            }
            let sirens = read_sirens(args.sirens, config)?;
            let (transport, sleeper) = live_transport(config)?;
            let mut client = registre_qard::api::build_client(&qard, transport, sleeper);
            let stats = registre_qard::download::run(&mut client, &qard, &sirens, progress)?;
            finish(&stats, args.report.as_deref(), progress)
        }
        QardCommand::Acts(args) => {
            let mut qard = runtime_config(config, None)?;
            if args.no_create {
                qard.create_missing_users = false;
            }
            let sirens = read_sirens(args.sirens, config)?;
            let csv_path = args.csv.unwrap_or_else(|| section.acts_csv.clone());
            let (transport, sleeper) = live_transport(config)?;
            let mut client = registre_qard::api::build_client(&qard, transport, sleeper);
            let stats =
                registre_qard::acts::run(&mut client, &qard, &sirens, &csv_path, progress)?;
            finish(&stats, None, progress)
        }
        QardCommand::FromCsv(args) => {
            let mut qard = runtime_config(config, args.output)?;
            qard.overwrite = args.overwrite;
            let csv_path = args.csv.unwrap_or_else(|| section.acts_csv.clone());
            let (transport, sleeper) = live_transport(config)?;
            let mut client = registre_qard::api::build_client(&qard, transport, sleeper);
            let stats = registre_qard::from_csv::run(&mut client, &qard, &csv_path, progress)?;
            finish(&stats, None, progress)
        }
        QardCommand::Users(args) => {
            let qard = runtime_config(config, None)?;
            let csv_path = args.csv.unwrap_or_else(|| section.acts_csv.clone());
            let report = args.report.unwrap_or_else(|| section.users_report.clone());
            let (transport, sleeper) = live_transport(config)?;
            let mut client = registre_qard::api::build_client(&qard, transport, sleeper);
            let stats =
                registre_qard::users::run(&mut client, &qard, &csv_path, &report, progress)?;
            finish(&stats, None, progress)
        }
    }
}
