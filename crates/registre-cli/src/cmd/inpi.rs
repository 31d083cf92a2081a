//! INPI subcommands - acte downloads from the national registry

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Subcommand};
use registre_core::{ConfigError, RunOutcome, SharedProgress, is_valid_siren};

use super::{finish, live_transport, read_sirens, require};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct InpiArgs {
    #[command(subcommand)]
    pub command: InpiCommand,
}

#[derive(Subcommand, Debug)]
pub enum InpiCommand {
    /// Download the retained actes of each SIREN as PDF files
    Download(DownloadArgs),
    /// Write one JSON pack (base64 documents) per SIREN
    Pack(PackArgs),
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// SIREN list, one per line
    #[arg(short, long)]
    pub sirens: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Skip the token check against the first SIREN
    #[arg(long)]
    pub no_probe: bool,

    /// Write a per-SIREN CSV report
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PackArgs {
    /// SIREN list, one per line
    #[arg(short, long, conflicts_with = "siren")]
    pub sirens: Option<PathBuf>,

    /// Single SIREN
    #[arg(long)]
    pub siren: Option<String>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Map the file configuration onto the INPI runtime settings
pub fn runtime_config(config: &Config, output: Option<PathBuf>) -> Result<registre_inpi::Config> {
    let section = &config.inpi;
    let defaults = registre_inpi::Config::default();
    let (metadata_timeout, download_timeout) = config
        .http
        .timeouts(defaults.metadata_timeout, defaults.download_timeout);
    Ok(registre_inpi::Config {
        base_url: section.base_url.clone(),
        username: require(&section.username, "INPI_USERNAME")?,
        password: require(&section.password, "INPI_PASSWORD")?,
        token_file: section.token_file.clone(),
        allowed_types: section.allowed_types.clone(),
        metadata_rpm: section.metadata_rpm,
        download_rpm: section.download_rpm,
        pause_between_sirens: Duration::from_millis(section.pause_between_sirens_ms),
        pause_after_download: Duration::from_millis(section.pause_after_download_ms),
        metadata_timeout,
        download_timeout,
        output_dir: output.unwrap_or_else(|| config.output.dir.join("inpi")),
        probe: defaults.probe,
        retry: config.retry.policy(),
    })
}

pub fn run(args: InpiArgs, config: &Config, progress: &SharedProgress) -> Result<RunOutcome> {
    match args.command {
        InpiCommand::Download(args) => {
            let mut inpi = runtime_config(config, args.output)?;
            inpi.probe = !args.no_probe;
            let sirens = read_sirens(args.sirens, config)?;
            let (transport, sleeper) = live_transport(config)?;
            let mut client = registre_inpi::api::build_client(&inpi, transport, sleeper);
            let stats = registre_inpi::runner::run(&mut client, &inpi, &sirens, progress)?;
            finish(&stats, args.report.as_deref(), progress)
        }
        InpiCommand::Pack(args) => {
            let inpi = runtime_config(config, args.output)?;
            let sirens = match args.siren {
                Some(siren) => {
                    let siren: String = siren.chars().filter(|c| !c.is_whitespace()).collect();
                    if !is_valid_siren(&siren) {
                        return Err(
                            ConfigError::Invalid(format!("'{siren}' is not a 9-digit SIREN")).into(),
                        );
                    }
                    vec![siren]
                }
                None => read_sirens(args.sirens, config)?,
            };
            let (transport, sleeper) = live_transport(config)?;
            let mut client = registre_inpi::api::build_client(&inpi, transport, sleeper);
            let stats = registre_inpi::pack::run(&mut client, &inpi, &sirens, progress)?;
            finish(&stats, None, progress)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_config_needs_credentials() {
        let mut config = Config::default();
        config.inpi.username = None;
        config.inpi.password = Some("secret".into());
        let err = runtime_config(&config, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingCredential("INPI_USERNAME"))
        ));
    }

    #[test]
    fn runtime_config_maps_sections() {
        let mut config = Config::default();
        config.inpi.username = Some("alice".into());
        config.inpi.password = Some("secret".into());
        config.inpi.download_rpm = 10;
        config.inpi.pause_after_download_ms = 0;
        config.output.dir = PathBuf::from("/data");

        let inpi = runtime_config(&config, None).unwrap();
        assert_eq!(inpi.download_rpm, 10);
        assert_eq!(inpi.pause_after_download, Duration::ZERO);
        assert_eq!(inpi.output_dir, PathBuf::from("/data/inpi"));
        assert!(inpi.probe);

        let inpi = runtime_config(&config, Some(PathBuf::from("out"))).unwrap();
        assert_eq!(inpi.output_dir, PathBuf::from("out"));
    }
}
