//! SIRENE subcommand - sample valid identifiers that exist and are diffusible

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use registre_core::{RunOutcome, SharedProgress};

use super::{finish, live_transport, require};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct SireneArgs {
    #[command(subcommand)]
    pub command: SireneCommand,
}

#[derive(Subcommand, Debug)]
pub enum SireneCommand {
    /// Draw Luhn-valid SIRENs and keep those the search API reports
    Sample(SampleArgs),
}

#[derive(Args, Debug)]
pub struct SampleArgs {
    /// Number of candidates to draw
    #[arg(short = 'k', long)]
    pub size: Option<usize>,

    /// Lower bound of the SIREN range
    #[arg(long)]
    pub start: Option<u32>,

    /// Upper bound of the SIREN range (inclusive)
    #[arg(long)]
    pub end: Option<u32>,

    /// Output file, one SIREN per line
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Seed for a reproducible draw
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Map the file configuration and flags onto the sampling settings
pub fn runtime_config(config: &Config, args: &SampleArgs) -> Result<registre_sirene::Config> {
    let section = &config.sirene;
    Ok(registre_sirene::Config {
        search_url: section.search_url.clone(),
        api_key: require(&section.api_key, "INSEE_API_KEY")?,
        sample_size: args.size.unwrap_or(section.sample_size),
        range_start: args.start.unwrap_or(section.range_start),
        range_end: args.end.unwrap_or(section.range_end),
        batch_size: section.batch_size,
        pause_between_batches: Duration::from_millis(section.pause_between_batches_ms),
        output: args
            .output
            .clone()
            .unwrap_or_else(|| config.output.sirens_file.clone()),
        seed: args.seed,
        ..Default::default()
    })
}

pub fn run(args: SireneArgs, config: &Config, progress: &SharedProgress) -> Result<RunOutcome> {
    match args.command {
        SireneCommand::Sample(args) => {
            let sirene = runtime_config(config, &args)?;
            let mut rng = match sirene.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let (transport, sleeper) = live_transport(config)?;
            let mut client = registre_sirene::api::build_client(&sirene, transport, sleeper);
            let stats = registre_sirene::runner::run(&mut client, &sirene, &mut rng, progress)?;
            finish(&stats, None, progress)
        }
    }
}
