//! Pages subcommand - score extracted page texts before OCR

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use registre_core::classify::{AuditRow, classify_pages, write_audit};
use registre_core::{ConfigError, RunOutcome};

#[derive(Args, Debug)]
pub struct PagesArgs {
    #[command(subcommand)]
    pub command: PagesCommand,
}

#[derive(Subcommand, Debug)]
pub enum PagesCommand {
    /// Score each page and print the ones worth keeping
    Classify(ClassifyArgs),
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Page texts separated by `===== Page N =====` markers or form feeds
    pub text_file: PathBuf,

    /// Audit CSV (default: <TEXT_FILE stem>_audit.csv next to the input)
    #[arg(long)]
    pub audit: Option<PathBuf>,
}

fn default_audit_path(text_file: &Path) -> PathBuf {
    let stem = text_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pages".to_string());
    text_file.with_file_name(format!("{stem}_audit.csv"))
}

fn summary_table(rows: &[AuditRow]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Page").fg(Color::Cyan),
            Cell::new("Score").fg(Color::Cyan),
            Cell::new("Core").fg(Color::Cyan),
            Cell::new("Keywords").fg(Color::Cyan),
            Cell::new("Decision").fg(Color::Cyan),
        ]);
    for row in rows {
        let decision = if row.decision == "keep" {
            Cell::new(row.decision).fg(Color::Green)
        } else {
            Cell::new(row.decision)
        };
        table.add_row(vec![
            Cell::new(row.page),
            Cell::new(row.score),
            Cell::new(row.core_hits),
            Cell::new(row.kw_hits),
            decision,
        ]);
    }
    table
}

pub fn run(args: PagesArgs) -> Result<RunOutcome> {
    match args.command {
        PagesCommand::Classify(args) => {
            if !args.text_file.exists() {
                return Err(ConfigError::MissingInput(args.text_file).into());
            }
            let content = std::fs::read_to_string(&args.text_file)
                .with_context(|| format!("Failed to read {}", args.text_file.display()))?;
            let rows = classify_pages(&content);
            let audit = args
                .audit
                .unwrap_or_else(|| default_audit_path(&args.text_file));
            write_audit(&audit, &rows)
                .with_context(|| format!("Failed to write audit {}", audit.display()))?;

            let kept: Vec<_> = rows.iter().filter(|r| r.decision == "keep").collect();
            log::info!(
                "{} of {} page(s) kept, audit written to {}",
                kept.len(),
                rows.len(),
                audit.display()
            );
            eprintln!("\n{}", summary_table(&rows));
            // kept page numbers on stdout for piping into the OCR step
            for row in kept {
                println!("{}", row.page);
            }
            Ok(RunOutcome::Completed)
        }
    }
}
