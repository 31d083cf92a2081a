//! Run counters and the end-of-run report.
//!
//! Counters accumulate over one batch run and are only persisted through
//! the optional per-identifier CSV report.

use std::path::Path;
use std::time::Duration;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use serde::Serialize;

use crate::progress::fmt_num;

/// How the batch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunOutcome {
    #[default]
    Completed,
    /// Halted by a 429; no call was issued afterwards
    QuotaStopped { retry_after: Option<Duration> },
    /// Halted by SIGINT/SIGTERM between identifiers
    Interrupted,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::QuotaStopped {
                retry_after: Some(d),
            } => write!(f, "stopped: quota exceeded (retry after {}s)", d.as_secs()),
            Self::QuotaStopped { retry_after: None } => write!(f, "stopped: quota exceeded"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Per-identifier report row
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ItemOutcome {
    pub siren: String,
    /// ok | empty | skipped | failed | quota
    pub status: &'static str,
    pub found: usize,
    pub downloaded: usize,
    pub detail: String,
}

#[derive(Debug, Default)]
pub struct RunStats {
    pub title: String,
    pub total: usize,
    pub processed: usize,
    pub found: usize,
    pub downloaded: usize,
    pub errors: usize,
    /// Identifiers skipped (403, listing failure)
    pub skipped: Vec<String>,
    /// Identifiers with nothing matching
    pub missing: Vec<String>,
    pub items: Vec<ItemOutcome>,
    pub outcome: RunOutcome,
    pub elapsed: Duration,
}

impl RunStats {
    pub fn new(title: impl Into<String>, total: usize) -> Self {
        Self {
            title: title.into(),
            total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, item: ItemOutcome) {
        self.processed += 1;
        self.found += item.found;
        self.downloaded += item.downloaded;
        match item.status {
            "skipped" => self.skipped.push(item.siren.clone()),
            "empty" => self.missing.push(item.siren.clone()),
            _ => {}
        }
        self.items.push(item);
    }

    /// Write the per-identifier report as CSV
    pub fn write_report(&self, path: &Path) -> csv::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for item in &self.items {
            writer.serialize(item)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Format summary table as a string.
    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new(&self.title)
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Value").fg(Color::Cyan),
            ]);

        table.add_row(vec![
            Cell::new("SIRENs"),
            Cell::new(format!("{}/{}", fmt_num(self.processed), fmt_num(self.total))),
        ]);
        table.add_row(vec![Cell::new("Documents found"), Cell::new(fmt_num(self.found))]);
        table.add_row(vec![
            Cell::new("Downloaded").fg(Color::Green),
            Cell::new(fmt_num(self.downloaded)).fg(Color::Green),
        ]);
        table.add_row(vec![Cell::new("Errors"), Cell::new(fmt_num(self.errors))]);
        table.add_row(vec![
            Cell::new("Skipped"),
            Cell::new(fmt_num(self.skipped.len())),
        ]);
        table.add_row(vec![
            Cell::new("Without match"),
            Cell::new(fmt_num(self.missing.len())),
        ]);
        let outcome_color = match self.outcome {
            RunOutcome::Completed => Color::Green,
            _ => Color::Red,
        };
        table.add_row(vec![
            Cell::new("Outcome"),
            Cell::new(self.outcome.to_string()).fg(outcome_color),
        ]);
        table.add_row(vec![
            Cell::new("Elapsed"),
            Cell::new(format!("{:.1}s", self.elapsed.as_secs_f64())),
        ]);

        format!("\n{table}")
    }

    /// Log minimal summary (non-TTY mode).
    pub fn log(&self) {
        log::info!(
            "{}: {} downloaded / {} found over {}/{} SIRENs, {} errors ({})",
            self.title,
            fmt_num(self.downloaded),
            fmt_num(self.found),
            self.processed,
            self.total,
            self.errors,
            self.outcome
        );
    }
}
