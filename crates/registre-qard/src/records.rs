//! CSV inputs and outputs: acts listing, file-id lists, user reports

use std::fs::{self, OpenOptions};
use std::path::Path;

use registre_core::ConfigError;
use serde::Serialize;

pub const ACT_FIELDS: [&str; 5] = ["siren", "user_id", "file_id", "titles", "date"];

/// One row of the acts listing
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActRow {
    pub siren: String,
    pub user_id: String,
    pub file_id: String,
    /// Titles joined with `"; "`
    pub titles: String,
    pub date: String,
}

/// Append rows to the acts CSV, writing the header only when the file is new.
///
/// Called with no rows it just makes sure the file and header exist.
pub fn append_act_rows(path: &Path, rows: &[ActRow]) -> csv::Result<()> {
    let fresh = fs::metadata(path).map_or(true, |m| m.len() == 0);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if fresh {
        writer.write_record(ACT_FIELDS)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// One row of a file-id list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRow {
    pub file_id: String,
    pub siren: String,
    pub titles: String,
    pub date: String,
}

struct Columns {
    file_id: usize,
    siren: Option<usize>,
    titles: Option<usize>,
    date: Option<usize>,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Option<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        Some(Self {
            file_id: find("file_id").or_else(|| find("fileid"))?,
            siren: find("siren"),
            titles: find("titles"),
            date: find("date"),
        })
    }
}

fn field(record: &csv::StringRecord, idx: Option<usize>) -> String {
    idx.and_then(|i| record.get(i))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn read_file_rows(content: &str, delimiter: u8) -> Option<Vec<FileRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());
    let columns = Columns::locate(reader.headers().ok()?)?;
    let mut rows = Vec::new();
    for (n, record) in reader.records().enumerate() {
        match record {
            Ok(record) => rows.push(FileRow {
                file_id: field(&record, Some(columns.file_id)),
                siren: field(&record, columns.siren),
                titles: field(&record, columns.titles),
                date: field(&record, columns.date),
            }),
            Err(e) => log::warn!("Skipping malformed CSV line {}: {e}", n + 2),
        }
    }
    Some(rows)
}

/// Load a file-id list: `;`-delimited first, `,` otherwise.
///
/// Requires a `file_id` (or `fileid`) column; `siren`, `titles` and `date`
/// are optional and only used for naming.
pub fn load_file_rows(path: &Path) -> Result<Vec<FileRow>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingInput(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("{}: {e}", path.display())))?;
    let rows = read_file_rows(&content, b';')
        .or_else(|| read_file_rows(&content, b','))
        .ok_or_else(|| {
            ConfigError::Invalid(format!("{}: no 'file_id' column", path.display()))
        })?;
    log::info!("Loaded {} row(s) from {}", rows.len(), path.display());
    Ok(rows)
}

/// User ids from a CSV with a `user_id` (or `id`) column, delimiter sniffed from the header
pub fn load_user_ids(path: &Path) -> Result<Vec<String>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingInput(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("{}: {e}", path.display())))?;
    let header = content.lines().next().unwrap_or_default();
    let delimiter = if header.contains(';') { b';' } else { b',' };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| ConfigError::Invalid(format!("{}: {e}", path.display())))?;
    let find = |name: &str| headers.iter().position(|h| h.trim() == name);
    let Some(column) = find("user_id").or_else(|| find("id")) else {
        return Err(ConfigError::Invalid(format!(
            "{}: no 'user_id' column",
            path.display()
        )));
    };
    let ids = reader
        .records()
        .filter_map(Result::ok)
        .filter_map(|r| r.get(column).map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
        .collect();
    Ok(ids)
}

/// One row of the user activity report
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct UserReportRow {
    pub user_id: String,
    pub exists: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub siren: String,
    pub active: bool,
    /// `provider:STATUS` pairs joined with `"; "`
    pub connections: String,
}

pub fn write_user_report(path: &Path, rows: &[UserReportRow]) -> csv::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
