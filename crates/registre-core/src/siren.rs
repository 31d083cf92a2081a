//! SIREN input handling

use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// Nine ASCII digits
pub fn is_valid_siren(s: &str) -> bool {
    s.len() == 9 && s.bytes().all(|b| b.is_ascii_digit())
}

/// Strip spaces inside an identifier (`"552 100 554"` -> `"552100554"`)
pub fn clean_siren(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Parse a line-delimited identifier list.
///
/// Blank lines are ignored, malformed lines are logged and dropped.
pub fn parse_sirens(content: &str) -> Vec<String> {
    let mut sirens = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let s = clean_siren(line);
        if s.is_empty() {
            continue;
        }
        if is_valid_siren(&s) {
            sirens.push(s);
        } else {
            log::warn!("Skipping invalid SIREN '{s}' on line {} (must be 9 digits)", lineno + 1);
        }
    }
    sirens
}

/// Load the identifier list. A missing file is a configuration error.
pub fn load_sirens(path: &Path) -> Result<Vec<String>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingInput(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("{}: {e}", path.display())))?;
    let sirens = parse_sirens(&content);
    log::info!("Loaded {} SIREN(s) from {}", sirens.len(), path.display());
    Ok(sirens)
}
