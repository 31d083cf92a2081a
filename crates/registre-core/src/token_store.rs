//! File-backed bearer credential persistence

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::sink::write_atomic;

/// Persists one bearer token in a plain file.
///
/// No expiry is tracked: a token is only known to be stale when a call
/// answers 401.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the stored token through a tmp file and rename. Write errors propagate.
    pub fn save(&self, token: &str) -> io::Result<()> {
        write_atomic(&self.path, token.trim().as_bytes())
    }

    /// Most recently saved token, or `None` if absent or empty
    pub fn load(&self) -> Option<String> {
        let raw = fs::read_to_string(&self.path).ok()?;
        let token = raw.trim();
        (!token.is_empty()).then(|| token.to_string())
    }

    /// Remove the stored token. A missing file is not an error.
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
