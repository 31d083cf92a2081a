//! Output files with atomic tmp→rename

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

fn tmp_path(final_path: &Path) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    final_path.with_file_name(name)
}

/// Write `bytes` to `path` through a `.tmp` sibling, then rename.
///
/// A crash never leaves a partial file under the final name.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

/// Remove stale .tmp files in the output directory
pub fn cleanup_tmp_files(output_dir: &Path) -> io::Result<usize> {
    if !output_dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(output_dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "tmp") {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Non-empty regular file already present
pub fn is_complete(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/552100554_1.pdf");
        write_atomic(&path, b"%PDF-1.4").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.4");
        assert!(!tmp_path(&path).exists());
        assert!(is_complete(&path));
    }

    #[test]
    fn overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        write_atomic(&path, b"old").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn cleanup_removes_only_tmp() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.pdf.tmp"), b"x").unwrap();
        fs::write(dir.path().join("b.pdf"), b"x").unwrap();
        assert_eq!(cleanup_tmp_files(dir.path()).unwrap(), 1);
        assert!(dir.path().join("b.pdf").exists());
        assert!(!dir.path().join("a.pdf.tmp").exists());
    }

    #[test]
    fn empty_file_not_complete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pdf");
        fs::write(&path, b"").unwrap();
        assert!(!is_complete(&path));
        assert!(!is_complete(&dir.path().join("missing.pdf")));
    }
}
