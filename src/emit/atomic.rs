//! Crash-safe file replacement.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tempfile::NamedTempFile;

use crate::error::{Result, TriageError};

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Replace `path` with `bytes`: temp file in the same directory, fsync, rename.
///
/// Readers see either the old content or the new content, never a mix.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    commit(stage(path, bytes)?, path)
}

/// Write `bytes` to a temp file next to `path` and fsync it, without
/// touching `path` yet.
pub fn stage(path: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

/// Rename a staged temp file over `path`, then fsync the directory so the
/// rename itself is durable.
pub fn commit(staged: NamedTempFile, path: &Path) -> Result<()> {
    staged.persist(path).map_err(|e| TriageError::Io(e.error))?;
    sync_dir(parent_dir(path))
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    std::fs::File::open(dir)?.sync_all()?;
    Ok(())
}

// Directory handles cannot be fsynced on this platform.
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Copy the current content of `path` to `<backup_dir>/<stem>_<timestamp>.<ext>`.
///
/// Returns `None` when there is nothing to back up. Never overwrites an
/// existing backup; a numeric suffix is added instead.
pub fn rotate_backup(path: &Path, backup_dir: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    std::fs::create_dir_all(backup_dir)?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("store");
    let ext = path.extension().and_then(|s| s.to_str());
    let ts = Local::now().format("%Y%m%d_%H%M%S").to_string();

    let name_for = |n: u32| {
        let base = if n == 0 {
            format!("{}_{}", stem, ts)
        } else {
            format!("{}_{}_{}", stem, ts, n)
        };
        match ext {
            Some(ext) => format!("{}.{}", base, ext),
            None => base,
        }
    };

    let mut n = 0;
    let mut backup = backup_dir.join(name_for(n));
    while backup.exists() {
        n += 1;
        backup = backup_dir.join(name_for(n));
    }

    std::fs::copy(path, &backup)?;
    log::info!("Backed up {} to {}", path.display(), backup.display());
    Ok(Some(backup))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_and_replaces() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("nested").join("out.json");

        write_atomic(&target, b"first").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"first");

        write_atomic(&target, b"second").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"second");

        let leftovers = std::fs::read_dir(target.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1, "temp file should have been renamed away");
    }

    #[test]
    fn test_staged_write_leaves_target_until_commit() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("out.json");
        std::fs::write(&target, b"old").unwrap();

        let staged = stage(&target, b"new").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"old");
        commit(staged, &target).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn test_commit_syncs_directory_of_bare_file_name() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("store.json");
        let staged = stage(&target, b"[]").unwrap();
        commit(staged, &target).unwrap();
        assert!(sync_dir(parent_dir(Path::new("store.json"))).is_ok());
        assert_eq!(std::fs::read(&target).unwrap(), b"[]");
    }

    #[test]
    fn test_rotate_backup_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let backup = rotate_backup(&temp_dir.path().join("none.json"), temp_dir.path()).unwrap();
        assert!(backup.is_none());
    }

    #[test]
    fn test_rotate_backup_never_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("responses_full.json");
        let backups = temp_dir.path().join("backups");
        std::fs::write(&source, "v1").unwrap();

        let first = rotate_backup(&source, &backups).unwrap().unwrap();
        std::fs::write(&source, "v2").unwrap();
        let second = rotate_backup(&source, &backups).unwrap().unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "v1");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "v2");

        let name = first.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("responses_full_"));
        assert!(name.ends_with(".json"));
    }
}
