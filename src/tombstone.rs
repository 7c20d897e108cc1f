//! Tombstone manager.
//!
//! Atomically moves superseded chunks and the manifest aside into
//! `tombstones/` with a timestamp suffix, reports aggregate size, and
//! permanently deletes on explicit request (`clean`).

use crate::error::CoreError;
use crate::paths;
use std::path::Path;

/// Soft warning threshold, default 100 MiB.
pub const DEFAULT_WARN_THRESHOLD_BYTES: u64 = 100 * 1024 * 1024;

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Move every `N.idx` and the current `manifest.json` into `tombstones/`
/// with a shared timestamp suffix. Idempotent: an empty `segments/`
/// directory is a no-op.
pub fn move_segments_to_tombstones(data_dir: &Path) -> Result<(), CoreError> {
    let segments = paths::segments_dir(data_dir);
    let tombstones = paths::tombstones_dir(data_dir);
    std::fs::create_dir_all(&tombstones).map_err(|e| CoreError::IoFatal(e.to_string()))?;

    let entries = match std::fs::read_dir(&segments) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(CoreError::IoFatal(e.to_string())),
    };

    let suffix = now_unix();
    let mut any = false;
    for entry in entries {
        let entry = entry.map_err(|e| CoreError::IoFatal(e.to_string()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        any = true;
        let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
        let dest = tombstones.join(format!("{file_name}.{suffix}"));
        std::fs::rename(&path, &dest).map_err(|e| CoreError::IoFatal(e.to_string()))?;
    }

    if !any {
        tracing::debug!("no segments to tombstone, nothing moved");
    }
    Ok(())
}

fn dir_size(dir: &Path) -> std::io::Result<u64> {
    let mut total = 0u64;
    if !dir.exists() {
        return Ok(0);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_file() {
            total += metadata.len();
        } else if metadata.is_dir() {
            total += dir_size(&entry.path())?;
        }
    }
    Ok(total)
}

/// Recursive byte sum of everything under `tombstones/`.
pub fn tombstones_size(data_dir: &Path) -> Result<u64, CoreError> {
    dir_size(&paths::tombstones_dir(data_dir)).map_err(|e| CoreError::IoFatal(e.to_string()))
}

/// Permanently delete everything in `tombstones/`. Returns
/// `(bytes_freed, files_deleted)`.
pub fn clear_tombstones(data_dir: &Path) -> Result<(u64, u64), CoreError> {
    let dir = paths::tombstones_dir(data_dir);
    if !dir.exists() {
        return Ok((0, 0));
    }
    let mut bytes_freed = 0u64;
    let mut files_deleted = 0u64;
    for entry in std::fs::read_dir(&dir).map_err(|e| CoreError::IoFatal(e.to_string()))? {
        let entry = entry.map_err(|e| CoreError::IoFatal(e.to_string()))?;
        let path = entry.path();
        let metadata = entry.metadata().map_err(|e| CoreError::IoFatal(e.to_string()))?;
        if metadata.is_file() {
            bytes_freed += metadata.len();
            std::fs::remove_file(&path).map_err(|e| CoreError::IoFatal(e.to_string()))?;
            files_deleted += 1;
        }
    }
    Ok((bytes_freed, files_deleted))
}

/// True if tombstone storage exceeds the warning threshold. Non-fatal by
/// design: the caller logs a warning via `RunContext`'s progress/log sink
/// rather than treating this as an error.
pub fn exceeds_warn_threshold(data_dir: &Path, threshold: u64) -> Result<bool, CoreError> {
    Ok(tombstones_size(data_dir)? > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(tmp: &Path) {
        paths::ensure_data_dirs(tmp).unwrap();
        std::fs::write(paths::segments_dir(tmp).join("001.idx"), b"chunk data").unwrap();
        std::fs::write(paths::manifest_file(tmp), b"{}").unwrap();
    }

    #[test]
    fn moves_chunks_and_manifest_to_tombstones() {
        let tmp = tempfile::TempDir::new().unwrap();
        setup(tmp.path());
        move_segments_to_tombstones(tmp.path()).unwrap();

        let segments_left: Vec<_> = std::fs::read_dir(paths::segments_dir(tmp.path()))
            .unwrap()
            .collect();
        assert!(segments_left.is_empty());

        let tombstoned: Vec<_> = std::fs::read_dir(paths::tombstones_dir(tmp.path()))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(tombstoned.len(), 2);
        assert!(tombstoned.iter().any(|n| n.starts_with("001.idx.")));
        assert!(tombstoned.iter().any(|n| n.starts_with("manifest.json.")));
    }

    #[test]
    fn empty_segments_dir_is_a_no_op() {
        let tmp = tempfile::TempDir::new().unwrap();
        paths::ensure_data_dirs(tmp.path()).unwrap();
        move_segments_to_tombstones(tmp.path()).unwrap();
        assert_eq!(tombstones_size(tmp.path()).unwrap(), 0);
    }

    #[test]
    fn clear_tombstones_reports_bytes_and_count() {
        let tmp = tempfile::TempDir::new().unwrap();
        setup(tmp.path());
        move_segments_to_tombstones(tmp.path()).unwrap();

        let (bytes, count) = clear_tombstones(tmp.path()).unwrap();
        assert_eq!(count, 2);
        assert!(bytes > 0);
        assert_eq!(tombstones_size(tmp.path()).unwrap(), 0);
    }

    #[test]
    fn warn_threshold_trips_when_exceeded() {
        let tmp = tempfile::TempDir::new().unwrap();
        setup(tmp.path());
        move_segments_to_tombstones(tmp.path()).unwrap();
        assert!(exceeds_warn_threshold(tmp.path(), 1).unwrap());
        assert!(!exceeds_warn_threshold(tmp.path(), DEFAULT_WARN_THRESHOLD_BYTES).unwrap());
    }
}
