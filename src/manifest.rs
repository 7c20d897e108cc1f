//! Manifest & platform record.
//!
//! A single JSON record living alongside the chunks, rewritten atomically
//! (write-temp + rename) on every flush — the same discipline as
//! `config.rs` and `codec.rs`.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    InProgress,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub id: u32,
    pub filename: String,
    pub status: ChunkStatus,
    pub doc_count: u32,
    pub token_count: u64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub created_at: i64,
    pub updated_at: i64,
    pub total_docs: u64,
    pub total_tokens: u64,
    pub avg_doc_length: f64,
    pub platform: String,
    #[serde(default)]
    pub chunks: Vec<ChunkInfo>,
}

/// Map `std::env::consts::OS` to the manifest's platform vocabulary
/// (`linux`, `darwin`, `windows`), at manifest-creation time only.
pub fn current_platform() -> String {
    match std::env::consts::OS {
        "macos" => "darwin".to_string(),
        other => other.to_string(),
    }
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl Manifest {
    pub fn new_empty() -> Self {
        let now = now_unix();
        Self {
            version: MANIFEST_VERSION,
            created_at: now,
            updated_at: now,
            total_docs: 0,
            total_tokens: 0,
            avg_doc_length: 0.0,
            platform: current_platform(),
            chunks: Vec::new(),
        }
    }

    /// Recompute `total_docs`/`total_tokens`/`avg_doc_length` from the
    /// `complete` chunks only; `in_progress` chunks never contribute.
    pub fn recompute_aggregates(&mut self) {
        let (docs, tokens) = self
            .chunks
            .iter()
            .filter(|c| c.status == ChunkStatus::Complete)
            .fold((0u64, 0u64), |(d, t), c| (d + c.doc_count as u64, t + c.token_count));
        self.total_docs = docs;
        self.total_tokens = tokens;
        self.avg_doc_length = if docs > 0 { tokens as f64 / docs as f64 } else { 0.0 };
        self.updated_at = now_unix();
    }

    pub fn complete_chunks(&self) -> impl Iterator<Item = &ChunkInfo> {
        self.chunks.iter().filter(|c| c.status == ChunkStatus::Complete)
    }

    /// If the current platform differs from the one the manifest was
    /// created on, surface a non-fatal warning to the caller.
    pub fn check_platform(&self) -> Option<CoreError> {
        let running_on = current_platform();
        if running_on != self.platform {
            Some(CoreError::PlatformMismatch {
                built_on: self.platform.clone(),
                running_on,
            })
        } else {
            None
        }
    }
}

/// Load the manifest at `path`, or a fresh empty manifest if the file does
/// not yet exist (first `index` run after `init`).
pub fn load_manifest(path: &Path) -> Result<Manifest, CoreError> {
    if !path.exists() {
        return Ok(Manifest::new_empty());
    }
    let text = std::fs::read_to_string(path).map_err(|e| CoreError::IoFatal(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| CoreError::ConfigParse(format!("manifest: {e}")))
}

/// Persist the manifest via write-temp-then-rename.
pub fn save_manifest(path: &Path, manifest: &Manifest) -> Result<(), CoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| CoreError::IoFatal(e.to_string()))?;
    let json = serde_json::to_string_pretty(manifest).map_err(|e| CoreError::IoFatal(e.to_string()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| CoreError::IoFatal(e.to_string()))?;
    tmp.write_all(json.as_bytes()).map_err(|e| CoreError::IoFatal(e.to_string()))?;
    tmp.as_file().sync_all().map_err(|e| CoreError::IoFatal(e.to_string()))?;
    tmp.persist(path).map_err(|e| CoreError::IoFatal(e.error.to_string()))?;
    Ok(())
}

/// Drop any chunk whose status is still `in_progress` — crash debris from
/// an interrupted flush. Returns the ids removed.
pub fn prune_in_progress(manifest: &mut Manifest) -> Vec<u32> {
    let (keep, drop): (Vec<_>, Vec<_>) = manifest
        .chunks
        .drain(..)
        .partition(|c| c.status == ChunkStatus::Complete);
    manifest.chunks = keep;
    let dropped_ids = drop.iter().map(|c| c.id).collect();
    manifest.recompute_aggregates();
    dropped_ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_manifest_yields_empty_default() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("manifest.json");
        let manifest = load_manifest(&path).unwrap();
        assert_eq!(manifest.total_docs, 0);
        assert!(manifest.chunks.is_empty());
    }

    #[test]
    fn round_trips_through_json() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("manifest.json");
        let mut manifest = Manifest::new_empty();
        manifest.chunks.push(ChunkInfo {
            id: 1,
            filename: "001.idx".to_string(),
            status: ChunkStatus::Complete,
            doc_count: 100,
            token_count: 5000,
            created_at: 123,
        });
        manifest.recompute_aggregates();
        save_manifest(&path, &manifest).unwrap();

        let loaded = load_manifest(&path).unwrap();
        assert_eq!(loaded.total_docs, 100);
        assert_eq!(loaded.total_tokens, 5000);
        assert_eq!(loaded.chunks.len(), 1);
    }

    #[test]
    fn in_progress_chunks_are_excluded_from_aggregates() {
        let mut manifest = Manifest::new_empty();
        manifest.chunks.push(ChunkInfo {
            id: 1,
            filename: "001.idx".to_string(),
            status: ChunkStatus::Complete,
            doc_count: 10,
            token_count: 100,
            created_at: 1,
        });
        manifest.chunks.push(ChunkInfo {
            id: 2,
            filename: "002.idx".to_string(),
            status: ChunkStatus::InProgress,
            doc_count: 5,
            token_count: 50,
            created_at: 2,
        });
        manifest.recompute_aggregates();
        assert_eq!(manifest.total_docs, 10);
        assert_eq!(manifest.total_tokens, 100);
    }

    #[test]
    fn prune_in_progress_removes_crash_debris() {
        let mut manifest = Manifest::new_empty();
        manifest.chunks.push(ChunkInfo {
            id: 1,
            filename: "001.idx".to_string(),
            status: ChunkStatus::Complete,
            doc_count: 10,
            token_count: 100,
            created_at: 1,
        });
        manifest.chunks.push(ChunkInfo {
            id: 2,
            filename: "002.idx".to_string(),
            status: ChunkStatus::InProgress,
            doc_count: 3,
            token_count: 9,
            created_at: 2,
        });
        let dropped = prune_in_progress(&mut manifest);
        assert_eq!(dropped, vec![2]);
        assert_eq!(manifest.chunks.len(), 1);
    }

    #[test]
    fn platform_mismatch_is_detected() {
        let mut manifest = Manifest::new_empty();
        manifest.platform = "some-other-os".to_string();
        assert!(manifest.check_platform().is_some());
        manifest.platform = current_platform();
        assert!(manifest.check_platform().is_none());
    }
}
