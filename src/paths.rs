//! On-disk layout helpers.
//!
//! ```text
//! config at <user-config>/mneme/mneme.toml
//! data/
//!   LOCK
//!   meta/
//!   segments/
//!     manifest.json
//!     001.idx, 002.idx, ...
//!   tombstones/
//! ```

use std::path::{Path, PathBuf};

/// Directory holding `mneme.toml`.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mneme")
}

pub fn config_file() -> PathBuf {
    config_dir().join("mneme.toml")
}

/// Root of the data directory (`<user-data>/mneme/`).
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mneme")
}

pub fn lock_file(data_dir: &Path) -> PathBuf {
    data_dir.join("LOCK")
}

pub fn meta_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("meta")
}

pub fn segments_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("segments")
}

pub fn manifest_file(data_dir: &Path) -> PathBuf {
    segments_dir(data_dir).join("manifest.json")
}

pub fn tombstones_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("tombstones")
}

pub fn chunk_file(data_dir: &Path, chunk_id: u32) -> PathBuf {
    segments_dir(data_dir).join(format!("{:03}.idx", chunk_id))
}

/// Expand a leading `~` the way a POSIX shell would, using `HOME`.
pub fn expand_tilde(input: &str) -> PathBuf {
    if let Some(rest) = input.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if input == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(input)
}

/// Ensure the full data directory tree exists (used by `init` and defensively
/// by `index` in case a prior `init` was interrupted).
pub fn ensure_data_dirs(data_dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(meta_dir(data_dir))?;
    std::fs::create_dir_all(segments_dir(data_dir))?;
    std::fs::create_dir_all(tombstones_dir(data_dir))?;
    Ok(())
}
