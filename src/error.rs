//! Typed error kinds for the core engine.
//!
//! Per-file and per-chunk errors are logged and contained by their callers;
//! only whole-operation errors are expected to propagate all the way to the
//! CLI boundary, where [`CoreError::exit_code`] maps them to a process exit
//! status.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("mneme is not initialized at {0}")]
    NotInitialized(PathBuf),

    #[error("index is locked by another process (pid {pid} on {hostname})")]
    LockHeld { pid: u32, hostname: String },

    #[error("lock at {0} is stale")]
    LockStale(PathBuf),

    #[error("chunk {0} is corrupt: {1}")]
    CorruptChunk(u32, String),

    #[error("could not read {0}: {1}")]
    UnreadableFile(PathBuf, String),

    #[error("invalid configuration: {0}")]
    ConfigParse(String),

    #[error("index was built on {built_on}, running on {running_on}")]
    PlatformMismatch { built_on: String, running_on: String },

    #[error("fatal I/O error: {0}")]
    IoFatal(String),
}

impl CoreError {
    /// Exit code the CLI boundary should use when this error reaches `main`.
    ///
    /// `CorruptChunk` and `PlatformMismatch` are warnings by design and are
    /// expected to be caught and logged by callers before they ever reach
    /// here; if one does reach `main` it is still non-fatal (exit 0).
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::NotInitialized(_) => 1,
            CoreError::LockHeld { .. } => 1,
            CoreError::LockStale(_) => 1,
            CoreError::ConfigParse(_) => 1,
            CoreError::IoFatal(_) => 1,
            CoreError::UnreadableFile(_, _) => 1,
            CoreError::CorruptChunk(_, _) => 0,
            CoreError::PlatformMismatch { .. } => 0,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
