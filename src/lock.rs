//! Advisory lock manager.
//!
//! Process-scoped, advisory. `acquire` creates the lock file with
//! `O_CREAT|O_EXCL` so two concurrent acquirers race safely at the
//! filesystem level; the CLI policy (acquire, then on failure check
//! staleness, reclaim-and-retry or fail) lives in `cli.rs`.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::Path;

/// Staleness horizon. Not exposed in TOML configuration.
const STALE_THRESHOLD_SECS: i64 = 2 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    pub hostname: String,
    pub epoch_seconds: i64,
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn hostname() -> String {
    hostname_from_env().unwrap_or_else(|| "unknown-host".to_string())
}

fn hostname_from_env() -> Option<String> {
    std::env::var("HOSTNAME").ok().or_else(|| {
        std::fs::read_to_string("/etc/hostname").ok().map(|s| s.trim().to_string())
    })
}

/// Create `dir/LOCK` with `O_CREAT|O_EXCL`. Fails with `LockHeld` if a lock
/// already exists and the process holding it appears live.
pub fn acquire(dir: &Path) -> Result<(), CoreError> {
    let path = crate::paths::lock_file(dir);
    let info = LockInfo {
        pid: std::process::id(),
        hostname: hostname(),
        epoch_seconds: now_unix(),
    };
    let json = serde_json::to_string(&info).unwrap_or_default();

    match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(mut file) => {
            file.write_all(json.as_bytes()).map_err(|e| CoreError::IoFatal(e.to_string()))?;
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            let existing = read_lock(&path)?;
            Err(CoreError::LockHeld { pid: existing.pid, hostname: existing.hostname })
        }
        Err(e) => Err(CoreError::IoFatal(e.to_string())),
    }
}

pub fn release(dir: &Path) -> Result<(), CoreError> {
    let path = crate::paths::lock_file(dir);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CoreError::IoFatal(e.to_string())),
    }
}

fn read_lock(path: &Path) -> Result<LockInfo, CoreError> {
    let mut contents = String::new();
    std::fs::File::open(path)
        .and_then(|mut f| f.read_to_string(&mut contents))
        .map_err(|e| CoreError::IoFatal(e.to_string()))?;
    serde_json::from_str(&contents).map_err(|e| CoreError::ConfigParse(format!("lock file: {e}")))
}

/// True if the recorded owner no longer looks alive, or the lock has
/// exceeded the staleness horizon.
pub fn is_stale(dir: &Path) -> Result<bool, CoreError> {
    let path = crate::paths::lock_file(dir);
    if !path.exists() {
        return Ok(false);
    }
    let info = read_lock(&path)?;
    let age = now_unix() - info.epoch_seconds;
    if age > STALE_THRESHOLD_SECS {
        return Ok(true);
    }
    Ok(!pid_is_alive(info.pid))
}

/// Liveness check via `/proc/<pid>` on Linux. Non-Linux platforms cannot
/// cheaply answer this without an extra dependency, so they conservatively
/// assume "possibly live" and defer entirely to the timestamp threshold.
/// Documented limitation; see DESIGN.md.
#[cfg(target_os = "linux")]
fn pid_is_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn pid_is_alive(_pid: u32) -> bool {
    true
}

/// Force-remove a stale lock so the caller can retry `acquire`.
pub fn reclaim(dir: &Path) -> Result<(), CoreError> {
    release(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_release_round_trips() {
        let tmp = tempfile::TempDir::new().unwrap();
        acquire(tmp.path()).unwrap();
        assert!(crate::paths::lock_file(tmp.path()).exists());
        release(tmp.path()).unwrap();
        assert!(!crate::paths::lock_file(tmp.path()).exists());
    }

    #[test]
    fn second_acquire_fails_with_lock_held() {
        let tmp = tempfile::TempDir::new().unwrap();
        acquire(tmp.path()).unwrap();
        let err = acquire(tmp.path()).unwrap_err();
        assert!(matches!(err, CoreError::LockHeld { .. }));
    }

    #[test]
    fn fresh_lock_by_current_process_is_not_stale() {
        let tmp = tempfile::TempDir::new().unwrap();
        acquire(tmp.path()).unwrap();
        assert!(!is_stale(tmp.path()).unwrap());
    }

    #[test]
    fn old_timestamp_is_stale_regardless_of_pid() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = crate::paths::lock_file(tmp.path());
        let info = LockInfo {
            pid: std::process::id(),
            hostname: "host".to_string(),
            epoch_seconds: now_unix() - STALE_THRESHOLD_SECS - 10,
        };
        std::fs::write(&path, serde_json::to_string(&info).unwrap()).unwrap();
        assert!(is_stale(tmp.path()).unwrap());
    }

    #[test]
    fn missing_lock_is_not_stale() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(!is_stale(tmp.path()).unwrap());
    }
}
