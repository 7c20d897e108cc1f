//! Advisory lock manager scenarios.

use mneme::error::CoreError;
use mneme::lock;
use tempfile::TempDir;

/// A second concurrent `index` invocation must fail with `LockHeld` and
/// must not touch the index directory.
#[test]
fn second_concurrent_acquire_fails_and_leaves_directory_untouched() {
    let data = TempDir::new().unwrap();
    lock::acquire(data.path()).unwrap();

    let before: Vec<_> = std::fs::read_dir(data.path()).unwrap().map(|e| e.unwrap().file_name()).collect();

    let err = lock::acquire(data.path()).unwrap_err();
    assert!(matches!(err, CoreError::LockHeld { .. }));

    let after: Vec<_> = std::fs::read_dir(data.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
    assert_eq!(before, after, "a failed acquire must not mutate the index directory");

    lock::release(data.path()).unwrap();
}

#[test]
fn stale_lock_can_be_reclaimed_and_reacquired() {
    let data = TempDir::new().unwrap();
    lock::acquire(data.path()).unwrap();

    // Backdate the lock file so it reads as stale regardless of pid liveness.
    let info = mneme::lock::LockInfo {
        pid: std::process::id(),
        hostname: "host".to_string(),
        epoch_seconds: 0,
    };
    std::fs::write(
        mneme::paths::lock_file(data.path()),
        serde_json::to_string(&info).unwrap(),
    )
    .unwrap();

    assert!(lock::is_stale(data.path()).unwrap());
    lock::reclaim(data.path()).unwrap();
    lock::acquire(data.path()).unwrap();
    lock::release(data.path()).unwrap();
}

#[test]
fn release_on_a_never_acquired_directory_is_a_no_op() {
    let data = TempDir::new().unwrap();
    lock::release(data.path()).unwrap();
}
