use std::fs;
use std::thread;

use crewfs::error::CrewError;
use crewfs::store::lock::{self, LockOptions, lock_path_for};
use tempfile::tempdir;

#[test]
fn threads_serialize_on_a_shared_resource() {
    let dir = tempdir().unwrap();
    let counter = dir.path().join("counter.txt");
    fs::write(&counter, "0").unwrap();

    thread::scope(|s| {
        for _ in 0..5 {
            s.spawn(|| {
                for _ in 0..20 {
                    lock::with_lock(&counter, || {
                        let n: u32 = fs::read_to_string(&counter)?.trim().parse().unwrap();
                        fs::write(&counter, (n + 1).to_string())?;
                        Ok(())
                    })
                    .unwrap();
                }
            });
        }
    });

    assert_eq!(fs::read_to_string(&counter).unwrap(), "100");
    assert!(!lock_path_for(&counter).exists());
}

#[test]
fn held_lock_is_released_by_dropping_guard() {
    let dir = tempdir().unwrap();
    let resource = dir.path().join("res.json");

    let guard = lock::acquire_lock(&resource, &LockOptions::default()).unwrap();
    let contended = lock::with_lock_retries(&resource, 1, || Ok(()));
    assert!(matches!(contended, Err(CrewError::LockAcquisitionFailed(_))));

    drop(guard);
    lock::with_lock_retries(&resource, 1, || Ok(())).unwrap();
}
