use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use crate::error::{CrewError, Result};

pub const DEFAULT_MAX_RETRIES: u32 = 50;
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(100);
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30);

/// Tuning for [`acquire_lock`]. The defaults give roughly five seconds of
/// waiting before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    pub max_retries: u32,
    pub backoff: Duration,
    pub stale_after: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }
}

impl LockOptions {
    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }
}

/// Sentinel file guarding `resource`: `<resource>.lock`.
pub fn lock_path_for(resource: &Path) -> PathBuf {
    let mut os = resource.as_os_str().to_os_string();
    os.push(".lock");
    PathBuf::from(os)
}

/// A held lock. The sentinel file is removed when the guard is dropped,
/// including during unwinding.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Already gone is fine: a peer may have reclaimed it as stale.
        let _ = fs::remove_file(&self.path);
    }
}

/// Acquire the advisory lock for `resource`.
///
/// The lock is taken by creating `<resource>.lock` with `create_new`, which
/// fails atomically if the file exists, and writing our pid into it. While
/// the file is held by someone else we sleep `backoff` and try again, up to
/// `max_retries` attempts in total. A lock file whose mtime is older than
/// `stale_after` is presumed abandoned by a crashed holder: it is removed and
/// acquisition is retried at once without spending an attempt.
///
/// Stale reclamation is a liveness aid, not a correctness guarantee. Two
/// waiters can both judge the same file stale; the loser of the race may
/// remove the winner's fresh lock. Holders must keep critical sections well
/// under `stale_after`.
///
/// Locks are not reentrant: acquiring the same resource twice from one
/// process waits on itself until the retry budget runs out.
pub fn acquire_lock(resource: &Path, options: &LockOptions) -> Result<LockGuard> {
    let lock_path = lock_path_for(resource);
    let mut remaining = options.max_retries.max(1);

    loop {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(mut file) => {
                let guard = LockGuard { path: lock_path };
                file.write_all(std::process::id().to_string().as_bytes())?;
                return Ok(guard);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }

        match lock_age(&lock_path) {
            Ok(Some(age)) if age > options.stale_after => {
                if reclaim_stale(&lock_path, age) {
                    continue;
                }
            }
            // Released between our create attempt and the stat.
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            _ => {}
        }

        remaining -= 1;
        if remaining == 0 {
            tracing::warn!(
                resource = %resource.display(),
                retries = options.max_retries,
                "giving up on lock"
            );
            return Err(CrewError::LockAcquisitionFailed(
                resource.display().to_string(),
            ));
        }
        thread::sleep(options.backoff);
    }
}

/// Age of the lock file from its mtime. `None` when the mtime lies in the future.
fn lock_age(lock_path: &Path) -> std::io::Result<Option<Duration>> {
    let modified = fs::metadata(lock_path)?.modified()?;
    Ok(SystemTime::now().duration_since(modified).ok())
}

/// Remove a stale lock file. Returns true when the file is gone afterwards,
/// whether we removed it or a racing peer did.
fn reclaim_stale(lock_path: &Path, age: Duration) -> bool {
    match fs::remove_file(lock_path) {
        Ok(()) => {
            tracing::debug!(
                lock = %lock_path.display(),
                age_ms = age.as_millis() as u64,
                "reclaimed stale lock"
            );
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => true,
        Err(e) => {
            tracing::debug!(lock = %lock_path.display(), error = %e, "stale lock removal failed");
            false
        }
    }
}

/// Run `f` while holding the lock for `resource`, with default options.
pub fn with_lock<T, F>(resource: &Path, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    with_lock_options(resource, &LockOptions::default(), f)
}

/// Run `f` while holding the lock for `resource`, making at most
/// `max_retries` acquisition attempts.
pub fn with_lock_retries<T, F>(resource: &Path, max_retries: u32, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    with_lock_options(resource, &LockOptions::with_retries(max_retries), f)
}

pub fn with_lock_options<T, F>(resource: &Path, options: &LockOptions, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let _guard = acquire_lock(resource, options)?;
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;
    use tempfile::tempdir;

    #[test]
    fn acquire_and_release_lock() {
        let dir = tempdir().unwrap();
        let resource = dir.path().join("config.json");

        let guard = acquire_lock(&resource, &LockOptions::default()).unwrap();
        assert_eq!(guard.path(), dir.path().join("config.json.lock"));
        let holder = fs::read_to_string(guard.path()).unwrap();
        assert_eq!(holder, std::process::id().to_string());

        // Held: a second acquire with one attempt fails.
        assert!(acquire_lock(&resource, &LockOptions::with_retries(1)).is_err());

        drop(guard);
        assert!(!lock_path_for(&resource).exists());
        let _again = acquire_lock(&resource, &LockOptions::with_retries(1)).unwrap();
    }

    #[test]
    fn lock_path_is_a_sibling() {
        let p = lock_path_for(Path::new("/state/tasks/alpha"));
        assert_eq!(p, PathBuf::from("/state/tasks/alpha.lock"));
    }

    #[test]
    fn concurrent_increments_do_not_lose_updates() {
        let dir = tempdir().unwrap();
        let counter = dir.path().join("counter");
        fs::write(&counter, "0").unwrap();

        thread::scope(|s| {
            for _ in 0..5 {
                s.spawn(|| {
                    for _ in 0..20 {
                        with_lock(&counter, || {
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
    fn critical_sections_do_not_overlap() {
        let dir = tempdir().unwrap();
        let resource = dir.path().join("shared");
        let inside = AtomicBool::new(false);

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    with_lock(&resource, || {
                        assert!(!inside.swap(true, Ordering::SeqCst), "overlapping sections");
                        thread::sleep(Duration::from_millis(20));
                        inside.store(false, Ordering::SeqCst);
                        Ok(())
                    })
                    .unwrap();
                });
            }
        });
    }

    #[test]
    fn lock_released_when_critical_section_fails() {
        let dir = tempdir().unwrap();
        let resource = dir.path().join("task.json");

        let result: Result<()> =
            with_lock(&resource, || Err(CrewError::TaskNotFound("1".into())));
        assert!(matches!(result, Err(CrewError::TaskNotFound(_))));
        assert!(!lock_path_for(&resource).exists());

        let start = Instant::now();
        let value = with_lock_retries(&resource, 1, || Ok(7)).unwrap();
        assert_eq!(value, 7);
        assert!(start.elapsed() < DEFAULT_BACKOFF);
    }

    #[test]
    fn lock_released_when_critical_section_panics() {
        let dir = tempdir().unwrap();
        let resource = dir.path().join("task.json");

        let outcome = std::panic::catch_unwind(|| {
            let _: Result<()> = with_lock(&resource, || panic!("boom"));
        });
        assert!(outcome.is_err());
        assert!(!lock_path_for(&resource).exists());
    }

    #[test]
    fn foreign_holder_exhausts_retries_without_running_section() {
        let dir = tempdir().unwrap();
        let resource = dir.path().join("inbox.json");
        fs::write(lock_path_for(&resource), "99999").unwrap();

        let ran = AtomicBool::new(false);
        let start = Instant::now();
        let result = with_lock_retries(&resource, 2, || {
            ran.store(true, Ordering::SeqCst);
            Ok(())
        });

        assert!(matches!(result, Err(CrewError::LockAcquisitionFailed(_))));
        assert!(!ran.load(Ordering::SeqCst));
        assert!(start.elapsed() >= DEFAULT_BACKOFF);
        // A foreign lock is never removed on failure.
        assert!(lock_path_for(&resource).exists());
    }

    #[test]
    fn stale_lock_is_reclaimed() {
        let dir = tempdir().unwrap();
        let resource = dir.path().join("config.json");
        let lock = lock_path_for(&resource);
        let file = File::create(&lock).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(60))
            .unwrap();
        drop(file);

        let start = Instant::now();
        let value = with_lock_retries(&resource, 1, || Ok("ok")).unwrap();
        assert_eq!(value, "ok");
        assert!(start.elapsed() < DEFAULT_BACKOFF);
        assert!(!lock.exists());
    }

    #[test]
    fn fresh_lock_is_not_reclaimed() {
        let dir = tempdir().unwrap();
        let resource = dir.path().join("config.json");
        fs::write(lock_path_for(&resource), "1").unwrap();

        let options = LockOptions {
            max_retries: 2,
            backoff: Duration::from_millis(5),
            stale_after: Duration::from_secs(30),
        };
        let result = with_lock_options(&resource, &options, || Ok(()));
        assert!(matches!(result, Err(CrewError::LockAcquisitionFailed(_))));
    }

    #[test]
    fn missing_parent_directory_is_an_io_error() {
        let dir = tempdir().unwrap();
        let resource = dir.path().join("nope").join("config.json");
        let result = with_lock(&resource, || Ok(()));
        assert!(matches!(result, Err(CrewError::Io(_))));
    }
}
