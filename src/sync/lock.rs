//! Process-wide serialization of operations per repository path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

type LockTable = Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>;

static LOCKS: OnceLock<LockTable> = OnceLock::new();

/// Run `f` while holding the lock for `path`.
///
/// Locks are never removed from the table; there is one per repository
/// path the process has touched. A panic inside `f` poisons nothing that
/// matters here, so poisoned locks are recovered.
pub(crate) fn with_path_lock<T>(path: &Path, f: impl FnOnce() -> T) -> T {
    let lock = lock_for(path);
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
    f()
}

fn lock_for(path: &Path) -> Arc<Mutex<()>> {
    let key = lock_key(path);
    let table = LOCKS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut table = table.lock().unwrap_or_else(PoisonError::into_inner);
    table.entry(key).or_default().clone()
}

/// Absolute form of `path`, without resolving symlinks, so the key does not
/// change when the directory is created between two calls.
fn lock_key(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_same_path_is_serialized() {
        let path = PathBuf::from("/tmp/dashboard-sync-lock-test");
        let active = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                let active = active.clone();
                let overlap = overlap.clone();
                thread::spawn(move || {
                    with_path_lock(&path, || {
                        if active.fetch_add(1, Ordering::SeqCst) > 0 {
                            overlap.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_millis(10));
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(overlap.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_lock_survives_panic() {
        let path = PathBuf::from("/tmp/dashboard-sync-lock-panic");
        let result = std::panic::catch_unwind(|| with_path_lock(&path, || panic!("boom")));
        assert!(result.is_err());
        assert_eq!(with_path_lock(&path, || 7), 7);
    }

    #[test]
    fn test_relative_key_is_absolute() {
        assert!(lock_key(Path::new("dashboards")).is_absolute());
    }
}
