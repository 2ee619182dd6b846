//! File-based exclusive locking.
//!
//! Backs the "repository lock mechanism" collaborator interface from spec
//! §6 (`init(home)`, `acquire`, `release`): only one repository instance may
//! hold the lock on a given home directory at a time (spec §4.4 step 1).
//!
//! This module only opens the file and tries the lock once; a caller that
//! wants to wait out contention owns that policy (`FileRepositoryLock` in
//! `repo-kernel` is the one that actually retries).

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("io error locking {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is held by another process")]
    Contended { path: PathBuf },

    #[error("failed to acquire lock on {path} after {retries} attempts")]
    Timeout { path: PathBuf, retries: u32 },
}

/// Guard for a held exclusive file lock. The lock is released when the
/// guard is dropped.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl FileLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_for_locking(path: &Path) -> Result<File, LockError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| LockError::Io {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Try to take the exclusive lock once, without waiting. Returns
/// `Err(LockError::Contended)` if another process already holds it.
pub fn try_lock_once(path: &Path) -> Result<FileLock, LockError> {
    let file = open_for_locking(path)?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(FileLock {
            file,
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::Contended {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(LockError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Acquire an exclusive lock on `path`, polling [`try_lock_once`] with a
/// growing, capped wait between attempts until either the lock is free or
/// `max_retries` polls have come back contended.
pub fn acquire_lock(path: &Path, max_retries: u32) -> Result<FileLock, LockError> {
    use std::time::Duration;

    let mut retries_left = max_retries;
    let mut backoff = Duration::from_millis(40);
    const MAX_BACKOFF: Duration = Duration::from_millis(500);

    loop {
        match try_lock_once(path) {
            Ok(lock) => return Ok(lock),
            Err(LockError::Contended { .. }) => {
                if retries_left == 0 {
                    return Err(LockError::Timeout {
                        path: path.to_path_buf(),
                        retries: max_retries,
                    });
                }
                retries_left -= 1;
                std::thread::sleep(backoff);
                backoff = (backoff + backoff / 2).min(MAX_BACKOFF);
            }
            Err(other) => return Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn acquire_and_release_then_reacquire() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repository.lock");
        {
            let _lock = acquire_lock(&path, 5).unwrap();
        }
        let _lock2 = acquire_lock(&path, 5).unwrap();
    }

    #[test]
    fn try_lock_once_reports_contention_without_waiting() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repository.lock");
        let _held = try_lock_once(&path).unwrap();
        let err = try_lock_once(&path).unwrap_err();
        assert!(matches!(err, LockError::Contended { .. }));
    }

    #[test]
    fn second_instance_must_wait_for_release() {
        let dir = TempDir::new().unwrap();
        let path = Arc::new(dir.path().join("repository.lock"));
        let barrier = Arc::new(Barrier::new(2));

        let path1 = Arc::clone(&path);
        let barrier1 = Arc::clone(&barrier);
        let holder = thread::spawn(move || {
            let _lock = acquire_lock(&path1, 5).unwrap();
            barrier1.wait();
            thread::sleep(Duration::from_millis(100));
        });

        let path2 = Arc::clone(&path);
        let waiter = thread::spawn(move || {
            barrier.wait();
            acquire_lock(&path2, 10).is_ok()
        });

        holder.join().unwrap();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn single_instance_guard_times_out_when_contended() {
        let dir = TempDir::new().unwrap();
        let path = Arc::new(dir.path().join("repository.lock"));
        let path1 = Arc::clone(&path);
        let holder = thread::spawn(move || {
            let _lock = acquire_lock(&path1, 5).unwrap();
            thread::sleep(Duration::from_secs(1));
        });
        thread::sleep(Duration::from_millis(50));

        let result = acquire_lock(&path, 1);
        assert!(matches!(result, Err(LockError::Timeout { .. })));
        holder.join().unwrap();
    }
}
