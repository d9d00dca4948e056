//! Advisory, timeout-bounded file locks.
//!
//! The lock is an exclusive `flock`-style lock (via `fs2`) on a zero-byte
//! lock file. It is cooperative: only code that goes through [`FileLock`]
//! is serialized, and readers never take it.
//!
//! Locks belong to the open file description, so two handles inside one
//! process contend exactly like two processes do.

use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Polling interval used by [`with_lock`].
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// A held advisory lock. The lock is released when the guard is dropped.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquires the lock at `path`, creating the lock file if needed.
    ///
    /// Polls every `retry_interval` until the lock is granted or `timeout`
    /// elapses. A zero timeout makes exactly one attempt.
    ///
    /// # Errors
    ///
    /// - `LockTimeout` if another holder kept the lock past the deadline
    /// - `Io` if the lock file cannot be opened or locking fails outright
    pub fn acquire(
        path: &Path,
        timeout: Duration,
        retry_interval: Duration,
    ) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(lock = %path.display(), "acquired file lock");
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if is_contended(&e) => {
                    let now = Instant::now();
                    if now >= deadline {
                        warn!(lock = %path.display(), ?timeout, "file lock timed out");
                        return Err(StorageError::LockTimeout {
                            path: path.to_path_buf(),
                            timeout,
                        });
                    }
                    thread::sleep(retry_interval.min(deadline - now));
                }
                Err(e) => return Err(StorageError::Io(e)),
            }
        }
    }

    /// Returns the path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Closing the handle releases the lock as well; unlocking first just
        // makes the release immediate.
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(lock = %self.path.display(), error = %e, "failed to release file lock");
        }
    }
}

fn is_contended(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Runs `body` while holding the advisory lock at `lock_path`.
///
/// The lock is released on every exit path, including errors and panics
/// unwinding out of `body`.
///
/// # Errors
///
/// Returns `LockTimeout` (converted into `E`) if the lock is not acquired
/// within `timeout`, otherwise whatever `body` returns.
pub fn with_lock<T, E, F>(lock_path: &Path, timeout: Duration, body: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<StorageError>,
{
    with_lock_polling(lock_path, timeout, DEFAULT_RETRY_INTERVAL, body)
}

/// Like [`with_lock`], with an explicit polling interval.
pub fn with_lock_polling<T, E, F>(
    lock_path: &Path,
    timeout: Duration,
    retry_interval: Duration,
    body: F,
) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<StorageError>,
{
    let _guard = FileLock::acquire(lock_path, timeout, retry_interval)?;
    body()
}
