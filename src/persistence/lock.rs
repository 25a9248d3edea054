use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::{IndexError, Result};

/// Exclusive advisory lock marking the single writer of an index location.
///
/// The OS drops the lock when the file handle closes, including on process
/// exit, so a crashed writer never leaves the location wedged.
#[derive(Debug)]
pub struct WriterLock {
    path: PathBuf,
    file: File,
}

impl WriterLock {
    /// Take the lock, retrying contention `retries` times with a fixed backoff.
    pub fn acquire(path: impl AsRef<Path>, retries: u32, backoff: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        let mut attempt = 0;
        loop {
            match file.try_lock() {
                Ok(()) => return Ok(Self { path, file }),
                Err(TryLockError::WouldBlock) if attempt < retries => {
                    attempt += 1;
                    debug!(path = %path.display(), attempt, "writer lock held elsewhere, retrying");
                    std::thread::sleep(backoff);
                }
                Err(TryLockError::WouldBlock) => {
                    return Err(IndexError::StorageBusy(format!(
                        "{} is held by another writer",
                        path.display()
                    )));
                }
                Err(TryLockError::Error(e)) => return Err(IndexError::storage(e)),
            }
        }
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!(path = %self.path.display(), "writer lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_writer_is_busy() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("writer.lock");

        let held = WriterLock::acquire(&path, 0, Duration::ZERO).unwrap();
        let err = WriterLock::acquire(&path, 2, Duration::from_millis(1)).unwrap_err();
        assert!(matches!(err, IndexError::StorageBusy(_)));

        drop(held);
        assert!(WriterLock::acquire(&path, 0, Duration::ZERO).is_ok());
    }

    #[test]
    fn test_retry_picks_up_released_lock() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("writer.lock");

        let held = WriterLock::acquire(&path, 0, Duration::ZERO).unwrap();
        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            drop(held);
        });
        let lock = WriterLock::acquire(&path, 200, Duration::from_millis(5));
        releaser.join().unwrap();
        assert!(lock.is_ok());
    }
}
