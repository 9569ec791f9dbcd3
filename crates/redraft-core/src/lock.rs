//! Advisory write lock for a project.
//!
//! Every mutating `rd` command holds `.redraft/write.lock` for its whole run,
//! so two processes never interleave a fork, an edit and a merge on the same
//! project. The database still guards the one-open-fork rule on its own.

use crate::error::ErrorCode;
use fs2::FileExt;
use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

/// How long commands wait for another writer by default.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const RETRY_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error(
        "{code}: write lock held by another process; gave up after {waited:?} at {shown}",
        code = ErrorCode::LockContention.code(),
        shown = .path.display()
    )]
    Timeout { path: PathBuf, waited: Duration },

    #[error("{code}: {0}", code = ErrorCode::InternalUnexpected.code())]
    Io(#[from] io::Error),
}

impl LockError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::Io(_) => ErrorCode::InternalUnexpected,
        }
    }

    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

/// RAII guard for the exclusive project write lock.
#[derive(Debug)]
pub struct RepoWriteLock {
    file: File,
    path: PathBuf,
}

impl RepoWriteLock {
    /// Acquire the lock, polling until `timeout` elapses.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let parent = path.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "lock path has no parent")
        })?;
        fs::create_dir_all(parent)?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let start = Instant::now();
        while file.try_lock_exclusive().is_err() {
            if start.elapsed() >= timeout {
                tracing::warn!(path = %path.display(), "write lock contention");
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited: start.elapsed(),
                });
            }
            thread::sleep(RETRY_INTERVAL);
        }

        tracing::debug!(path = %path.display(), "write lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Release explicitly. Dropping the guard releases too.
    pub fn release(self) {
        drop(self);
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RepoWriteLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
