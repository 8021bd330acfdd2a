//! Exclusive repository lock.
//!
//! The lock file at `<repo>/repo.lock` is held with `flock(LOCK_EX | LOCK_NB)`
//! for as long as the [`RepoLock`] is alive. A process-wide registry of held
//! roots backs this up, so two daemons in the same process conflict even
//! where `flock` would not.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};
use thiserror::Error;

/// Name of the lock file inside a repository.
pub const LOCK_FILE: &str = "repo.lock";

/// Errors raised while acquiring or releasing a repository lock.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("repository {} is locked by another daemon", path.display())]
    Held { path: PathBuf },

    #[error("lock on {} was already released", path.display())]
    AlreadyReleased { path: PathBuf },

    #[error("lock I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

fn held_roots() -> &'static Mutex<HashSet<PathBuf>> {
    static HELD: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    HELD.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Single-owner handle on a repository directory.
///
/// Release happens at most once: an explicit [`RepoLock::release`] after the
/// lock is gone returns [`LockError::AlreadyReleased`]. A lock still held
/// when dropped is released then.
#[derive(Debug)]
pub struct RepoLock {
    root: PathBuf,
    file: Option<File>,
}

impl RepoLock {
    /// Acquire the lock for the repository at `root` without blocking.
    pub fn acquire(root: &Path) -> Result<Self, LockError> {
        let root = root
            .canonicalize()
            .map_err(|e| LockError::io(format!("resolving {}", root.display()), e))?;

        {
            let mut held = held_roots().lock().unwrap_or_else(PoisonError::into_inner);
            if !held.insert(root.clone()) {
                return Err(LockError::Held { path: root });
            }
        }

        match Self::lock_file(&root) {
            Ok(file) => {
                tracing::debug!(path = %root.display(), "Repository lock acquired");
                Ok(Self {
                    root,
                    file: Some(file),
                })
            }
            Err(e) => {
                forget_root(&root);
                Err(e)
            }
        }
    }

    fn lock_file(root: &Path) -> Result<File, LockError> {
        let lock_path = root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| LockError::io(format!("opening {}", lock_path.display()), e))?;

        match try_flock_exclusive(&file) {
            Ok(true) => Ok(file),
            Ok(false) => Err(LockError::Held {
                path: root.to_path_buf(),
            }),
            Err(e) => Err(LockError::io(format!("locking {}", lock_path.display()), e)),
        }
    }

    /// Whether another holder currently owns the repository at `root`.
    pub fn is_locked(root: &Path) -> Result<bool, LockError> {
        match Self::acquire(root) {
            Ok(mut lock) => {
                lock.release()?;
                Ok(false)
            }
            Err(LockError::Held { .. }) => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// The canonical repository root this lock guards.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the lock is still held.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Release the lock.
    pub fn release(&mut self) -> Result<(), LockError> {
        let file = self.file.take().ok_or_else(|| LockError::AlreadyReleased {
            path: self.root.clone(),
        })?;

        // closing the descriptor drops the flock
        drop(file);
        forget_root(&self.root);

        tracing::debug!(path = %self.root.display(), "Repository lock released");
        Ok(())
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if self.is_held() {
            tracing::warn!(path = %self.root.display(), "Repository lock released on drop");
            let _ = self.release();
        }
    }
}

fn forget_root(root: &Path) {
    held_roots()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(root);
}

/// Try to acquire an exclusive flock on a file (non-blocking).
///
/// Returns `Ok(true)` if the lock was acquired, `Ok(false)` if the file is
/// already locked elsewhere.
fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        let fd = file.as_raw_fd();
        // SAFETY: fd is a valid descriptor owned by `file` for the whole call.
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK)
        {
            return Ok(false);
        }
        Err(err)
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poisoned_registry_does_not_stop_locking() {
        let _ = std::thread::spawn(|| {
            let _held = held_roots().lock().unwrap();
            panic!("registry holder died");
        })
        .join();
        assert!(held_roots().is_poisoned());

        let dir = tempfile::tempdir().unwrap();
        let mut lock = RepoLock::acquire(dir.path()).unwrap();
        assert!(matches!(
            RepoLock::acquire(dir.path()),
            Err(LockError::Held { .. })
        ));
        lock.release().unwrap();
        RepoLock::acquire(dir.path()).unwrap().release().unwrap();
    }

    #[test]
    fn second_acquire_fails_until_release() {
        let dir = tempfile::tempdir().unwrap();

        let mut first = RepoLock::acquire(dir.path()).unwrap();
        assert!(first.is_held());
        assert!(matches!(
            RepoLock::acquire(dir.path()),
            Err(LockError::Held { .. })
        ));
        assert!(RepoLock::is_locked(dir.path()).unwrap());

        first.release().unwrap();
        assert!(!RepoLock::is_locked(dir.path()).unwrap());

        let mut second = RepoLock::acquire(dir.path()).unwrap();
        second.release().unwrap();
    }

    #[test]
    fn double_release_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let mut lock = RepoLock::acquire(dir.path()).unwrap();

        lock.release().unwrap();
        assert!(!lock.is_held());
        assert!(matches!(
            lock.release(),
            Err(LockError::AlreadyReleased { .. })
        ));
    }

    #[test]
    fn drop_releases() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _lock = RepoLock::acquire(dir.path()).unwrap();
            assert!(RepoLock::is_locked(dir.path()).unwrap());
        }
        assert!(!RepoLock::is_locked(dir.path()).unwrap());
    }

    #[test]
    fn missing_root_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = RepoLock::acquire(&dir.path().join("absent"));
        assert!(matches!(result, Err(LockError::Io { .. })));
    }
}
