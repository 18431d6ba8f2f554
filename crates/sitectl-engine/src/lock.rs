//! Exclusive per-environment advisory lock
//!
//! Build, rollback and promotion for one environment are serialized by an
//! `flock(LOCK_EX)` on `<env>/.lock`. The lock is released when the guard
//! is dropped (closing the descriptor releases it too). Off unix the guard
//! only holds the file open.

use crate::release::fsutil::io_at;
use crate::release::layout::EnvLayout;
use sitectl_core::errors::{Result, SiteError, SiteErrorKind};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct EnvLock {
    file: File,
    path: PathBuf,
}

impl EnvLock {
    /// Block until the environment's lock is held
    pub fn acquire(layout: &EnvLayout) -> Result<Self> {
        let (file, path) = open_lock_file(layout)?;
        platform::lock(&file, true).map_err(|e| lock_error(&path, e))?;
        tracing::debug!(path = %path.display(), "environment lock acquired");
        Ok(Self { file, path })
    }

    /// Take the lock only if nobody else holds it
    pub fn try_acquire(layout: &EnvLayout) -> Result<Option<Self>> {
        let (file, path) = open_lock_file(layout)?;
        match platform::lock(&file, false) {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(platform::LockError::WouldBlock) => Ok(None),
            Err(e) => Err(lock_error(&path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for EnvLock {
    fn drop(&mut self) {
        platform::unlock(&self.file);
    }
}

/// Lock several environments in name order
pub fn acquire_ordered(mut layouts: Vec<EnvLayout>) -> Result<Vec<EnvLock>> {
    layouts.sort_by(|a, b| a.env_dir().cmp(b.env_dir()));
    layouts.dedup();
    layouts.iter().map(EnvLock::acquire).collect()
}

fn open_lock_file(layout: &EnvLayout) -> Result<(File, PathBuf)> {
    let dir = layout.env_dir();
    fs::create_dir_all(dir).map_err(|e| io_at("env_lock", dir, e))?;
    let path = layout.lock_file();
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)
        .map_err(|e| io_at("env_lock", &path, e))?;
    Ok((file, path))
}

fn lock_error(path: &Path, err: platform::LockError) -> SiteError {
    SiteError::new(SiteErrorKind::Concurrency)
        .with_op("env_lock")
        .with_path(path.display().to_string())
        .with_message(format!("failed to lock environment: {}", err))
}

#[cfg(unix)]
mod platform {
    use nix::errno::Errno;
    use nix::fcntl::{flock, FlockArg};
    use std::fmt;
    use std::fs::File;
    use std::os::unix::io::AsRawFd;

    #[derive(Debug)]
    pub enum LockError {
        WouldBlock,
        Sys(Errno),
    }

    impl fmt::Display for LockError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                LockError::WouldBlock => write!(f, "lock is held elsewhere"),
                LockError::Sys(errno) => write!(f, "{}", errno),
            }
        }
    }

    pub fn lock(file: &File, blocking: bool) -> Result<(), LockError> {
        let arg = if blocking {
            FlockArg::LockExclusive
        } else {
            FlockArg::LockExclusiveNonblock
        };
        loop {
            match flock(file.as_raw_fd(), arg) {
                Ok(()) => return Ok(()),
                Err(Errno::EINTR) => continue,
                Err(Errno::EWOULDBLOCK) => return Err(LockError::WouldBlock),
                Err(errno) => return Err(LockError::Sys(errno)),
            }
        }
    }

    pub fn unlock(file: &File) {
        let _ = flock(file.as_raw_fd(), FlockArg::Unlock);
    }
}

#[cfg(not(unix))]
mod platform {
    use std::fmt;
    use std::fs::File;

    #[derive(Debug)]
    pub enum LockError {
        WouldBlock,
    }

    impl fmt::Display for LockError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "lock is held elsewhere")
        }
    }

    pub fn lock(_file: &File, _blocking: bool) -> Result<(), LockError> {
        Ok(())
    }

    pub fn unlock(_file: &File) {}
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_lock_is_refused_until_release() {
        let dir = TempDir::new().unwrap();
        let layout = EnvLayout::new(dir.path(), "sample", "staging");

        let held = EnvLock::acquire(&layout).unwrap();
        assert!(held.path().ends_with(".lock"));
        assert!(EnvLock::try_acquire(&layout).unwrap().is_none());

        drop(held);
        assert!(EnvLock::try_acquire(&layout).unwrap().is_some());
    }

    #[test]
    fn test_acquire_ordered_dedups() {
        let dir = TempDir::new().unwrap();
        let a = EnvLayout::new(dir.path(), "sample", "prod");
        let b = EnvLayout::new(dir.path(), "sample", "staging");

        let locks = acquire_ordered(vec![b.clone(), a.clone(), b.clone()]).unwrap();

        assert_eq!(locks.len(), 2);
        assert!(locks[0].path().starts_with(a.env_dir()));
    }
}
