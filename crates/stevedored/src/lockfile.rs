//! Single-instance lock on a file, held with `flock(2)` for the daemon's lifetime.
use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    os::fd::AsRawFd,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LockFileError {
    #[error("lock file {0} is held by another process")]
    Held(PathBuf),

    #[error("cannot open lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Exclusive lock, released when dropped.
#[derive(Debug)]
pub struct LockFile {
    file: File,
    path: PathBuf,
}

impl LockFile {
    /// Take the lock without blocking; the file records the holder's pid.
    pub fn acquire(path: &Path) -> Result<Self, LockFileError> {
        let io_err = |source| LockFileError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(io_err)?;

        // SAFETY: the descriptor is owned by `file` and valid for the duration of the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(code) if code == libc::EWOULDBLOCK => Err(LockFileError::Held(path.to_path_buf())),
                _ => Err(io_err(err)),
            };
        }

        file.set_len(0).map_err(io_err)?;
        writeln!(file, "{}", std::process::id()).map_err(io_err)?;
        debug!(path = %path.display(), "lock file acquired");

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        // SAFETY: see `acquire`.
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
        debug!(path = %self.path.display(), "lock file released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("stevedore-{name}-{}.lock", std::process::id()))
    }

    #[test]
    fn second_acquire_fails_until_released() {
        let path = lock_path("exclusive");

        let first = LockFile::acquire(&path).unwrap();
        assert!(matches!(LockFile::acquire(&path), Err(LockFileError::Held(_))));

        drop(first);
        let again = LockFile::acquire(&path).unwrap();
        assert_eq!(again.path(), path.as_path());
        drop(again);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn records_holder_pid() {
        let path = lock_path("pid");
        let lock = LockFile::acquire(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
        drop(lock);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unwritable_location_is_an_io_error() {
        let res = LockFile::acquire(Path::new("/nonexistent-dir/stevedore.lock"));
        assert!(matches!(res, Err(LockFileError::Io { .. })));
    }
}
