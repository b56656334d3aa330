use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use fs2::FileExt;
use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("another noderig run holds {path}")]
    AlreadyRunning { path: String },
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl AcquireError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

/// Host-wide exclusive lock held for one run. Released on drop.
pub struct RunLock {
    _file: File,
}

impl RunLock {
    pub fn acquire(path: &Path) -> Result<Self, AcquireError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|error| AcquireError::io("failed to create lock directory", error))?;
        }
        let mut lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|error| AcquireError::io("failed to open run lock file", error))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                return Err(AcquireError::AlreadyRunning {
                    path: path.display().to_string(),
                });
            }
            Err(error) => {
                return Err(AcquireError::io("failed to acquire run lock", error));
            }
        }

        lock_file
            .set_len(0)
            .and_then(|()| lock_file.seek(SeekFrom::Start(0)).map(|_| ()))
            .and_then(|()| writeln!(lock_file, "{}", std::process::id()))
            .map_err(|error| AcquireError::io("failed to write run lock metadata", error))?;

        debug!("Acquired run lock {}", path.display());
        Ok(Self { _file: lock_file })
    }
}

#[cfg(test)]
mod tests {
    use super::{AcquireError, RunLock};

    #[test]
    fn acquire_writes_pid() {
        let dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = dir.path().join("data").join("run.lock");

        let _lock = RunLock::acquire(&path).expect("lock should be acquired");

        let contents = std::fs::read_to_string(&path).expect("lock file should be readable");
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn second_acquire_is_refused_until_release() {
        let dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = dir.path().join("run.lock");

        let first = RunLock::acquire(&path).expect("first lock should be acquired");
        assert!(matches!(
            RunLock::acquire(&path),
            Err(AcquireError::AlreadyRunning { .. })
        ));

        drop(first);
        assert!(RunLock::acquire(&path).is_ok());
    }
}
