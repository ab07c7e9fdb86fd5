//! Single-instance guard.
//!
//! The PID file is locked with an exclusive, non-blocking `fs2` lock for the
//! life of the process; a second daemon pointed at the same file fails fast
//! instead of fighting over the serial port.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::{debug, info};

use crate::error::StartupError;

pub struct PidLock {
    file: File,
    path: PathBuf,
}

impl PidLock {
    /// Lock `path` and write our PID into it.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, StartupError> {
        let path = path.as_ref().to_path_buf();
        let lock_error = |source: std::io::Error| StartupError::PidLock {
            path: path.display().to_string(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(lock_error)?;
        file.try_lock_exclusive().map_err(lock_error)?;

        file.set_len(0).map_err(lock_error)?;
        writeln!(file, "{}", std::process::id()).map_err(lock_error)?;
        file.flush().map_err(lock_error)?;

        info!("Holding PID lock {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
        let _ = self.file.unlock();
        debug!("Released PID lock {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_holder_is_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("arcomd.pid");

        let first = PidLock::acquire(&path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written.trim(), std::process::id().to_string());

        match PidLock::acquire(&path) {
            Err(err @ StartupError::PidLock { .. }) => assert_eq!(err.exit_code(), 99),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("lock acquired twice"),
        }

        drop(first);
        assert!(!path.exists());
        let again = PidLock::acquire(&path).unwrap();
        assert_eq!(again.path(), path.as_path());
    }
}
