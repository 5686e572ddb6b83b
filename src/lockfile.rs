//! Advisory single-instance lockfile.
//!
//! Presence of the file denotes an active run; its content is the holder's
//! pid as decimal text. The guard is advisory (no kernel-level exclusion),
//! and an existing file is never removed by the loser.

use crate::error::{AcmeError, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Held for the duration of one run; released on drop
#[derive(Debug)]
pub struct Lockfile {
    path: PathBuf,
    released: bool,
}

impl Lockfile {
    /// Acquire the lock, failing with `LockHeld` when the file exists.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = std::fs::read_to_string(&path)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(AcmeError::LockHeld {
                    path: path.display().to_string(),
                    holder,
                });
            }
            Err(e) => {
                return Err(AcmeError::LockUnwritable {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };

        if let Err(e) = write!(file, "{}", std::process::id()) {
            // the file exists but carries no pid; still ours to remove
            let _ = std::fs::remove_file(&path);
            return Err(AcmeError::LockUnwritable {
                path: path.display().to_string(),
                source: e,
            });
        }

        debug!(path = %path.display(), "lock acquired");
        Ok(Self {
            path,
            released: false,
        })
    }

    /// Release the lock explicitly.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        std::fs::remove_file(&self.path)?;
        debug!(path = %self.path.display(), "lock released");
        Ok(())
    }
}

impl Drop for Lockfile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove lockfile");
        }
    }
}
