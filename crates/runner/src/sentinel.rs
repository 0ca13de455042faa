//! Stop sentinel file shared with the engine
//!
//! The engine polls for this file between test cases and winds down when it
//! appears. It is a courtesy signal only; the supervisor still terminates the
//! process.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

#[derive(Debug, Clone)]
pub struct StopSentinel {
    path: PathBuf,
}

impl StopSentinel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn raise(&self) -> io::Result<()> {
        debug!("Raising stop sentinel {}", self.path.display());
        std::fs::write(&self.path, "stop")
    }

    /// Remove the sentinel; a missing file is not an error
    pub fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn is_raised(&self) -> bool {
        self.path.exists()
    }
}
