//! File-based advisory lock guarding schema migrations.
//!
//! A plain lockfile-in-the-store-directory is used rather than an
//! in-process mutex because the contract is "concurrent openers block
//! until lock acquisition or timeout" across process boundaries, not just
//! threads within one process.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::{Duration, Instant};

use ctk_core::constants::MIGRATION_LOCK_TIMEOUT;
use ctk_error::{CtkError, CtkResult};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct MigrationLock {
    path: PathBuf,
}

impl MigrationLock {
    /// Acquires the lock, polling every `POLL_INTERVAL` until it succeeds
    /// or `MIGRATION_LOCK_TIMEOUT` elapses.
    pub fn acquire(store_dir: &Path) -> CtkResult<Self> {
        let path = store_dir.join("migration.lock");
        let deadline = Instant::now() + MIGRATION_LOCK_TIMEOUT;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(CtkError::MigrationTimeout(MIGRATION_LOCK_TIMEOUT));
                    }
                    sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(CtkError::Io(e)),
            }
        }
    }
}

impl Drop for MigrationLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
