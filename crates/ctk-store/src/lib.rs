//! Durable store, streaming queries, and identifier resolver for the
//! conversation toolkit.
//!
//! A single-process, single-writer backing realized on top of `rusqlite`
//! (synchronous by design, so the core never needs an async runtime).
//! Operations are split across focused modules that all delegate to the
//! same guarded connection.

pub mod conversations;
pub mod embeddings;
pub mod listing;
pub mod migration_lock;
pub mod resolver;
pub mod rows;
pub mod schema;
pub mod stats;
pub mod streaming;
pub mod tags;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use ctk_error::{CtkError, CtkResult};
use rusqlite::Connection;
use tracing::{debug, info};

/// Handle to an open store. Cheap to clone (wraps an `Arc`); all clones
/// share the same underlying connection and its write lock.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    dir: Option<PathBuf>,
}

impl Store {
    /// Opens (creating if necessary) a store directory. Runs
    /// forward-only migrations under `MigrationLock` (§4.2.4).
    pub fn open(dir: impl AsRef<Path>) -> CtkResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let _lock = migration_lock::MigrationLock::acquire(&dir)?;

        let db_path = dir.join("ctk.db");
        let conn = Connection::open(&db_path)?;
        configure_connection(&conn)?;
        schema::initialize(&conn)?;
        info!(schema_version = schema::schema_version(&conn).unwrap_or(-1), path = %db_path.display(), "opened store");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dir: Some(dir),
        })
    }

    /// In-memory store, primarily for tests. No migration lock is needed
    /// since the database cannot be shared across processes.
    pub fn open_in_memory() -> CtkResult<Self> {
        let conn = Connection::open_in_memory()?;
        configure_connection(&conn)?;
        schema::initialize(&conn)?;
        debug!("opened in-memory store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dir: None,
        })
    }

    pub fn directory(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("store connection mutex poisoned")
    }

    /// Runs `f` inside a SQL transaction that commits on `Ok` and rolls
    /// back on `Err`, so every mutation is atomic.
    pub(crate) fn with_transaction<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction) -> CtkResult<T>,
    ) -> CtkResult<T> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(CtkError::from)?;
        let result = f(&tx)?;
        tx.commit().map_err(CtkError::from)?;
        Ok(result)
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}
