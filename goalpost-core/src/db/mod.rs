mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use rusqlite::Connection;

pub use schema::SCHEMA;

/// Shared handle to the SQLite database.
///
/// Cloning is cheap; all clones share one connection guarded by a mutex.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("opening database at {}", path.display()))?;
        tracing::debug!("Opened database at {}", path.display());
        Self::from_connection(conn)
    }

    /// Open the database in the platform data directory.
    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    /// In-memory database, used by tests.
    pub fn open_memory() -> Result<Self> {
        let db = Self::from_connection(Connection::open_in_memory()?)?;
        db.migrate()?;
        Ok(db)
    }

    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "goalpost")
            .ok_or_else(|| anyhow!("could not determine a data directory"))?;
        Ok(dirs.data_dir().join("goalpost.db"))
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create any missing tables and indexes.
    pub fn migrate(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))?;
        f(&*conn)
    }
}
