use rusqlite::Connection;
use std::path::{Path, PathBuf};
use crate::config::{StoreConfig, JOURNAL_MODES};
use crate::error::{GraphError, Result};

pub mod migrate;

/// Store handle owning the single connection to the durable store
///
/// The connection is acquired once in [`Store::open`] and released either by
/// [`Store::close`] or, on any other exit path, when the handle is dropped.
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) the store at `db_path`, apply pragmas and run migrations
    pub fn open<P: AsRef<Path>>(db_path: P, config: &StoreConfig) -> Result<Self> {
        let journal_mode = config.journal_mode.to_uppercase();
        if !JOURNAL_MODES.contains(&journal_mode.as_str()) {
            return Err(GraphError::Config(format!(
                "unknown journal mode: {}",
                config.journal_mode
            )));
        }

        let path = db_path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(GraphError::Database)?;

        // NORMAL sync is safe under WAL; foreign keys stay advisory unless configured
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = {}; \
             PRAGMA synchronous = NORMAL; \
             PRAGMA foreign_keys = {}; \
             PRAGMA temp_store = MEMORY;",
            journal_mode,
            if config.enforce_foreign_keys { "ON" } else { "OFF" },
        ))?;

        let mut store = Self { conn, path: Some(path) };
        migrate::run_migrations(&mut store.conn)?;

        log::info!("PDCA graph store opened at {}", store.describe());
        Ok(store)
    }

    /// Open a private in-memory store with the schema applied
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(GraphError::Database)?;
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;

        let mut store = Self { conn, path: None };
        migrate::run_migrations(&mut store.conn)?;

        log::debug!("PDCA graph store opened in memory");
        Ok(store)
    }

    /// Borrow the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Borrow the underlying connection mutably (for transactions)
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// On-disk location, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn describe(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string())
    }

    /// Release the connection, reporting any error SQLite raises while closing
    pub fn close(self) -> Result<()> {
        let location = self.describe();
        self.conn
            .close()
            .map_err(|(_conn, e)| GraphError::Database(e))?;
        log::info!("Database connection closed ({})", location);
        Ok(())
    }
}
