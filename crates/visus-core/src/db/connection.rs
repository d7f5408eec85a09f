//! Database connection management

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use super::migrations;
use crate::error::{Error, Result};
use crate::schema::TableSchema;

/// Shared handle to the local `SQLite` store.
///
/// Cloning is cheap. The single connection sits behind a mutex that is held
/// for one statement or one transaction at a time and never across an
/// `.await`, so every store operation is atomic with respect to the others.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

struct Inner {
    conn: Mutex<Connection>,
    tables: Mutex<HashMap<String, Arc<TableSchema>>>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        Self::from_connection(conn, Some(path))
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, None)
    }

    fn from_connection(mut conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        Self::configure(&conn)?;
        migrations::run(&mut conn)?;

        Ok(Self {
            inner: Arc::new(Inner {
                conn: Mutex::new(conn),
                tables: Mutex::new(HashMap::new()),
                path,
            }),
        })
    }

    /// Configure `SQLite` for optimal performance
    fn configure(conn: &Connection) -> Result<()> {
        // WAL is unavailable for in-memory databases; keep the default there
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
            .ok();
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "cache_size", 10_000)?;
        Ok(())
    }

    /// Register an entity table, creating or migrating it on first use.
    ///
    /// Registering the same shape again returns the cached schema; a
    /// different shape under an already registered name is a schema error.
    pub fn register(&self, schema: TableSchema) -> Result<Arc<TableSchema>> {
        let mut tables = self.inner.tables.lock();
        if let Some(existing) = tables.get(schema.name()) {
            if **existing == schema {
                return Ok(Arc::clone(existing));
            }
            return Err(Error::schema(
                schema.name(),
                "table already registered with a different shape",
            ));
        }

        self.write(|tx| migrations::ensure_table(tx, &schema))?;
        tracing::info!(
            "Registered table {} ({} columns)",
            schema.name(),
            schema.columns().len()
        );

        let schema = Arc::new(schema);
        tables.insert(schema.name().to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Names of every registered table
    pub fn table_names(&self) -> Vec<String> {
        let mut names = self.inner.tables.lock().keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    /// Run `f` inside one immediate transaction; commits on `Ok`, rolls back on `Err`.
    pub(crate) fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.inner.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Run a read-only closure against the connection
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.inner.conn.lock();
        f(&conn)
    }

    /// Filesystem path, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }
}
