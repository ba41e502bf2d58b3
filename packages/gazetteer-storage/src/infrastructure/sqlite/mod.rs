//! SQLite database handle
//!
//! One connection shared by the engine and every table, behind a mutex.
//! Each table write takes the lock for the length of its own transaction.

mod descriptor;

pub use descriptor::{ConnectionDescriptor, Driver};

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, StorageError};

/// Shared SQLite connection
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    driver: Driver,
}

impl Database {
    /// Open the database a connection descriptor points at
    ///
    /// Fails with `UnsupportedDriver` if the descriptor names a driver we
    /// cannot open.
    pub fn open(descriptor: &ConnectionDescriptor) -> Result<Self> {
        match descriptor.driver {
            Driver::Sqlite => {
                let conn = if descriptor.is_memory() {
                    Connection::open_in_memory()
                } else {
                    Connection::open(&descriptor.dsn)
                }
                .map_err(|e| {
                    StorageError::database(format!("Unable to open database '{}'", descriptor.dsn))
                        .with_source(e)
                })?;

                debug!("Opened sqlite database {}", descriptor.dsn);
                Ok(Self::from_connection(conn))
            }
        }
    }

    /// Parse a `sql://<driver>?dsn=...` descriptor and open it
    pub fn open_uri(uri: &str) -> Result<Self> {
        let descriptor: ConnectionDescriptor = uri.parse()?;
        Self::open(&descriptor)
    }

    /// Create an in-memory SQLite database (for testing)
    pub fn in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            driver: Driver::Sqlite,
        }
    }

    pub fn driver(&self) -> Driver {
        self.driver
    }

    /// Exclusive access to the underlying connection
    ///
    /// Do not hold the guard across an `.await`.
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Names of every table in the catalog
    pub fn table_names(&self) -> Result<HashSet<String>> {
        let conn = self.connection();
        let mut stmt = conn
            .prepare(self.driver.catalog_query())
            .map_err(|e| StorageError::database("Failed to query table catalog").with_source(e))?;

        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()
            .map_err(|e| StorageError::database("Failed to scan table name").with_source(e))?;

        Ok(names)
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self.table_names()?.contains(name))
    }

    /// Number of rows in `table` (diagnostics and tests; not used while indexing)
    pub fn count_rows(&self, table: &str) -> Result<usize> {
        let conn = self.connection();
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }

    /// `PRAGMA optimize`, run once at the end of an indexing run
    pub fn optimize(&self) -> Result<()> {
        self.connection()
            .execute_batch("PRAGMA optimize")
            .map_err(|e| StorageError::database("Failed to optimize").with_source(e))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("driver", &self.driver).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_table_exists() {
        let db = Database::in_memory().unwrap();
        assert!(!db.table_exists("properties").unwrap());

        db.connection()
            .execute_batch("CREATE TABLE properties (id INTEGER)")
            .unwrap();

        assert!(db.table_exists("properties").unwrap());
        assert_eq!(db.count_rows("properties").unwrap(), 0);
    }

    #[test]
    fn test_open_uri_memory() {
        let db = Database::open_uri("sql://sqlite?dsn=:memory:").unwrap();
        assert_eq!(db.driver(), Driver::Sqlite);
        assert!(db.table_names().unwrap().is_empty());
        db.optimize().unwrap();
    }

    #[test]
    fn test_open_uri_unsupported_driver() {
        let err = Database::open_uri("sql://oracle?dsn=scott").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedDriver);
    }
}
