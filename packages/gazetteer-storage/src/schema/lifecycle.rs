//! Idempotent table creation
//!
//! The catalog is consulted before any DDL runs. A table that already exists
//! is never touched, so calling these at every startup is safe.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::SchemaRegistry;
use crate::error::{Result, StorageError};
use crate::infrastructure::Database;
use crate::tables::Table;

/// Create `table` unless the catalog already lists it
///
/// Returns `true` if DDL was executed.
pub fn create_table_if_necessary<T: Table + ?Sized>(
    ctx: &CancellationToken,
    db: &Database,
    registry: &SchemaRegistry,
    table: &T,
) -> Result<bool> {
    if ctx.is_cancelled() {
        return Err(StorageError::cancelled(table.name()));
    }

    if db.table_exists(table.name())? {
        debug!("Table {} already exists", table.name());
        return Ok(false);
    }

    let ddl = table.schema(registry, db.driver())?;
    apply_schema(db, table.name(), &ddl)?;
    Ok(true)
}

/// Create every table in `tables` that the catalog does not list
///
/// The catalog is read once up front. Returns the names of the tables created.
pub fn create_tables_if_necessary(
    ctx: &CancellationToken,
    db: &Database,
    registry: &SchemaRegistry,
    tables: &[Arc<dyn Table>],
) -> Result<Vec<String>> {
    let existing = db.table_names()?;
    let mut created = Vec::new();

    for table in tables {
        if ctx.is_cancelled() {
            return Err(StorageError::cancelled(table.name()));
        }

        if existing.contains(table.name()) {
            continue;
        }

        let ddl = table.schema(registry, db.driver())?;
        apply_schema(db, table.name(), &ddl)?;
        created.push(table.name().to_string());
    }

    Ok(created)
}

/// Run all of `ddl` in one transaction; a failing statement rolls back
/// the ones before it
fn apply_schema(db: &Database, name: &str, ddl: &str) -> Result<()> {
    let mut conn = db.connection();
    let tx = conn
        .transaction()
        .map_err(|e| StorageError::table_creation(name, e))?;

    tx.execute_batch(ddl)
        .map_err(|e| StorageError::table_creation(name, e))?;

    tx.commit()
        .map_err(|e| StorageError::table_creation(name, e))?;

    info!("Created {} table", name);
    Ok(())
}
