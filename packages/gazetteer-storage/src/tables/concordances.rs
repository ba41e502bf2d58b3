use async_trait::async_trait;
use rusqlite::params;
use tokio_util::sync::CancellationToken;

use super::{delete_by_id, execute, write_transaction, Table, CONCORDANCES_TABLE_NAME};
use crate::domain::Record;
use crate::error::{Result, StorageError};
use crate::infrastructure::Database;

/// One row per external identifier in `wof:concordances`
///
/// Alt records are never indexed here. Rows for a record id are replaced
/// wholesale on every write.
#[derive(Debug, Clone, Default)]
pub struct ConcordancesTable;

impl ConcordancesTable {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Table for ConcordancesTable {
    fn name(&self) -> &str {
        CONCORDANCES_TABLE_NAME
    }

    async fn index_record(&self, ctx: &CancellationToken, db: &Database, record: &Record) -> Result<()> {
        if record.is_alt() {
            return Ok(());
        }

        let name = self.name();

        let id = record
            .id()
            .map_err(|e| StorageError::missing_property(name, "id", e))?;

        let concordances = record
            .concordances()
            .map_err(|e| StorageError::missing_property(name, "concordances", e))?;

        let lastmod = record.last_modified();

        let insert = format!(
            "INSERT OR REPLACE INTO {} (id, other_id, other_source, lastmodified)
             VALUES (?1, ?2, ?3, ?4)",
            name
        );

        write_transaction(ctx, db, name, |tx| {
            delete_by_id(tx, name, id)?;

            for (other_source, other_id) in &concordances {
                execute(tx, name, &insert, params![id, other_id, other_source, lastmod])?;
            }

            Ok(())
        })
    }
}
