use async_trait::async_trait;
use rusqlite::params;
use tokio_util::sync::CancellationToken;

use super::{delete_by_id, execute, write_transaction, Table, SUPERSEDES_TABLE_NAME};
use crate::domain::Record;
use crate::error::{Result, StorageError};
use crate::infrastructure::Database;

/// Supersession edges (`wof:supersedes`, `wof:superseded_by`) for each record
#[derive(Debug, Clone, Default)]
pub struct SupersedesTable;

impl SupersedesTable {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Table for SupersedesTable {
    fn name(&self) -> &str {
        SUPERSEDES_TABLE_NAME
    }

    async fn index_record(&self, ctx: &CancellationToken, db: &Database, record: &Record) -> Result<()> {
        if record.is_alt() {
            return Ok(());
        }

        let name = self.name();

        let id = record
            .id()
            .map_err(|e| StorageError::missing_property(name, "id", e))?;

        let supersedes = record
            .supersedes()
            .map_err(|e| StorageError::missing_property(name, "supersedes", e))?;

        let superseded_by = record
            .superseded_by()
            .map_err(|e| StorageError::missing_property(name, "superseded by", e))?;

        let lastmod = record.last_modified();

        // (superseded_id, superseded_by_id)
        let edges = supersedes
            .iter()
            .map(|old| (*old, id))
            .chain(superseded_by.iter().map(|new| (id, *new)));

        let insert = format!(
            "INSERT OR REPLACE INTO {} (id, superseded_id, superseded_by_id, lastmodified)
             VALUES (?1, ?2, ?3, ?4)",
            name
        );

        write_transaction(ctx, db, name, |tx| {
            delete_by_id(tx, name, id)?;

            for (superseded_id, superseded_by_id) in edges {
                execute(
                    tx,
                    name,
                    &insert,
                    params![id, superseded_id, superseded_by_id, lastmod],
                )?;
            }

            Ok(())
        })
    }
}
