use async_trait::async_trait;
use rusqlite::params;
use tokio_util::sync::CancellationToken;

use super::{delete_by_id, execute, write_transaction, Table, ANCESTORS_TABLE_NAME};
use crate::domain::Record;
use crate::error::{Result, StorageError};
use crate::infrastructure::Database;

/// Hierarchy keys look like `county_id`; the placetype is the key without it
const PLACETYPE_KEY_SUFFIX: &str = "_id";

/// `county_id` -> `county`
pub fn ancestor_placetype(key: &str) -> &str {
    key.strip_suffix(PLACETYPE_KEY_SUFFIX).unwrap_or(key)
}

/// One row per (record, ancestor) pair taken from `wof:hierarchy`
///
/// Alt records never contribute ancestors. Every write replaces the full
/// row set for the record id, so ancestors dropped from a newer version of
/// the record disappear.
#[derive(Debug, Clone, Default)]
pub struct AncestorsTable;

impl AncestorsTable {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Table for AncestorsTable {
    fn name(&self) -> &str {
        ANCESTORS_TABLE_NAME
    }

    async fn index_record(&self, ctx: &CancellationToken, db: &Database, record: &Record) -> Result<()> {
        if record.is_alt() {
            return Ok(());
        }

        let name = self.name();

        let id = record
            .id()
            .map_err(|e| StorageError::missing_property(name, "id", e))?;

        let hierarchies = record
            .hierarchies()
            .map_err(|e| StorageError::missing_property(name, "hierarchy", e))?;

        let lastmod = record.last_modified();

        let insert = format!(
            "INSERT OR REPLACE INTO {} (id, ancestor_id, ancestor_placetype, lastmodified)
             VALUES (?1, ?2, ?3, ?4)",
            name
        );

        write_transaction(ctx, db, name, |tx| {
            delete_by_id(tx, name, id)?;

            for (key, ancestor_id) in hierarchies.iter().flatten() {
                execute(
                    tx,
                    name,
                    &insert,
                    params![id, ancestor_id, ancestor_placetype(key), lastmod],
                )?;
            }

            Ok(())
        })
    }
}
