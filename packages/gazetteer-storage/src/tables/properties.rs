use async_trait::async_trait;
use rusqlite::params;
use tokio_util::sync::CancellationToken;

use super::{execute, write_transaction, Table, PROPERTIES_TABLE_NAME};
use crate::domain::Record;
use crate::error::{Result, StorageError};
use crate::infrastructure::Database;

#[derive(Debug, Clone, Default)]
pub struct PropertiesTableOptions {
    /// Index alt variants alongside the primary record
    pub index_alt_files: bool,
}

/// One row per record holding its `properties` document as JSON text
#[derive(Debug, Clone, Default)]
pub struct PropertiesTable {
    options: PropertiesTableOptions,
}

impl PropertiesTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: PropertiesTableOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Table for PropertiesTable {
    fn name(&self) -> &str {
        PROPERTIES_TABLE_NAME
    }

    async fn index_record(&self, ctx: &CancellationToken, db: &Database, record: &Record) -> Result<()> {
        let is_alt = record.is_alt();

        if is_alt && !self.options.index_alt_files {
            return Ok(());
        }

        let name = self.name();

        let id = record
            .id()
            .map_err(|e| StorageError::missing_property(name, "id", e))?;

        let alt_label = record
            .alt_label()
            .map_err(|e| StorageError::missing_property(name, "alt label", e))?;

        let lastmod = record.last_modified();
        let body = record.properties_json().map_err(|e| e.with_table(name))?;

        let sql = format!(
            "INSERT OR REPLACE INTO {} (id, body, is_alt, alt_label, lastmodified)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            name
        );

        write_transaction(ctx, db, name, |tx| {
            execute(tx, name, &sql, params![id, body, is_alt, alt_label, lastmod])?;
            Ok(())
        })
    }
}
