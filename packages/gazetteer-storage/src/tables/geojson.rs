use async_trait::async_trait;
use rusqlite::params;
use tokio_util::sync::CancellationToken;

use super::{execute, write_transaction, Table, GEOJSON_TABLE_NAME};
use crate::domain::Record;
use crate::error::{Result, StorageError};
use crate::infrastructure::Database;

const UNKNOWN_SOURCE: &str = "unknown";

#[derive(Debug, Clone, Default)]
pub struct GeoJsonTableOptions {
    pub index_alt_files: bool,
}

/// The complete feature document, one row per (id, alt label)
#[derive(Debug, Clone, Default)]
pub struct GeoJsonTable {
    options: GeoJsonTableOptions,
}

impl GeoJsonTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: GeoJsonTableOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Table for GeoJsonTable {
    fn name(&self) -> &str {
        GEOJSON_TABLE_NAME
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

        let source = record.source().unwrap_or_else(|_| UNKNOWN_SOURCE.to_string());
        let lastmod = record.last_modified();
        let body = record.to_json().map_err(|e| e.with_table(name))?;

        let sql = format!(
            "INSERT OR REPLACE INTO {} (id, body, source, is_alt, alt_label, lastmodified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            name
        );

        write_transaction(ctx, db, name, |tx| {
            execute(
                tx,
                name,
                &sql,
                params![id, body, source, is_alt, alt_label, lastmod],
            )?;
            Ok(())
        })
    }
}
