use async_trait::async_trait;
use rusqlite::params;
use tokio_util::sync::CancellationToken;

use super::{execute, write_transaction, Table, GEOMETRIES_TABLE_NAME};
use crate::domain::Record;
use crate::error::{Result, StorageError};
use crate::infrastructure::Database;

#[derive(Debug, Clone, Default)]
pub struct GeometriesTableOptions {
    pub index_alt_files: bool,
}

/// Native spatial geometry per record
///
/// The feature geometry is rendered as WKT and handed to the driver's
/// geometry constructor (`GeomFromText` under SpatiaLite), so the database
/// needs spatial functions loaded.
#[derive(Debug, Clone, Default)]
pub struct GeometriesTable {
    options: GeometriesTableOptions,
}

impl GeometriesTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: GeometriesTableOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Table for GeometriesTable {
    fn name(&self) -> &str {
        GEOMETRIES_TABLE_NAME
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

        let wkt = record
            .geometry_wkt()
            .map_err(|e| StorageError::missing_property(name, "geometry", e))?;

        let geom_type = record
            .geometry_type()
            .map_err(|e| StorageError::missing_property(name, "geometry type", e))?;

        let lastmod = record.last_modified();

        let sql = format!(
            "INSERT OR REPLACE INTO {} (id, is_alt, alt_label, type, geom, lastmodified)
             VALUES (?1, ?2, ?3, ?4, {}, ?6)",
            name,
            db.driver().geometry_from_text("?5")
        );

        write_transaction(ctx, db, name, |tx| {
            execute(
                tx,
                name,
                &sql,
                params![id, is_alt, alt_label, geom_type, wkt, lastmod],
            )?;
            Ok(())
        })
    }
}
