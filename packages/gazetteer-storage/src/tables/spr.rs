use async_trait::async_trait;
use rusqlite::params;
use tokio_util::sync::CancellationToken;

use super::{execute, write_transaction, Table, SPR_TABLE_NAME};
use crate::domain::properties::{self, PropertyError};
use crate::domain::Record;
use crate::error::{Result, StorageError};
use crate::infrastructure::Database;

/// Placetype recorded for alt rows that do not carry one
pub const ALT_PLACETYPE: &str = "alt";

#[derive(Debug, Clone, Default)]
pub struct SprTableOptions {
    pub index_alt_files: bool,
}

/// Standard places response: one flat summary row per record
///
/// Name and placetype are required for primary records. Alt records fall
/// back to an empty name and the `alt` placetype.
#[derive(Debug, Clone, Default)]
pub struct SprTable {
    options: SprTableOptions,
}

impl SprTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: SprTableOptions) -> Self {
        Self { options }
    }
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
}

#[async_trait]
impl Table for SprTable {
    fn name(&self) -> &str {
        SPR_TABLE_NAME
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

        let (place_name, placetype) = if is_alt {
            (
                record.name().unwrap_or_default(),
                record.placetype().unwrap_or_else(|_| ALT_PLACETYPE.to_string()),
            )
        } else {
            let place_name = record.name().filter(|n| !n.is_empty()).ok_or_else(|| {
                StorageError::missing_property(name, "name", PropertyError::missing(properties::NAME))
            })?;
            let placetype = record
                .placetype()
                .map_err(|e| StorageError::missing_property(name, "placetype", e))?;
            (place_name, placetype)
        };

        let bounds = record
            .bounds()
            .map_err(|e| StorageError::missing_property(name, "bounding box", e))?;

        let (latitude, longitude) = record
            .centroid()
            .map_err(|e| StorageError::missing_property(name, "centroid", e))?;

        let supersedes = record
            .supersedes()
            .map_err(|e| StorageError::missing_property(name, "supersedes", e))?;

        let superseded_by = record
            .superseded_by()
            .map_err(|e| StorageError::missing_property(name, "superseded by", e))?;

        let belongs_to = record
            .belongs_to()
            .map_err(|e| StorageError::missing_property(name, "belongs to", e))?;

        let (min, max) = (bounds.min(), bounds.max());
        let lastmod = record.last_modified();

        let sql = format!(
            "INSERT OR REPLACE INTO {} (
                id, parent_id, name, placetype, inception, cessation, country, repo,
                latitude, longitude, min_latitude, min_longitude, max_latitude, max_longitude,
                is_current, is_deprecated, is_ceased, is_superseded, is_superseding,
                superseded_by, supersedes, belongsto, is_alt, alt_label, lastmodified
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18, ?19,
                ?20, ?21, ?22, ?23, ?24, ?25
            )",
            name
        );

        write_transaction(ctx, db, name, |tx| {
            execute(
                tx,
                name,
                &sql,
                params![
                    id,
                    record.parent_id(),
                    place_name,
                    placetype,
                    record.inception(),
                    record.cessation(),
                    record.country(),
                    record.repo(),
                    latitude,
                    longitude,
                    min.y,
                    min.x,
                    max.y,
                    max.x,
                    record.is_current(),
                    record.is_deprecated(),
                    record.is_ceased(),
                    !superseded_by.is_empty(),
                    !supersedes.is_empty(),
                    join_ids(&superseded_by),
                    join_ids(&supersedes),
                    join_ids(&belongs_to),
                    is_alt,
                    alt_label,
                    lastmod,
                ],
            )?;
            Ok(())
        })
    }
}
