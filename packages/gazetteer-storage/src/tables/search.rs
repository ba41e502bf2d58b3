use async_trait::async_trait;
use rusqlite::params;
use tokio_util::sync::CancellationToken;

use super::{delete_by_id, execute, write_transaction, Table, SEARCH_TABLE_NAME};
use crate::domain::names::{LanguageTag, COLLOQUIAL, PREFERRED, VARIANT};
use crate::domain::Record;
use crate::error::{Result, StorageError};
use crate::infrastructure::Database;

/// Full-text search row per record
///
/// Names are pooled across languages into `names_all` and split again by
/// qualifier. Alt records are never indexed here.
#[derive(Debug, Clone, Default)]
pub struct SearchTable;

impl SearchTable {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Default)]
struct NameColumns {
    all: Vec<String>,
    preferred: Vec<String>,
    variant: Vec<String>,
    colloquial: Vec<String>,
}

impl NameColumns {
    fn from_record(record: &Record) -> Self {
        let mut columns = Self::default();

        if let Some(name) = record.name().filter(|n| !n.is_empty()) {
            columns.all.push(name);
        }

        for (tag, names) in record.names() {
            let bucket = match LanguageTag::parse(&tag).privateuse.as_str() {
                PREFERRED => Some(&mut columns.preferred),
                VARIANT => Some(&mut columns.variant),
                COLLOQUIAL => Some(&mut columns.colloquial),
                _ => None,
            };

            if let Some(bucket) = bucket {
                bucket.extend(names.iter().cloned());
            }
            columns.all.extend(names);
        }

        columns
    }
}

#[async_trait]
impl Table for SearchTable {
    fn name(&self) -> &str {
        SEARCH_TABLE_NAME
    }

    async fn index_record(&self, ctx: &CancellationToken, db: &Database, record: &Record) -> Result<()> {
        if record.is_alt() {
            return Ok(());
        }

        let name = self.name();

        let id = record
            .id()
            .map_err(|e| StorageError::missing_property(name, "id", e))?;

        let placetype = record
            .placetype()
            .map_err(|e| StorageError::missing_property(name, "placetype", e))?;

        let superseded_by = record
            .superseded_by()
            .map_err(|e| StorageError::missing_property(name, "superseded by", e))?;

        let place_name = record.name().unwrap_or_default();
        let names = NameColumns::from_record(record);

        let insert = format!(
            "INSERT INTO {} (
                id, placetype, name, names_all, names_preferred, names_variant, names_colloquial,
                is_current, is_ceased, is_deprecated, is_superseded
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            name
        );

        write_transaction(ctx, db, name, |tx| {
            delete_by_id(tx, name, id)?;

            execute(
                tx,
                name,
                &insert,
                params![
                    id,
                    placetype,
                    place_name,
                    names.all.join(" "),
                    names.preferred.join(" "),
                    names.variant.join(" "),
                    names.colloquial.join(" "),
                    record.is_current(),
                    record.is_ceased(),
                    record.is_deprecated(),
                    !superseded_by.is_empty(),
                ],
            )?;

            Ok(())
        })
    }
}
