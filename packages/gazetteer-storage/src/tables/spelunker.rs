use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::params;
use tokio_util::sync::CancellationToken;

use super::document::{DocumentPreparer, SpelunkerDocument};
use super::{execute, write_transaction, Table, SPELUNKER_TABLE_NAME};
use crate::domain::Record;
use crate::error::{Result, StorageError};
use crate::infrastructure::Database;

pub const DEFAULT_SOURCE: &str = "unknown";

#[derive(Clone)]
pub struct SpelunkerTableOptions {
    pub index_alt_files: bool,
    /// Substitute `default_source` when the record has no `src:geom`
    pub allow_missing_source: bool,
    pub default_source: String,
    pub preparer: Arc<dyn DocumentPreparer>,
}

impl Default for SpelunkerTableOptions {
    fn default() -> Self {
        Self {
            index_alt_files: false,
            allow_missing_source: true,
            default_source: DEFAULT_SOURCE.to_string(),
            preparer: Arc::new(SpelunkerDocument),
        }
    }
}

impl fmt::Debug for SpelunkerTableOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpelunkerTableOptions")
            .field("index_alt_files", &self.index_alt_files)
            .field("allow_missing_source", &self.allow_missing_source)
            .field("default_source", &self.default_source)
            .finish_non_exhaustive()
    }
}

/// Composite browse document per record
#[derive(Debug, Clone, Default)]
pub struct SpelunkerTable {
    options: SpelunkerTableOptions,
}

impl SpelunkerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: SpelunkerTableOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Table for SpelunkerTable {
    fn name(&self) -> &str {
        SPELUNKER_TABLE_NAME
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

        let source = match record.source() {
            Ok(source) => source,
            Err(_) if self.options.allow_missing_source => self.options.default_source.clone(),
            Err(e) => return Err(StorageError::missing_property(name, "source", e)),
        };

        let alt_label = record
            .alt_label()
            .map_err(|e| StorageError::missing_property(name, "alt label", e))?;

        let lastmod = record.last_modified();

        let doc = self.options.preparer.prepare(record)?;
        let body = serde_json::to_string(&doc).map_err(|e| {
            StorageError::document(name, "Failed to encode spelunker document").with_source(e)
        })?;

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::tables::testing;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    struct FixedDocument;

    impl DocumentPreparer for FixedDocument {
        fn prepare(&self, _record: &Record) -> Result<Value> {
            Ok(json!({ "fixed": true }))
        }
    }

    struct FailingDocument;

    impl DocumentPreparer for FailingDocument {
        fn prepare(&self, _record: &Record) -> Result<Value> {
            Err(StorageError::document(SPELUNKER_TABLE_NAME, "no document for you"))
        }
    }

    #[tokio::test]
    async fn test_idempotent_upsert() {
        let table = SpelunkerTable::new();
        let db = testing::database_with(&table).await;
        let ctx = CancellationToken::new();
        let record = testing::locality(85922583);

        table.index_record(&ctx, &db, &record).await.unwrap();
        table.index_record(&ctx, &db, &record).await.unwrap();

        assert_eq!(db.count_rows("spelunker").unwrap(), 1);

        let body = testing::column(&db, "SELECT body FROM spelunker");
        let doc: Value = serde_json::from_str(&body[0]).unwrap();
        assert_eq!(doc["wof:id"], json!(85922583));
        assert_eq!(doc["counts:concordances_total"], json!(2));
    }

    #[tokio::test]
    async fn test_missing_source_falls_back() {
        let table = SpelunkerTable::with_options(SpelunkerTableOptions {
            default_source: "mapzen".to_string(),
            ..Default::default()
        });
        let db = testing::database_with(&table).await;

        table
            .index_record(&CancellationToken::new(), &db, &testing::feature(json!({ "wof:id": 9 })))
            .await
            .unwrap();

        let source = testing::column(&db, "SELECT source FROM spelunker WHERE id = 9");
        assert_eq!(source, vec!["mapzen".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_source_rejected() {
        let table = SpelunkerTable::with_options(SpelunkerTableOptions {
            allow_missing_source: false,
            ..Default::default()
        });
        let db = testing::database_with(&table).await;

        let err = table
            .index_record(&CancellationToken::new(), &db, &testing::feature(json!({ "wof:id": 9 })))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::MissingProperty);
        assert!(err.to_string().contains("'source'"));
        assert_eq!(db.count_rows("spelunker").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_custom_preparer() {
        let table = SpelunkerTable::with_options(SpelunkerTableOptions {
            preparer: Arc::new(FixedDocument),
            ..Default::default()
        });
        let db = testing::database_with(&table).await;

        table
            .index_record(&CancellationToken::new(), &db, &testing::locality(1))
            .await
            .unwrap();

        let body = testing::column(&db, "SELECT body FROM spelunker");
        assert_eq!(body, vec![r#"{"fixed":true}"#.to_string()]);
    }

    #[tokio::test]
    async fn test_preparer_failure_writes_nothing() {
        let table = SpelunkerTable::with_options(SpelunkerTableOptions {
            preparer: Arc::new(FailingDocument),
            ..Default::default()
        });
        let db = testing::database_with(&table).await;

        let err = table
            .index_record(&CancellationToken::new(), &db, &testing::locality(1))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Document);
        assert_eq!(db.count_rows("spelunker").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_alt_rows_kept_apart_when_enabled() {
        let table = SpelunkerTable::with_options(SpelunkerTableOptions {
            index_alt_files: true,
            ..Default::default()
        });
        let db = testing::database_with(&table).await;
        let ctx = CancellationToken::new();

        table.index_record(&ctx, &db, &testing::locality(1)).await.unwrap();
        table
            .index_record(&ctx, &db, &testing::locality(1).with_alt_label("mz"))
            .await
            .unwrap();

        let labels = testing::column(&db, "SELECT alt_label FROM spelunker ORDER BY alt_label");
        assert_eq!(labels, vec!["".to_string(), "mz".to_string()]);
    }
}
