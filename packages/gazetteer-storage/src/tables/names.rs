use async_trait::async_trait;
use rusqlite::params;
use tokio_util::sync::CancellationToken;

use super::{delete_by_id, execute, write_transaction, Table, NAMES_TABLE_NAME};
use crate::domain::names::LanguageTag;
use crate::domain::Record;
use crate::error::{Result, StorageError};
use crate::infrastructure::Database;

/// One row per name in every `name:<tag>` list, with the tag split into
/// its subtags
///
/// Alt records are never indexed here. Rows for a record id are replaced
/// wholesale on every write.
#[derive(Debug, Clone, Default)]
pub struct NamesTable;

impl NamesTable {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Table for NamesTable {
    fn name(&self) -> &str {
        NAMES_TABLE_NAME
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

        let country = record.country();
        let lastmod = record.last_modified();

        let names: Vec<(LanguageTag, Vec<String>)> = record
            .names()
            .into_iter()
            .map(|(tag, names)| (LanguageTag::parse(&tag), names))
            .collect();

        let insert = format!(
            "INSERT INTO {} (
                id, placetype, country, language, extlang, script, region,
                variant, extension, privateuse, name, lastmodified
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            name
        );

        write_transaction(ctx, db, name, |tx| {
            delete_by_id(tx, name, id)?;

            for (tag, values) in &names {
                for value in values {
                    execute(
                        tx,
                        name,
                        &insert,
                        params![
                            id,
                            placetype,
                            country,
                            tag.language,
                            tag.extlang,
                            tag.script,
                            tag.region,
                            tag.variant,
                            tag.extension,
                            tag.privateuse,
                            value,
                            lastmod,
                        ],
                    )?;
                }
            }

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
    use serde_json::json;

    fn montreal(names: serde_json::Value) -> Record {
        let mut props = json!({
            "wof:id": 101736545,
            "wof:placetype": "locality",
            "wof:country": "CA",
            "wof:name": "Montreal"
        });
        if let (Some(props), Some(names)) = (props.as_object_mut(), names.as_object()) {
            props.extend(names.clone());
        }
        testing::feature(props)
    }

    #[tokio::test]
    async fn test_one_row_per_name() {
        let table = NamesTable::new();
        let db = testing::database_with(&table).await;
        let ctx = CancellationToken::new();

        let record = montreal(json!({
            "name:fra_x_preferred": ["Montréal"],
            "name:eng_x_variant": ["Montreal", "Mtl"],
            "name:zho_hant_x_preferred": ["蒙特利爾"]
        }));
        table.index_record(&ctx, &db, &record).await.unwrap();

        let rows = testing::column(
            &db,
            "SELECT language || '|' || script || '|' || privateuse || '|' || name FROM names ORDER BY language, name",
        );
        assert_eq!(
            rows,
            vec![
                "eng||variant|Montreal".to_string(),
                "eng||variant|Mtl".to_string(),
                "fra||preferred|Montréal".to_string(),
                "zho|hant|preferred|蒙特利爾".to_string(),
            ]
        );

        let country = testing::column(&db, "SELECT DISTINCT country FROM names");
        assert_eq!(country, vec!["CA".to_string()]);
    }

    #[tokio::test]
    async fn test_reindex_replaces_names() {
        let table = NamesTable::new();
        let db = testing::database_with(&table).await;
        let ctx = CancellationToken::new();

        table
            .index_record(&ctx, &db, &montreal(json!({ "name:eng_x_variant": ["Montreal", "Mtl"] })))
            .await
            .unwrap();
        table
            .index_record(&ctx, &db, &montreal(json!({ "name:eng_x_preferred": ["Montreal"] })))
            .await
            .unwrap();

        let rows = testing::column(&db, "SELECT privateuse || '|' || name FROM names");
        assert_eq!(rows, vec!["preferred|Montreal".to_string()]);
    }

    #[tokio::test]
    async fn test_alt_records_skipped() {
        let table = NamesTable::new();
        let db = testing::database_with(&table).await;
        let ctx = CancellationToken::new();

        let alt = montreal(json!({ "name:eng_x_preferred": ["Montreal"] })).with_alt_label("mz");
        table.index_record(&ctx, &db, &alt).await.unwrap();

        assert_eq!(db.count_rows("names").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_placetype() {
        let table = NamesTable::new();
        let db = testing::database_with(&table).await;
        let ctx = CancellationToken::new();

        let record = testing::feature(json!({ "wof:id": 1, "name:eng_x_preferred": ["Null Island"] }));
        let err = table.index_record(&ctx, &db, &record).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::MissingProperty);
        assert_eq!(err.table.as_deref(), Some("names"));
        assert_eq!(db.count_rows("names").unwrap(), 0);
    }
}
