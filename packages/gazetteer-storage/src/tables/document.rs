//! Composite browse documents for the spelunker table

use serde_json::{Map, Value};

use crate::domain::{properties, Record};
use crate::error::{Result, StorageError};

/// Builds the composite document stored for a record
pub trait DocumentPreparer: Send + Sync {
    fn prepare(&self, record: &Record) -> Result<Value>;
}

/// Flattened record properties plus derived browse fields
///
/// The document is the record's `properties` with the geometry left out and
/// these keys added or overwritten:
///
/// - `wof:id`
/// - `geom:type`
/// - `wof:belongsto` (every ancestor id, see [`Record::ancestor_ids`])
/// - `wof:concordances_sources`
/// - `counts:concordances_total`
/// - `counts:names_total` (number of `name:*` properties)
#[derive(Debug, Clone, Default)]
pub struct SpelunkerDocument;

const NAME_PREFIX: &str = "name:";

impl DocumentPreparer for SpelunkerDocument {
    fn prepare(&self, record: &Record) -> Result<Value> {
        let table = super::SPELUNKER_TABLE_NAME;

        let mut doc: Map<String, Value> = properties::properties(record.feature())
            .cloned()
            .ok_or_else(|| StorageError::document(table, "Feature has no properties"))?;

        let id = record
            .id()
            .map_err(|e| StorageError::missing_property(table, "id", e))?;

        let belongs_to = record
            .ancestor_ids()
            .map_err(|e| StorageError::missing_property(table, "belongs to", e))?;

        let concordances = record
            .concordances()
            .map_err(|e| StorageError::missing_property(table, "concordances", e))?;

        let names_total = doc.keys().filter(|k| k.starts_with(NAME_PREFIX)).count();

        doc.insert(properties::ID.to_string(), Value::from(id));
        doc.insert(properties::BELONGS_TO.to_string(), Value::from(belongs_to));
        doc.insert(
            "wof:concordances_sources".to_string(),
            Value::from(concordances.keys().cloned().collect::<Vec<_>>()),
        );
        doc.insert("counts:concordances_total".to_string(), Value::from(concordances.len()));
        doc.insert("counts:names_total".to_string(), Value::from(names_total));

        if let Ok(geom_type) = record.geometry_type() {
            doc.insert("geom:type".to_string(), Value::from(geom_type));
        }

        Ok(Value::Object(doc))
    }
}
