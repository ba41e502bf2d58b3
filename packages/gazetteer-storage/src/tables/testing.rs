//! Shared fixtures for table tests

use rusqlite::functions::FunctionFlags;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::{Table, GEOMETRIES_TABLE_NAME};
use crate::domain::Record;
use crate::infrastructure::{Database, Driver};
use crate::schema::SchemaRegistry;

/// Plain-SQLite stand-in for the SpatiaLite geometries schema
pub const PLAIN_GEOMETRIES_SCHEMA: &str = "
CREATE TABLE geometries (
	id INTEGER NOT NULL,
	type TEXT,
	is_alt BOOLEAN,
	alt_label TEXT,
	geom TEXT,
	lastmodified INTEGER
);
CREATE UNIQUE INDEX geometries_by_id ON geometries (id, alt_label);
";

/// In-memory database with a `GeomFromText` that returns its WKT argument
pub fn database() -> Database {
    let db = Database::in_memory().unwrap();
    db.connection()
        .create_scalar_function(
            "GeomFromText",
            2,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| ctx.get::<String>(0),
        )
        .unwrap();
    db
}

pub fn registry() -> SchemaRegistry {
    SchemaRegistry::builtin().with_schema(Driver::Sqlite, GEOMETRIES_TABLE_NAME, PLAIN_GEOMETRIES_SCHEMA)
}

/// Database with `table` already initialized
pub async fn database_with(table: &dyn Table) -> Database {
    let db = database();
    table
        .initialize_table(&CancellationToken::new(), &db, &registry())
        .await
        .unwrap();
    db
}

pub fn feature(props: Value) -> Record {
    Record::new(json!({
        "type": "Feature",
        "properties": props,
        "geometry": { "type": "Point", "coordinates": [-122.4194, 37.7749] }
    }))
}

pub fn locality(id: i64) -> Record {
    feature(json!({
        "wof:id": id,
        "wof:name": "San Francisco",
        "wof:placetype": "locality",
        "wof:lastmodified": 1700000000,
        "src:geom": "quattroshapes",
        "wof:hierarchy": [{ "locality_id": id, "county_id": 102087579, "country_id": 85633793 }],
        "wof:concordances": { "gn:id": 5391959, "wd:id": "Q62" }
    }))
}

/// Single-column query as strings, for row assertions
pub fn column(db: &Database, sql: &str) -> Vec<String> {
    let conn = db.connection();
    let mut stmt = conn.prepare(sql).unwrap();
    let values = stmt
        .query_map([], |row| {
            let value: rusqlite::types::Value = row.get(0)?;
            Ok(match value {
                rusqlite::types::Value::Null => "NULL".to_string(),
                rusqlite::types::Value::Integer(i) => i.to_string(),
                rusqlite::types::Value::Real(f) => f.to_string(),
                rusqlite::types::Value::Text(s) => s,
                rusqlite::types::Value::Blob(b) => format!("{:?}", b),
            })
        })
        .unwrap()
        .collect::<rusqlite::Result<Vec<_>>>()
        .unwrap();
    values
}
