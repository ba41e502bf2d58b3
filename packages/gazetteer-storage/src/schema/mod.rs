//! Schema repository and table lifecycle
//!
//! [`SchemaRegistry`] maps `(driver, table name)` to DDL text. It is built once
//! and handed to whoever initializes tables; there is no global lookup.
//! [`lifecycle`] is the only code that executes DDL.

pub mod lifecycle;

pub use lifecycle::{create_table_if_necessary, create_tables_if_necessary};

use std::collections::HashMap;

use crate::error::{Result, StorageError};
use crate::infrastructure::Driver;
use crate::tables::{
    ANCESTORS_TABLE_NAME, CONCORDANCES_TABLE_NAME, GEOJSON_TABLE_NAME, GEOMETRIES_TABLE_NAME,
    NAMES_TABLE_NAME, PROPERTIES_TABLE_NAME, RTREE_TABLE_NAME, SEARCH_TABLE_NAME, SPELUNKER_TABLE_NAME,
    SPR_TABLE_NAME, SUPERSEDES_TABLE_NAME,
};

const SQLITE_SCHEMAS: &[(&str, &str)] = &[
    (ANCESTORS_TABLE_NAME, include_str!("sqlite/ancestors.schema")),
    (CONCORDANCES_TABLE_NAME, include_str!("sqlite/concordances.schema")),
    (GEOJSON_TABLE_NAME, include_str!("sqlite/geojson.schema")),
    (GEOMETRIES_TABLE_NAME, include_str!("sqlite/geometries.schema")),
    (NAMES_TABLE_NAME, include_str!("sqlite/names.schema")),
    (PROPERTIES_TABLE_NAME, include_str!("sqlite/properties.schema")),
    (RTREE_TABLE_NAME, include_str!("sqlite/rtree.schema")),
    (SEARCH_TABLE_NAME, include_str!("sqlite/search.schema")),
    (SPELUNKER_TABLE_NAME, include_str!("sqlite/spelunker.schema")),
    (SPR_TABLE_NAME, include_str!("sqlite/spr.schema")),
    (SUPERSEDES_TABLE_NAME, include_str!("sqlite/supersedes.schema")),
];

/// DDL text keyed by (driver, table name)
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<(Driver, String), String>,
}

impl SchemaRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the DDL for every table this crate ships
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for (table, ddl) in SQLITE_SCHEMAS {
            registry.register(Driver::Sqlite, *table, *ddl);
        }
        registry
    }

    /// Add or replace the DDL for one table
    pub fn register(
        &mut self,
        driver: Driver,
        table: impl Into<String>,
        ddl: impl Into<String>,
    ) -> &mut Self {
        self.schemas.insert((driver, table.into()), ddl.into());
        self
    }

    /// Builder-style [`register`](Self::register)
    pub fn with_schema(mut self, driver: Driver, table: impl Into<String>, ddl: impl Into<String>) -> Self {
        self.register(driver, table, ddl);
        self
    }

    pub fn lookup(&self, driver: Driver, table: &str) -> Result<&str> {
        self.schemas
            .get(&(driver, table.to_string()))
            .map(String::as_str)
            .ok_or_else(|| StorageError::schema_not_found(driver.as_str(), table))
    }

    /// Lookup by driver name; unknown names fail with `UnsupportedDriver`
    pub fn lookup_by_name(&self, driver: &str, table: &str) -> Result<&str> {
        let driver: Driver = driver.parse()?;
        self.lookup(driver, table)
    }

    /// Table names with DDL registered for `driver`, sorted
    pub fn tables(&self, driver: Driver) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .schemas
            .keys()
            .filter(|(d, _)| *d == driver)
            .map(|(_, name)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}
