//! Gazetteer storage: records, tables and the SQLite backend
//!
//! A [`Record`] is one GeoJSON feature. Each [`Table`] projects records into
//! one relation. Tables get their DDL from a [`SchemaRegistry`] and write
//! through a shared [`Database`] handle.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gazetteer_storage::{Database, PropertiesTable, Record, SchemaRegistry, Table};
//!
//! let db = Database::open_uri("sql://sqlite?dsn=gazetteer.db")?;
//! let registry = SchemaRegistry::builtin();
//!
//! let table = PropertiesTable::new();
//! table.initialize_table(&ctx, &db, &registry).await?;
//!
//! let record = Record::from_slice(&bytes)?;
//! table.index_record(&ctx, &db, &record).await?;
//! ```

pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod schema;
pub mod tables;

pub use error::{ErrorKind, Result, StorageError};

pub use domain::{Hierarchy, LanguageTag, PropertyError, Record};
pub use infrastructure::{ConnectionDescriptor, Database, Driver};
pub use schema::SchemaRegistry;
pub use tables::{
    AncestorsTable, ConcordancesTable, DocumentPreparer, GeoJsonTable, GeoJsonTableOptions,
    GeometriesTable, GeometriesTableOptions, NamesTable, PropertiesTable, PropertiesTableOptions,
    RTreeTable, RTreeTableOptions, SearchTable, SpelunkerDocument, SpelunkerTable,
    SpelunkerTableOptions, SprTable, SprTableOptions, SupersedesTable, Table,
};
