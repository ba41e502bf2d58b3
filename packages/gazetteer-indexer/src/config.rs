//! Run configuration
//!
//! Loaded from YAML and then overridden by command line flags. Every field
//! has a default, so an empty document is a valid (if table-less) config.
//!
//! ```yaml
//! database: "sql://sqlite?dsn=gazetteer.db"
//! iterator: "directory://"
//! paths: ["/usr/local/data/whosonfirst-data-admin-us/data"]
//! tables:
//!   spelunker_tables: true
//! index_alt: ["properties"]
//! timings: true
//! failure_policy: continue
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use gazetteer_storage::tables::{
    GEOJSON_TABLE_NAME, GEOMETRIES_TABLE_NAME, PROPERTIES_TABLE_NAME, RTREE_TABLE_NAME,
    SPELUNKER_TABLE_NAME, SPR_TABLE_NAME,
};
use gazetteer_storage::{
    AncestorsTable, ConcordancesTable, ConnectionDescriptor, GeoJsonTable, GeoJsonTableOptions,
    GeometriesTable, GeometriesTableOptions, NamesTable, PropertiesTable, PropertiesTableOptions,
    RTreeTable, RTreeTableOptions, SearchTable, SpelunkerTable, SpelunkerTableOptions, SprTable,
    SprTableOptions, SupersedesTable, Table,
};
use serde::{Deserialize, Serialize};

use crate::engine::{default_workers, FailurePolicy, IndexerOptions};
use crate::error::{IndexerError, Result};
use crate::sources;

/// `index_alt` entry meaning every table that can hold alt records
pub const INDEX_ALT_ALL: &str = "*";

/// Which tables a run writes to
///
/// `all` selects every table except `geometries` and `search`. The first
/// needs SpatiaLite; both must be asked for by name or through a bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSelection {
    pub properties: bool,
    pub geometries: bool,
    pub geojson: bool,
    pub rtree: bool,
    pub spr: bool,
    pub names: bool,
    pub search: bool,
    pub ancestors: bool,
    pub concordances: bool,
    pub supersedes: bool,
    pub spelunker: bool,
    pub all: bool,
    /// rtree, geojson, properties and spr
    pub spatial_tables: bool,
    /// spr, spelunker, geojson, concordances, ancestors and search, with alt
    /// records in geojson
    pub spelunker_tables: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpelunkerConfig {
    pub allow_missing_source: bool,
    pub default_source: String,
}

impl Default for SpelunkerConfig {
    fn default() -> Self {
        Self {
            allow_missing_source: true,
            default_source: gazetteer_storage::tables::spelunker::DEFAULT_SOURCE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Connection descriptor, `sql://<driver>?dsn=<dsn>`
    pub database: String,
    /// Iterator descriptor, `<kind>://`
    pub iterator: String,
    pub paths: Vec<String>,
    pub tables: TableSelection,
    pub index_alt: Vec<String>,
    pub strict_alt_files: bool,
    pub timings: bool,
    pub timings_interval_secs: u64,
    pub failure_policy: FailurePolicy,
    pub workers: usize,
    /// Run `PRAGMA optimize` when the run ends
    pub optimize: bool,
    /// Data tree to read related records from; enables the relations hook
    pub relations_root: Option<PathBuf>,
    pub spelunker: SpelunkerConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            database: "sql://sqlite?dsn=gazetteer.db".to_string(),
            iterator: "directory://".to_string(),
            paths: Vec::new(),
            tables: TableSelection::default(),
            index_alt: Vec::new(),
            strict_alt_files: false,
            timings: false,
            timings_interval_secs: 60,
            failure_policy: FailurePolicy::FailFast,
            workers: default_workers(),
            optimize: false,
            relations_root: None,
            spelunker: SpelunkerConfig::default(),
        }
    }
}

impl IndexConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Check everything that can be checked before touching the database
    ///
    /// An unknown driver surfaces as the storage `UnsupportedDriver` error.
    pub fn validate(&self) -> Result<()> {
        self.database.parse::<ConnectionDescriptor>()?;
        sources::source_for(&self.iterator, self.workers)?;

        if self.workers == 0 {
            return Err(IndexerError::config("workers must be greater than zero"));
        }

        if self.timings && self.timings_interval_secs == 0 {
            return Err(IndexerError::config("timings_interval_secs must be greater than zero"));
        }

        let known = [
            GEOJSON_TABLE_NAME,
            GEOMETRIES_TABLE_NAME,
            PROPERTIES_TABLE_NAME,
            RTREE_TABLE_NAME,
            SPELUNKER_TABLE_NAME,
            SPR_TABLE_NAME,
            INDEX_ALT_ALL,
        ];
        for name in &self.index_alt {
            if !known.contains(&name.as_str()) {
                return Err(IndexerError::config(format!(
                    "'{}' cannot index alt files (expected one of {})",
                    name,
                    known.join(", ")
                )));
            }
        }

        Ok(())
    }

    pub fn indexer_options(&self) -> IndexerOptions {
        IndexerOptions {
            timings: self.timings,
            timings_interval: Duration::from_secs(self.timings_interval_secs),
            failure_policy: self.failure_policy,
            workers: self.workers,
        }
    }

    fn index_alt(&self, table: &str) -> bool {
        self.index_alt
            .iter()
            .any(|name| name == table || name == INDEX_ALT_ALL)
    }

    /// Instantiate the selected tables, in write order
    pub fn build_tables(&self) -> Vec<Arc<dyn Table>> {
        let sel = &self.tables;
        let spatial = sel.spatial_tables;
        let spelunker_bundle = sel.spelunker_tables;

        let mut tables: Vec<Arc<dyn Table>> = Vec::new();

        if sel.geojson || sel.all || spatial || spelunker_bundle {
            tables.push(Arc::new(GeoJsonTable::with_options(GeoJsonTableOptions {
                index_alt_files: spelunker_bundle || self.index_alt(GEOJSON_TABLE_NAME),
            })));
        }

        if sel.supersedes || sel.all {
            tables.push(Arc::new(SupersedesTable::new()));
        }

        if sel.rtree || sel.all || spatial {
            tables.push(Arc::new(RTreeTable::with_options(RTreeTableOptions {
                index_alt_files: self.index_alt(RTREE_TABLE_NAME),
            })));
        }

        if sel.properties || sel.all || spatial {
            tables.push(Arc::new(PropertiesTable::with_options(PropertiesTableOptions {
                index_alt_files: self.index_alt(PROPERTIES_TABLE_NAME),
            })));
        }

        if sel.spr || sel.all || spatial || spelunker_bundle {
            tables.push(Arc::new(SprTable::with_options(SprTableOptions {
                index_alt_files: self.index_alt(SPR_TABLE_NAME),
            })));
        }

        if sel.spelunker || sel.all || spelunker_bundle {
            tables.push(Arc::new(SpelunkerTable::with_options(SpelunkerTableOptions {
                index_alt_files: self.index_alt(SPELUNKER_TABLE_NAME),
                allow_missing_source: self.spelunker.allow_missing_source,
                default_source: self.spelunker.default_source.clone(),
                ..Default::default()
            })));
        }

        if sel.names || sel.all {
            tables.push(Arc::new(NamesTable::new()));
        }

        if sel.ancestors || sel.all || spelunker_bundle {
            tables.push(Arc::new(AncestorsTable::new()));
        }

        if sel.concordances || sel.all || spelunker_bundle {
            tables.push(Arc::new(ConcordancesTable::new()));
        }

        if sel.geometries {
            tables.push(Arc::new(GeometriesTable::with_options(GeometriesTableOptions {
                index_alt_files: self.index_alt(GEOMETRIES_TABLE_NAME),
            })));
        }

        if sel.search || spelunker_bundle {
            tables.push(Arc::new(SearchTable::new()));
        }

        tables
    }
}
