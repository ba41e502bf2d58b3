//! Gazetteer index CLI
//!
//! # Usage
//!
//! ```bash
//! # Properties and ancestors for one repository
//! gazetteer-index --database 'sql://sqlite?dsn=us.db' --properties --ancestors \
//!     /usr/local/data/whosonfirst-data-admin-us/data
//!
//! # Everything a spelunker needs, settings from a file
//! gazetteer-index --config index.yaml --spelunker-tables --timings /usr/local/data/sfomuseum-data-architecture
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use gazetteer_indexer::{app, FailurePolicy, IndexConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gazetteer-index")]
#[command(about = "Index gazetteer feature records into SQLite tables", long_about = None)]
struct Cli {
    /// YAML run configuration; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Connection descriptor, e.g. sql://sqlite?dsn=gazetteer.db
    #[arg(long)]
    database: Option<String>,

    /// Iterator descriptor: directory://, files://, filelist://, featurecollection://
    #[arg(short, long)]
    iterator: Option<String>,

    #[arg(long)]
    properties: bool,

    /// Requires SpatiaLite
    #[arg(long)]
    geometries: bool,

    #[arg(long)]
    geojson: bool,

    #[arg(long)]
    rtree: bool,

    /// Standard places response summary rows
    #[arg(long)]
    spr: bool,

    #[arg(long)]
    names: bool,

    /// Full-text search over names
    #[arg(long)]
    search: bool,

    #[arg(long)]
    ancestors: bool,

    #[arg(long)]
    concordances: bool,

    #[arg(long)]
    supersedes: bool,

    #[arg(long)]
    spelunker: bool,

    /// Every table except geometries and search
    #[arg(long)]
    all: bool,

    /// rtree, geojson, properties and spr
    #[arg(long)]
    spatial_tables: bool,

    /// spr, spelunker, geojson, concordances, ancestors and search
    #[arg(long)]
    spelunker_tables: bool,

    /// Tables that should also index alt files ("*" for all of them)
    #[arg(long, value_delimiter = ',')]
    index_alt: Vec<String>,

    /// Fail alt files that do not carry src:alt_label
    #[arg(long)]
    strict_alt_files: bool,

    /// Report per-table timings while indexing
    #[arg(long)]
    timings: bool,

    /// Seconds between timing reports
    #[arg(long)]
    timings_interval: Option<u64>,

    /// Log failing records and keep going instead of stopping the run
    #[arg(long)]
    continue_on_error: bool,

    /// Concurrent readers (default: 75% of cores)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Run PRAGMA optimize when done
    #[arg(long)]
    optimize: bool,

    /// Data tree to read ancestors from; indexes them alongside each record
    #[arg(long)]
    relations_root: Option<PathBuf>,

    /// Fail spelunker records without src:geom instead of using the default source
    #[arg(long)]
    spelunker_require_source: bool,

    /// Source recorded for spelunker records without src:geom
    #[arg(long)]
    spelunker_default_source: Option<String>,

    /// Paths handed to the iterator
    paths: Vec<String>,
}

impl Cli {
    fn into_config(self) -> gazetteer_indexer::Result<IndexConfig> {
        let mut config = match &self.config {
            Some(path) => IndexConfig::from_yaml_file(path)?,
            None => IndexConfig::default(),
        };

        if let Some(database) = self.database {
            config.database = database;
        }
        if let Some(iterator) = self.iterator {
            config.iterator = iterator;
        }

        let tables = &mut config.tables;
        tables.properties |= self.properties;
        tables.geometries |= self.geometries;
        tables.geojson |= self.geojson;
        tables.rtree |= self.rtree;
        tables.spr |= self.spr;
        tables.names |= self.names;
        tables.search |= self.search;
        tables.ancestors |= self.ancestors;
        tables.concordances |= self.concordances;
        tables.supersedes |= self.supersedes;
        tables.spelunker |= self.spelunker;
        tables.all |= self.all;
        tables.spatial_tables |= self.spatial_tables;
        tables.spelunker_tables |= self.spelunker_tables;

        for name in self.index_alt {
            if !config.index_alt.contains(&name) {
                config.index_alt.push(name);
            }
        }

        config.strict_alt_files |= self.strict_alt_files;
        config.timings |= self.timings;
        config.optimize |= self.optimize;

        if let Some(secs) = self.timings_interval {
            config.timings_interval_secs = secs;
        }
        if self.continue_on_error {
            config.failure_policy = FailurePolicy::Continue;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.relations_root.is_some() {
            config.relations_root = self.relations_root;
        }
        if self.spelunker_require_source {
            config.spelunker.allow_missing_source = false;
        }
        if let Some(source) = self.spelunker_default_source {
            config.spelunker.default_source = source;
        }
        if !self.paths.is_empty() {
            config.paths = self.paths;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let ctx = CancellationToken::new();
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            interrupt.cancel();
        }
    });

    match app::run(&ctx, &config).await {
        Ok(summary) => {
            for failure in &summary.failures {
                warn!("Failed {}: {}", failure.path, failure.message);
            }
            info!(
                "Done: {} seen, {} indexed, {} skipped, {} failed in {:?}",
                summary.seen, summary.indexed, summary.skipped, summary.failed, summary.elapsed
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            match e.table() {
                Some(table) => error!(table, "Failed to index paths in {} mode: {}", config.iterator, e),
                None => error!("Failed to index paths in {} mode: {}", config.iterator, e),
            }
            ExitCode::FAILURE
        }
    }
}
