//! Wiring for one indexing run

use std::sync::Arc;

use gazetteer_storage::{Database, SchemaRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::IndexConfig;
use crate::engine::{IndexSummary, Indexer};
use crate::error::Result;
use crate::loader::FeatureLoader;
use crate::relations::{FsReader, RelationsHook};

/// Run `config` against the built-in schemas
pub async fn run(ctx: &CancellationToken, config: &IndexConfig) -> Result<IndexSummary> {
    run_with_registry(ctx, config, &SchemaRegistry::builtin()).await
}

/// Run `config`, taking table DDL from `registry`
///
/// Configuration problems, including an unsupported driver, fail before the
/// database is opened. `PRAGMA optimize` runs when requested even if the run
/// itself failed.
pub async fn run_with_registry(
    ctx: &CancellationToken,
    config: &IndexConfig,
    registry: &SchemaRegistry,
) -> Result<IndexSummary> {
    config.validate()?;

    let db = Database::open_uri(&config.database)?;
    let tables = config.build_tables();
    let loader = Arc::new(FeatureLoader::new(config.strict_alt_files));

    let mut indexer = Indexer::new(ctx, db.clone(), registry, tables, loader)
        .await?
        .with_options(config.indexer_options());

    if let Some(root) = &config.relations_root {
        info!("Indexing relations from {}", root.display());
        let reader = Arc::new(FsReader::new(root));
        indexer = indexer.with_hook(Arc::new(RelationsHook::new(reader)));
    }

    let outcome = indexer
        .index_stream(ctx, &config.iterator, &config.paths)
        .await;

    if config.optimize {
        if let Err(e) = db.optimize() {
            error!("Failed to optimize: {}", e);
        }
    }

    outcome
}
