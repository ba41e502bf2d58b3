//! Indexing engine
//!
//! The engine owns the database handle and the ordered table list. Loading a
//! record runs concurrently across source workers; everything after that
//! (table writes, timing updates, the post-index hook) happens under a single
//! write lock, so no two records are ever mid-write at once.
//!
//! Each table commits its own transaction. A record that fails half way
//! through the table list keeps the rows already committed by earlier tables.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use gazetteer_storage::{Database, Record, SchemaRegistry, Table};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{IndexerError, Result};
use crate::pipeline::{PostIndexHook, RecordCallback, RecordLoader, RecordSource};
use crate::sources;
use crate::timings::{TableTimings, TimingReporter, DEFAULT_REPORT_INTERVAL};

/// What happens to the run when one record fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the run on the first failing record
    #[default]
    FailFast,
    /// Record the failure and move on to the next record
    Continue,
}

#[derive(Debug, Clone)]
pub struct IndexerOptions {
    /// Accumulate per-table write time and report it periodically
    pub timings: bool,
    pub timings_interval: Duration,
    pub failure_policy: FailurePolicy,
    /// Concurrent workers for sources resolved by [`Indexer::index_stream`]
    pub workers: usize,
}

impl Default for IndexerOptions {
    fn default() -> Self {
        Self {
            timings: false,
            timings_interval: DEFAULT_REPORT_INTERVAL,
            failure_policy: FailurePolicy::FailFast,
            workers: default_workers(),
        }
    }
}

/// 75% of cores, at least one
pub fn default_workers() -> usize {
    (num_cpus::get() * 3 / 4).max(1)
}

/// One record that failed under [`FailurePolicy::Continue`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFailure {
    pub path: String,
    pub table: Option<String>,
    pub message: String,
}

/// Outcome of one indexing run
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexSummary {
    /// Documents delivered by the source
    pub seen: usize,
    /// Records written to every table
    pub indexed: usize,
    /// Documents the loader skipped on purpose
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<RecordFailure>,
    pub elapsed: Duration,
    /// Cumulative per-table write time (empty unless timings are enabled)
    pub table_timings: Vec<(String, Duration)>,
}

impl IndexSummary {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Default)]
struct RunStats {
    seen: Arc<AtomicUsize>,
    indexed: AtomicUsize,
    skipped: AtomicUsize,
    failures: Mutex<Vec<RecordFailure>>,
}

/// Applies every configured table to each record a source delivers
pub struct Indexer {
    db: Database,
    tables: Vec<Arc<dyn Table>>,
    loader: Arc<dyn RecordLoader>,
    hook: Option<Arc<dyn PostIndexHook>>,
    options: IndexerOptions,
    /// Write lock for the whole per-record write phase, guarding the timings it updates
    timings: Arc<RwLock<TableTimings>>,
}

impl Indexer {
    /// Build an engine and initialize every table
    ///
    /// Fails with `NoTablesConfigured` for an empty table list, and with the
    /// storage error of the first table that cannot be created.
    pub async fn new(
        ctx: &CancellationToken,
        db: Database,
        registry: &SchemaRegistry,
        tables: Vec<Arc<dyn Table>>,
        loader: Arc<dyn RecordLoader>,
    ) -> Result<Self> {
        if tables.is_empty() {
            return Err(IndexerError::NoTablesConfigured);
        }

        for table in &tables {
            table.initialize_table(ctx, &db, registry).await?;
            debug!("Initialized {} table", table.name());
        }

        Ok(Self {
            db,
            tables,
            loader,
            hook: None,
            options: IndexerOptions::default(),
            timings: Arc::new(RwLock::new(TableTimings::new())),
        })
    }

    pub fn with_hook(mut self, hook: Arc<dyn PostIndexHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn with_options(mut self, options: IndexerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn tables(&self) -> &[Arc<dyn Table>] {
        &self.tables
    }

    pub fn options(&self) -> &IndexerOptions {
        &self.options
    }

    /// Snapshot of the cumulative per-table timings
    pub async fn timings(&self) -> TableTimings {
        self.timings.read().await.clone()
    }

    /// Resolve `source_uri` to an iteration source and index every record it yields
    pub async fn index_stream(
        &self,
        ctx: &CancellationToken,
        source_uri: &str,
        paths: &[String],
    ) -> Result<IndexSummary> {
        let source = sources::source_for(source_uri, self.options.workers)?;
        self.index_source(ctx, source.as_ref(), paths).await
    }

    /// Index every record `source` yields for `paths`
    pub async fn index_source(
        &self,
        ctx: &CancellationToken,
        source: &dyn RecordSource,
        paths: &[String],
    ) -> Result<IndexSummary> {
        let started = Instant::now();
        let stats = RunStats::default();

        let reporter = self.options.timings.then(|| {
            TimingReporter::spawn(
                ctx,
                self.timings.clone(),
                stats.seen.clone(),
                self.options.timings_interval,
            )
        });

        info!("Indexing {} path(s) from {} source", paths.len(), source.kind());

        let callback = EngineCallback {
            indexer: self,
            stats: &stats,
        };
        let outcome = source.iterate(ctx, paths, &callback).await;

        if let Some(reporter) = reporter {
            reporter.stop().await;
        }

        outcome?;

        let failures = std::mem::take(&mut *stats.failures.lock());
        let table_timings = if self.options.timings {
            self.timings
                .read()
                .await
                .iter()
                .map(|(name, d)| (name.to_string(), d))
                .collect()
        } else {
            Vec::new()
        };

        let summary = IndexSummary {
            seen: stats.seen.load(Ordering::Relaxed),
            indexed: stats.indexed.load(Ordering::Relaxed),
            skipped: stats.skipped.load(Ordering::Relaxed),
            failed: failures.len(),
            failures,
            elapsed: started.elapsed(),
            table_timings,
        };

        info!(
            "Indexed {} of {} record(s) ({} skipped, {} failed) in {:?}",
            summary.indexed, summary.seen, summary.skipped, summary.failed, summary.elapsed
        );

        Ok(summary)
    }

    /// Write one record to every table in order, then run the hook
    ///
    /// Stops at the first table error; tables earlier in the list keep what
    /// they committed.
    pub async fn index_record(&self, ctx: &CancellationToken, record: &Record) -> Result<()> {
        let path = record.path().unwrap_or("-");

        let mut timings = self.timings.write().await;
        let mut elapsed = Vec::with_capacity(self.tables.len());

        for table in &self.tables {
            let started = Instant::now();

            if let Err(source) = table.index_record(ctx, &self.db, record).await {
                error!(path, table = table.name(), "Failed to index feature: {}", source);
                return Err(IndexerError::IndexRecord {
                    path: path.to_string(),
                    source,
                });
            }

            elapsed.push((table.name(), started.elapsed()));
        }

        if self.options.timings {
            for (name, d) in elapsed {
                timings.add(name, d);
            }
        }

        if let Some(hook) = &self.hook {
            if let Err(e) = hook.after_index(ctx, &self.db, &self.tables, record).await {
                error!(path, "Post-index hook failed: {}", e);
                return Err(IndexerError::PostIndex {
                    path: path.to_string(),
                    source: Box::new(e),
                });
            }
        }

        Ok(())
    }
}

struct EngineCallback<'a> {
    indexer: &'a Indexer,
    stats: &'a RunStats,
}

impl EngineCallback<'_> {
    fn handle_failure(&self, path: &str, err: IndexerError) -> Result<()> {
        if err.is_cancelled() || self.indexer.options.failure_policy == FailurePolicy::FailFast {
            return Err(err);
        }

        warn!(path, "Skipping record after failure: {}", err);
        self.stats.failures.lock().push(RecordFailure {
            path: path.to_string(),
            table: err.table().map(str::to_string),
            message: err.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl RecordCallback for EngineCallback<'_> {
    async fn on_record(&self, ctx: &CancellationToken, path: &str, content: Vec<u8>) -> Result<()> {
        if ctx.is_cancelled() {
            return Err(IndexerError::Cancelled);
        }

        self.stats.seen.fetch_add(1, Ordering::Relaxed);

        let record = match self.indexer.loader.load(ctx, path, &content).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(path, "Loader skipped record");
                self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
            Err(e) => {
                error!(path, "Failed to load record: {}", e);
                return self.handle_failure(path, e);
            }
        };

        let record = if record.path().is_none() {
            record.with_path(path)
        } else {
            record
        };

        match self.indexer.index_record(ctx, &record).await {
            Ok(()) => {
                self.stats.indexed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => self.handle_failure(path, e),
        }
    }

    async fn on_read_error(&self, _ctx: &CancellationToken, path: &str, err: IndexerError) -> Result<()> {
        self.stats.seen.fetch_add(1, Ordering::Relaxed);
        error!(path, "Failed to read record: {}", err);
        self.handle_failure(path, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::FeatureLoader;
    use gazetteer_storage::{AncestorsTable, PropertiesTable, StorageError};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Delivers a fixed list of (path, document) pairs, one at a time
    struct VecSource(Vec<(String, serde_json::Value)>);

    #[async_trait]
    impl RecordSource for VecSource {
        fn kind(&self) -> &str {
            "vec"
        }

        async fn iterate(
            &self,
            ctx: &CancellationToken,
            _paths: &[String],
            callback: &dyn RecordCallback,
        ) -> Result<()> {
            for (path, doc) in &self.0 {
                let content = serde_json::to_vec(doc).map_err(IndexerError::iteration)?;
                callback.on_record(ctx, path, content).await?;
            }
            Ok(())
        }
    }

    struct FailingTable;

    #[async_trait]
    impl Table for FailingTable {
        fn name(&self) -> &str {
            "failing"
        }

        async fn initialize_table(
            &self,
            _ctx: &CancellationToken,
            _db: &Database,
            _registry: &SchemaRegistry,
        ) -> gazetteer_storage::Result<()> {
            Ok(())
        }

        async fn index_record(
            &self,
            _ctx: &CancellationToken,
            _db: &Database,
            _record: &Record,
        ) -> gazetteer_storage::Result<()> {
            Err(StorageError::document("failing", "always fails"))
        }
    }

    struct CountingHook(AtomicUsize);

    #[async_trait]
    impl PostIndexHook for CountingHook {
        async fn after_index(
            &self,
            _ctx: &CancellationToken,
            _db: &Database,
            _tables: &[Arc<dyn Table>],
            _record: &Record,
        ) -> Result<()> {
            self.0.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    struct FailingHook;

    #[async_trait]
    impl PostIndexHook for FailingHook {
        async fn after_index(
            &self,
            _ctx: &CancellationToken,
            _db: &Database,
            _tables: &[Arc<dyn Table>],
            _record: &Record,
        ) -> Result<()> {
            Err(IndexerError::iteration("related record unavailable"))
        }
    }

    fn feature(id: i64, county_id: i64) -> serde_json::Value {
        json!({
            "type": "Feature",
            "properties": {
                "wof:id": id,
                "wof:placetype": "locality",
                "wof:hierarchy": [{ "county_id": county_id }]
            },
            "geometry": { "type": "Point", "coordinates": [0.0, 0.0] }
        })
    }

    async fn indexer(tables: Vec<Arc<dyn Table>>) -> Result<Indexer> {
        Indexer::new(
            &CancellationToken::new(),
            Database::in_memory().unwrap(),
            &SchemaRegistry::builtin(),
            tables,
            Arc::new(FeatureLoader::default()),
        )
        .await
    }

    #[tokio::test]
    async fn test_no_tables_configured() {
        let err = indexer(Vec::new()).await.err().unwrap();
        assert!(matches!(err, IndexerError::NoTablesConfigured));
    }

    #[tokio::test]
    async fn test_new_initializes_tables() {
        let idx = indexer(vec![Arc::new(PropertiesTable::new()), Arc::new(AncestorsTable::new())])
            .await
            .unwrap();

        let names = idx.database().table_names().unwrap();
        assert!(names.contains("properties"));
        assert!(names.contains("ancestors"));
    }

    #[tokio::test]
    async fn test_index_source_counts() {
        let hook = Arc::new(CountingHook(AtomicUsize::new(0)));
        let idx = indexer(vec![Arc::new(PropertiesTable::new()), Arc::new(AncestorsTable::new())])
            .await
            .unwrap()
            .with_hook(hook.clone());

        let source = VecSource(vec![
            ("101.geojson".to_string(), feature(101, 55)),
            ("102.geojson".to_string(), feature(102, 55)),
            ("fc.geojson".to_string(), json!({ "type": "FeatureCollection", "features": [] })),
        ]);

        let summary = idx
            .index_source(&CancellationToken::new(), &source, &[])
            .await
            .unwrap();

        assert_eq!(summary.seen, 3);
        assert_eq!(summary.indexed, 2);
        assert_eq!(summary.skipped, 1);
        assert!(summary.is_clean());
        assert_eq!(hook.0.load(Ordering::Relaxed), 2);
        assert_eq!(idx.database().count_rows("properties").unwrap(), 2);
        assert_eq!(idx.database().count_rows("ancestors").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_fail_fast_keeps_earlier_tables() {
        let idx = indexer(vec![Arc::new(PropertiesTable::new()), Arc::new(FailingTable)])
            .await
            .unwrap();

        let source = VecSource(vec![
            ("101.geojson".to_string(), feature(101, 55)),
            ("102.geojson".to_string(), feature(102, 55)),
        ]);

        let err = idx
            .index_source(&CancellationToken::new(), &source, &[])
            .await
            .unwrap_err();

        match err {
            IndexerError::IndexRecord { ref path, ref source } => {
                assert_eq!(path, "101.geojson");
                assert_eq!(source.table.as_deref(), Some("failing"));
            }
            other => panic!("unexpected error: {}", other),
        }

        // properties committed before the failing table ran; the second record never did
        assert_eq!(idx.database().count_rows("properties").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_continue_policy_reports_failures() {
        let idx = indexer(vec![Arc::new(PropertiesTable::new())])
            .await
            .unwrap()
            .with_options(IndexerOptions {
                failure_policy: FailurePolicy::Continue,
                ..Default::default()
            });

        let source = VecSource(vec![
            ("101.geojson".to_string(), feature(101, 55)),
            (
                "noid.geojson".to_string(),
                json!({ "type": "Feature", "properties": {}, "geometry": null }),
            ),
            ("102.geojson".to_string(), feature(102, 55)),
        ]);

        let summary = idx
            .index_source(&CancellationToken::new(), &source, &[])
            .await
            .unwrap();

        assert_eq!(summary.indexed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].path, "noid.geojson");
        assert_eq!(summary.failures[0].table.as_deref(), Some("properties"));
        assert!(summary.failures[0].message.contains("'id'"));
    }

    #[tokio::test]
    async fn test_cancelled_run_is_fatal_under_continue() {
        let idx = indexer(vec![Arc::new(PropertiesTable::new())])
            .await
            .unwrap()
            .with_options(IndexerOptions {
                failure_policy: FailurePolicy::Continue,
                ..Default::default()
            });

        let ctx = CancellationToken::new();
        ctx.cancel();

        let source = VecSource(vec![("101.geojson".to_string(), feature(101, 55))]);
        let err = idx.index_source(&ctx, &source, &[]).await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(idx.database().count_rows("properties").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_timings_accumulate_when_enabled() {
        let idx = indexer(vec![Arc::new(PropertiesTable::new()), Arc::new(AncestorsTable::new())])
            .await
            .unwrap()
            .with_options(IndexerOptions {
                timings: true,
                ..Default::default()
            });

        let source = VecSource(vec![("101.geojson".to_string(), feature(101, 55))]);
        let summary = idx
            .index_source(&CancellationToken::new(), &source, &[])
            .await
            .unwrap();

        let names: Vec<&str> = summary.table_timings.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["ancestors", "properties"]);
        assert!(idx.timings().await.get("properties").is_some());
    }

    #[tokio::test]
    async fn test_hook_failure_fails_fast() {
        let idx = indexer(vec![Arc::new(PropertiesTable::new())])
            .await
            .unwrap()
            .with_hook(Arc::new(FailingHook));

        let source = VecSource(vec![
            ("101.geojson".to_string(), feature(101, 55)),
            ("102.geojson".to_string(), feature(102, 55)),
        ]);

        let err = idx
            .index_source(&CancellationToken::new(), &source, &[])
            .await
            .unwrap_err();

        match err {
            IndexerError::PostIndex { ref path, ref source } => {
                assert_eq!(path, "101.geojson");
                assert!(matches!(**source, IndexerError::Iteration(_)));
            }
            other => panic!("unexpected error: {}", other),
        }

        // the tables committed before the hook ran
        assert_eq!(idx.database().count_rows("properties").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_hook_failure_under_continue() {
        let idx = indexer(vec![Arc::new(PropertiesTable::new())])
            .await
            .unwrap()
            .with_hook(Arc::new(FailingHook))
            .with_options(IndexerOptions {
                failure_policy: FailurePolicy::Continue,
                ..Default::default()
            });

        let source = VecSource(vec![
            ("101.geojson".to_string(), feature(101, 55)),
            ("102.geojson".to_string(), feature(102, 55)),
        ]);

        let summary = idx
            .index_source(&CancellationToken::new(), &source, &[])
            .await
            .unwrap();

        assert_eq!(summary.seen, 2);
        assert_eq!(summary.indexed, 0);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.failures[0].path, "101.geojson");
        assert!(summary.failures[0].message.contains("related record unavailable"));
    }

    #[tokio::test]
    async fn test_unreadable_file_under_continue() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("101.geojson");
        std::fs::write(&good, serde_json::to_vec(&feature(101, 55)).unwrap()).unwrap();
        let missing = dir.path().join("gone.geojson");

        let idx = indexer(vec![Arc::new(PropertiesTable::new())])
            .await
            .unwrap()
            .with_options(IndexerOptions {
                failure_policy: FailurePolicy::Continue,
                workers: 1,
                ..Default::default()
            });

        let paths = vec![
            missing.to_string_lossy().to_string(),
            good.to_string_lossy().to_string(),
        ];
        let summary = idx
            .index_stream(&CancellationToken::new(), "files://", &paths)
            .await
            .unwrap();

        assert_eq!(summary.seen, 2);
        assert_eq!(summary.indexed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].path, paths[0]);
        assert!(summary.failures[0].table.is_none());

        let idx = indexer(vec![Arc::new(PropertiesTable::new())]).await.unwrap();
        let err = idx
            .index_stream(&CancellationToken::new(), "files://", &paths)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::Iteration(_)));
    }
}
