//! Gazetteer indexer: streams feature records into SQLite tables
//!
//! ## Pipeline
//!
//! ```text
//! RecordSource ──▶ RecordLoader ──▶ [write lock] Table₁ … Tableₙ ──▶ PostIndexHook
//!  (concurrent)     (concurrent)         (serialized)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gazetteer_indexer::{app, IndexConfig};
//!
//! let mut config = IndexConfig::from_yaml_file("index.yaml")?;
//! config.paths.push("/usr/local/data/whosonfirst-data-admin-us/data".into());
//!
//! let summary = app::run(&CancellationToken::new(), &config).await?;
//! println!("{} records indexed", summary.indexed);
//! ```

pub mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod relations;
pub mod sources;
pub mod timings;

pub use config::{IndexConfig, SpelunkerConfig, TableSelection};
pub use engine::{FailurePolicy, IndexSummary, Indexer, IndexerOptions, RecordFailure};
pub use error::{IndexerError, Result};
pub use loader::FeatureLoader;
pub use pipeline::{PostIndexHook, RecordCallback, RecordLoader, RecordSource};
pub use relations::{FsReader, RecordReader, RelationsHook};
pub use timings::{TableTimings, TimingReporter};
