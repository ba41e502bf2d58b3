//! Post-index hook that pulls in related records
//!
//! After a record is written, every ancestor it names (hierarchy values and
//! `wof:belongsto`) is fetched through a [`RecordReader`] and written to the
//! same tables. Each ancestor is indexed at most once per hook instance; an
//! ancestor whose read or write fails is released and retried by the next
//! record that names it.

use std::collections::HashSet;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use gazetteer_storage::{Database, Record, StorageError, Table};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{IndexerError, Result};
use crate::loader::FeatureLoader;
use crate::pipeline::PostIndexHook;

const RELATIONS: &str = "relations";

/// Fetches a record by id
#[async_trait]
pub trait RecordReader: Send + Sync {
    /// `Ok(None)` when no record exists for `id`
    async fn read(&self, ctx: &CancellationToken, id: i64) -> Result<Option<Record>>;
}

/// Reads records from a data tree laid out as `123/456/7/1234567.geojson`
#[derive(Debug, Clone)]
pub struct FsReader {
    root: PathBuf,
    loader: FeatureLoader,
}

impl FsReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            loader: FeatureLoader::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, id: i64) -> PathBuf {
        self.root.join(id_to_path(id))
    }
}

#[async_trait]
impl RecordReader for FsReader {
    async fn read(&self, ctx: &CancellationToken, id: i64) -> Result<Option<Record>> {
        if ctx.is_cancelled() {
            return Err(IndexerError::Cancelled);
        }

        let path = self.path_for(id);
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        self.loader.load_bytes(&path.to_string_lossy(), &content)
    }
}

/// `1234567` -> `123/456/7/1234567.geojson`
pub fn id_to_path(id: i64) -> PathBuf {
    let digits = id.to_string();
    let mut path = PathBuf::new();

    for chunk in digits.as_bytes().chunks(3) {
        path.push(String::from_utf8_lossy(chunk).as_ref());
    }

    path.push(format!("{}.geojson", digits));
    path
}

/// Indexes the ancestors of every record into the active tables
pub struct RelationsHook {
    reader: Arc<dyn RecordReader>,
    seen: Mutex<HashSet<i64>>,
}

impl RelationsHook {
    pub fn new(reader: Arc<dyn RecordReader>) -> Self {
        Self {
            reader,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Claim `id` for this run; false if it was already claimed
    fn claim(&self, id: i64) -> bool {
        self.seen.lock().insert(id)
    }

    fn release(&self, id: i64) {
        self.seen.lock().remove(&id);
    }

    async fn index_related(
        &self,
        ctx: &CancellationToken,
        db: &Database,
        tables: &[Arc<dyn Table>],
        id: i64,
    ) -> Result<()> {
        let related = match self.reader.read(ctx, id).await? {
            Some(related) => related,
            None => {
                warn!("Related record {} not found, skipping", id);
                return Ok(());
            }
        };

        for table in tables {
            table.index_record(ctx, db, &related).await?;
        }

        debug!("Indexed related record {}", id);
        Ok(())
    }
}

#[async_trait]
impl PostIndexHook for RelationsHook {
    async fn after_index(
        &self,
        ctx: &CancellationToken,
        db: &Database,
        tables: &[Arc<dyn Table>],
        record: &Record,
    ) -> Result<()> {
        let ids = record
            .ancestor_ids()
            .map_err(|e| StorageError::missing_property(RELATIONS, "belongs to", e))?;

        for id in ids {
            if !self.claim(id) {
                continue;
            }

            if let Err(e) = self.index_related(ctx, db, tables, id).await {
                self.release(id);
                return Err(e);
            }
        }

        Ok(())
    }
}
