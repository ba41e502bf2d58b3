//! Contracts between the engine and its collaborators
//!
//! An iteration source enumerates raw documents and hands each one to a
//! [`RecordCallback`]. The engine's callback turns content into a
//! [`Record`] through a [`RecordLoader`], writes it to every table and then
//! runs the optional [`PostIndexHook`].

use std::sync::Arc;

use async_trait::async_trait;
use gazetteer_storage::{Database, Record, Table};
use tokio_util::sync::CancellationToken;

use crate::error::{IndexerError, Result};

/// Per-document callback driven by a [`RecordSource`]
///
/// Sources may call this from several workers at once.
#[async_trait]
pub trait RecordCallback: Send + Sync {
    async fn on_record(&self, ctx: &CancellationToken, path: &str, content: Vec<u8>) -> Result<()>;

    /// A document the source could not read; returning `Ok` keeps the source going
    async fn on_read_error(&self, _ctx: &CancellationToken, _path: &str, err: IndexerError) -> Result<()> {
        Err(err)
    }
}

/// Enumerates documents for a set of path arguments
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Source kind, as named in an iterator descriptor
    fn kind(&self) -> &str;

    /// Deliver every document to `callback`, stopping at the first error
    async fn iterate(
        &self,
        ctx: &CancellationToken,
        paths: &[String],
        callback: &dyn RecordCallback,
    ) -> Result<()>;
}

/// Turns raw content into a record
///
/// `Ok(None)` means the document was skipped on purpose.
#[async_trait]
pub trait RecordLoader: Send + Sync {
    async fn load(&self, ctx: &CancellationToken, path: &str, content: &[u8]) -> Result<Option<Record>>;
}

/// Runs after every table has accepted a record, under the engine write lock
#[async_trait]
pub trait PostIndexHook: Send + Sync {
    async fn after_index(
        &self,
        ctx: &CancellationToken,
        db: &Database,
        tables: &[Arc<dyn Table>],
        record: &Record,
    ) -> Result<()>;
}
