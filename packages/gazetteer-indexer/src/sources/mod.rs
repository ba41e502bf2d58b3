//! Iteration sources
//!
//! A source is chosen by descriptor, `<kind>://`, and receives the run's path
//! arguments. Every source reads documents concurrently (up to `workers` at a
//! time) and stops at the first error the callback returns.

mod directory;
mod featurecollection;
mod files;

pub use directory::DirectorySource;
pub use featurecollection::FeatureCollectionSource;
pub use files::{FileListSource, FilesSource};

use std::path::PathBuf;

use futures::stream::{self, TryStreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::{IndexerError, Result};
use crate::pipeline::{RecordCallback, RecordSource};

pub const DIRECTORY: &str = "directory";
pub const FILES: &str = "files";
pub const FILELIST: &str = "filelist";
pub const FEATURECOLLECTION: &str = "featurecollection";

/// Resolve an iterator descriptor such as `directory://`
///
/// Fails with `IteratorCreation` for kinds we do not know.
pub fn source_for(descriptor: &str, workers: usize) -> Result<Box<dyn RecordSource>> {
    let kind = descriptor
        .split_once("://")
        .map(|(kind, _)| kind)
        .unwrap_or(descriptor)
        .trim()
        .to_ascii_lowercase();

    let source: Box<dyn RecordSource> = match kind.as_str() {
        DIRECTORY => Box::new(DirectorySource::new(workers)),
        FILES => Box::new(FilesSource::new(workers)),
        FILELIST => Box::new(FileListSource::new(workers)),
        FEATURECOLLECTION => Box::new(FeatureCollectionSource::new(workers)),
        _ => {
            return Err(IndexerError::IteratorCreation(format!(
                "Unknown iterator '{}'",
                descriptor
            )))
        }
    };

    Ok(source)
}

/// Read each file and hand it to `callback`, `workers` at a time
///
/// Unreadable files go to [`RecordCallback::on_read_error`].
pub(crate) async fn deliver_files(
    ctx: &CancellationToken,
    files: Vec<PathBuf>,
    workers: usize,
    callback: &dyn RecordCallback,
) -> Result<()> {
    stream::iter(files.into_iter().map(Ok::<_, IndexerError>))
        .try_for_each_concurrent(workers.max(1), move |file| async move {
            if ctx.is_cancelled() {
                return Err(IndexerError::Cancelled);
            }

            let path = file.to_string_lossy();

            match tokio::fs::read(&file).await {
                Ok(content) => callback.on_record(ctx, &path, content).await,
                Err(e) => {
                    let err = IndexerError::iteration(format!("Failed to read {}: {}", path, e));
                    callback.on_read_error(ctx, &path, err).await
                }
            }
        })
        .await
}
