use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;

use super::{deliver_files, DIRECTORY};
use crate::error::{IndexerError, Result};
use crate::pipeline::{RecordCallback, RecordSource};

const GEOJSON_EXTENSION: &str = "geojson";

/// Every `.geojson` file below each path argument
#[derive(Debug, Clone)]
pub struct DirectorySource {
    workers: usize,
}

impl DirectorySource {
    pub fn new(workers: usize) -> Self {
        Self { workers }
    }
}

#[async_trait]
impl RecordSource for DirectorySource {
    fn kind(&self) -> &str {
        DIRECTORY
    }

    async fn iterate(
        &self,
        ctx: &CancellationToken,
        paths: &[String],
        callback: &dyn RecordCallback,
    ) -> Result<()> {
        for root in paths {
            let walk_root = PathBuf::from(root);
            let files = tokio::task::spawn_blocking(move || geojson_files(&walk_root))
                .await
                .map_err(IndexerError::iteration)??;

            debug!("Found {} feature file(s) under {}", files.len(), root);
            deliver_files(ctx, files, self.workers, callback).await?;
        }

        Ok(())
    }
}

fn geojson_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(IndexerError::Iteration(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(IndexerError::iteration)?;

        let is_feature = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext == GEOJSON_EXTENSION);

        if is_feature {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}
