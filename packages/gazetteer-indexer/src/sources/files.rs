use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{deliver_files, FILELIST, FILES};
use crate::error::{IndexerError, Result};
use crate::pipeline::{RecordCallback, RecordSource};

/// Each path argument is one feature file
#[derive(Debug, Clone)]
pub struct FilesSource {
    workers: usize,
}

impl FilesSource {
    pub fn new(workers: usize) -> Self {
        Self { workers }
    }
}

#[async_trait]
impl RecordSource for FilesSource {
    fn kind(&self) -> &str {
        FILES
    }

    async fn iterate(
        &self,
        ctx: &CancellationToken,
        paths: &[String],
        callback: &dyn RecordCallback,
    ) -> Result<()> {
        let files = paths.iter().map(PathBuf::from).collect();
        deliver_files(ctx, files, self.workers, callback).await
    }
}

/// Each path argument is a text file listing one feature path per line
///
/// Blank lines and lines starting with `#` are ignored.
#[derive(Debug, Clone)]
pub struct FileListSource {
    workers: usize,
}

impl FileListSource {
    pub fn new(workers: usize) -> Self {
        Self { workers }
    }
}

#[async_trait]
impl RecordSource for FileListSource {
    fn kind(&self) -> &str {
        FILELIST
    }

    async fn iterate(
        &self,
        ctx: &CancellationToken,
        paths: &[String],
        callback: &dyn RecordCallback,
    ) -> Result<()> {
        for list in paths {
            let text = tokio::fs::read_to_string(list)
                .await
                .map_err(|e| IndexerError::iteration(format!("Failed to read file list {}: {}", list, e)))?;

            let files = text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(PathBuf::from)
                .collect();

            deliver_files(ctx, files, self.workers, callback).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::Collect;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[tokio::test]
    async fn test_files_source() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.geojson");
        let b = dir.path().join("b.geojson");
        fs::write(&a, "{}").unwrap();
        fs::write(&b, "{\"type\":\"Feature\"}").unwrap();

        let collect = Collect::default();
        let paths = vec![a.to_string_lossy().to_string(), b.to_string_lossy().to_string()];

        FilesSource::new(2)
            .iterate(&CancellationToken::new(), &paths, &collect)
            .await
            .unwrap();

        assert_eq!(collect.sorted(), paths);
    }

    #[tokio::test]
    async fn test_files_source_missing_file() {
        let err = FilesSource::new(2)
            .iterate(
                &CancellationToken::new(),
                &["/definitely/not/here.geojson".to_string()],
                &Collect::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, IndexerError::Iteration(_)));
    }

    #[tokio::test]
    async fn test_filelist_source() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.geojson");
        fs::write(&a, "{}").unwrap();

        let list = dir.path().join("files.txt");
        fs::write(&list, format!("# features\n{}\n\n", a.display())).unwrap();

        let collect = Collect::default();
        FileListSource::new(2)
            .iterate(
                &CancellationToken::new(),
                &[list.to_string_lossy().to_string()],
                &collect,
            )
            .await
            .unwrap();

        assert_eq!(collect.sorted(), vec![a.to_string_lossy().to_string()]);
    }

    #[tokio::test]
    async fn test_cancelled_before_read() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.geojson");
        fs::write(&a, "{}").unwrap();

        let ctx = CancellationToken::new();
        ctx.cancel();

        let collect = Collect::default();
        let err = FilesSource::new(1)
            .iterate(&ctx, &[a.to_string_lossy().to_string()], &collect)
            .await
            .unwrap_err();

        assert!(matches!(err, IndexerError::Cancelled));
        assert!(collect.sorted().is_empty());
    }
}
