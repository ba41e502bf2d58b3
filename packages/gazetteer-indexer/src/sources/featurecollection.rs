use async_trait::async_trait;
use futures::stream::{self, TryStreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::FEATURECOLLECTION;
use crate::error::{IndexerError, Result};
use crate::pipeline::{RecordCallback, RecordSource};

/// Each path argument is a FeatureCollection; every member is delivered as
/// its own document with path `<file>#<index>`
#[derive(Debug, Clone)]
pub struct FeatureCollectionSource {
    workers: usize,
}

impl FeatureCollectionSource {
    pub fn new(workers: usize) -> Self {
        Self { workers }
    }
}

#[async_trait]
impl RecordSource for FeatureCollectionSource {
    fn kind(&self) -> &str {
        FEATURECOLLECTION
    }

    async fn iterate(
        &self,
        ctx: &CancellationToken,
        paths: &[String],
        callback: &dyn RecordCallback,
    ) -> Result<()> {
        for file in paths {
            let content = tokio::fs::read(file)
                .await
                .map_err(|e| IndexerError::iteration(format!("Failed to read {}: {}", file, e)))?;

            let features = features(file, &content)?;

            stream::iter(features.into_iter().enumerate().map(Ok::<_, IndexerError>))
                .try_for_each_concurrent(self.workers.max(1), move |(index, feature)| async move {
                    if ctx.is_cancelled() {
                        return Err(IndexerError::Cancelled);
                    }

                    let path = format!("{}#{}", file, index);
                    let content = serde_json::to_vec(&feature).map_err(IndexerError::iteration)?;
                    callback.on_record(ctx, &path, content).await
                })
                .await?;
        }

        Ok(())
    }
}

fn features(file: &str, content: &[u8]) -> Result<Vec<Value>> {
    let mut doc: Value = serde_json::from_slice(content)
        .map_err(|e| IndexerError::iteration(format!("Failed to parse {}: {}", file, e)))?;

    if doc.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        return Err(IndexerError::Iteration(format!(
            "{} is not a FeatureCollection",
            file
        )));
    }

    match doc.get_mut("features").map(Value::take) {
        Some(Value::Array(features)) => Ok(features),
        _ => Err(IndexerError::Iteration(format!(
            "{} has no features list",
            file
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::Collect;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;

    #[tokio::test]
    async fn test_each_feature_delivered() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("collection.geojson");
        fs::write(
            &file,
            serde_json::to_vec(&json!({
                "type": "FeatureCollection",
                "features": [
                    { "type": "Feature", "properties": { "wof:id": 1 }, "geometry": null },
                    { "type": "Feature", "properties": { "wof:id": 2 }, "geometry": null }
                ]
            }))
            .unwrap(),
        )
        .unwrap();

        let file = file.to_string_lossy().to_string();
        let collect = Collect::default();

        FeatureCollectionSource::new(2)
            .iterate(&CancellationToken::new(), &[file.clone()], &collect)
            .await
            .unwrap();

        assert_eq!(collect.sorted(), vec![format!("{}#0", file), format!("{}#1", file)]);
    }

    #[test]
    fn test_rejects_non_collections() {
        let err = features("x.geojson", br#"{"type":"Feature"}"#).unwrap_err();
        assert!(matches!(err, IndexerError::Iteration(_)));

        let err = features("x.geojson", br#"{"type":"FeatureCollection"}"#).unwrap_err();
        assert!(err.to_string().contains("no features"));
    }
}
