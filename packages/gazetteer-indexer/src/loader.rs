//! GeoJSON feature loader

use std::path::Path;

use async_trait::async_trait;
use gazetteer_storage::domain::properties;
use gazetteer_storage::Record;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{IndexerError, Result};
use crate::pipeline::RecordLoader;

const GEOJSON_EXTENSION: &str = ".geojson";
const ALT_SEPARATOR: &str = "-alt-";

/// Decodes `Feature` documents; anything else is skipped
///
/// Alt files are named `<id>-alt-<label>.geojson`. A document read from such
/// a file without `src:alt_label` gets the label from its file name, unless
/// `strict_alt_files` is set, which makes that mismatch a load error.
#[derive(Debug, Clone, Default)]
pub struct FeatureLoader {
    pub strict_alt_files: bool,
}

impl FeatureLoader {
    pub fn new(strict_alt_files: bool) -> Self {
        Self { strict_alt_files }
    }

    pub fn load_bytes(&self, path: &str, content: &[u8]) -> Result<Option<Record>> {
        let feature: Value = serde_json::from_slice(content).map_err(|e| IndexerError::load(path, e))?;

        if feature.get("type").and_then(Value::as_str) != Some("Feature") {
            debug!(path, "Not a feature, skipping");
            return Ok(None);
        }

        let record = Record::new(feature).with_path(path);

        match alt_label_from_path(path) {
            Some(label) if !record.is_alt() => {
                if self.strict_alt_files {
                    return Err(IndexerError::load(
                        path,
                        format!("alt file is missing '{}' property", properties::ALT_LABEL),
                    ));
                }
                Ok(Some(record.with_alt_label(label)))
            }
            _ => Ok(Some(record)),
        }
    }
}

#[async_trait]
impl RecordLoader for FeatureLoader {
    async fn load(&self, _ctx: &CancellationToken, path: &str, content: &[u8]) -> Result<Option<Record>> {
        self.load_bytes(path, content)
    }
}

/// `101-alt-quattroshapes.geojson` -> `quattroshapes`
pub fn alt_label_from_path(path: &str) -> Option<&str> {
    let name = Path::new(path).file_name()?.to_str()?;
    let stem = name.strip_suffix(GEOJSON_EXTENSION)?;
    let (id, label) = stem.split_once(ALT_SEPARATOR)?;

    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) || label.is_empty() {
        return None;
    }

    Some(label)
}
