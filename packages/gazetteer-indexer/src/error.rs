use gazetteer_storage::{ErrorKind, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to create iterator: {0}")]
    IteratorCreation(String),

    #[error("Iteration failed: {0}")]
    Iteration(String),

    #[error("No tables configured")]
    NoTablesConfigured,

    #[error("Failed to load record {path}: {message}")]
    Load { path: String, message: String },

    #[error("Failed to index {path}: {source}")]
    IndexRecord { path: String, source: StorageError },

    #[error("Post-index hook failed for {path}: {source}")]
    PostIndex {
        path: String,
        source: Box<IndexerError>,
    },

    #[error("Indexing cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IndexerError {
    pub fn iteration<E: std::fmt::Display>(e: E) -> Self {
        Self::Iteration(e.to_string())
    }

    pub fn config<E: std::fmt::Display>(e: E) -> Self {
        Self::Config(e.to_string())
    }

    pub fn load<E: std::fmt::Display>(path: impl Into<String>, e: E) -> Self {
        Self::Load {
            path: path.into(),
            message: e.to_string(),
        }
    }

    /// Cancellation, whether raised by the engine or by a table mid-write
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Storage(e) | Self::IndexRecord { source: e, .. } => e.kind == ErrorKind::Cancelled,
            Self::PostIndex { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Table the failure belongs to, when a table raised it
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::Storage(e) | Self::IndexRecord { source: e, .. } => e.table.as_deref(),
            Self::PostIndex { source, .. } => source.table(),
            _ => None,
        }
    }
}
