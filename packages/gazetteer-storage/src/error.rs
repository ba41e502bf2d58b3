//! Error types for gazetteer-storage

use std::fmt;
use thiserror::Error;

use crate::domain::PropertyError;

/// Storage error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A field the write depends on could not be derived from the record
    MissingProperty,
    /// No DDL registered for a (driver, table) pair
    SchemaNotFound,
    /// Driver name is not one we can talk to
    UnsupportedDriver,
    /// DDL execution failed
    TableCreation,
    /// Transaction phases
    BeginTransaction,
    PrepareStatement,
    ExecuteStatement,
    CommitTransaction,
    /// Database errors outside of a table transaction (catalog, open, pragma)
    Database,
    /// Serialization/deserialization errors
    Serialization,
    /// Composite document preparation failed
    Document,
    /// The run was cancelled while work was in flight
    Cancelled,
    /// Configuration errors (connection descriptors, options)
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingProperty => "missing_property",
            ErrorKind::SchemaNotFound => "schema_not_found",
            ErrorKind::UnsupportedDriver => "unsupported_driver",
            ErrorKind::TableCreation => "table_creation",
            ErrorKind::BeginTransaction => "begin_transaction",
            ErrorKind::PrepareStatement => "prepare_statement",
            ErrorKind::ExecuteStatement => "execute_statement",
            ErrorKind::CommitTransaction => "commit_transaction",
            ErrorKind::Database => "database",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Document => "document",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Config => "config",
        }
    }

    /// True for the begin/prepare/execute/commit phase kinds
    pub fn is_transaction_phase(&self) -> bool {
        matches!(
            self,
            ErrorKind::BeginTransaction
                | ErrorKind::PrepareStatement
                | ErrorKind::ExecuteStatement
                | ErrorKind::CommitTransaction
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage error type
///
/// `table` names the relation the failure belongs to, when there is one, so a
/// fatal error at the top of a run can say which table stopped it.
#[derive(Debug, Error)]
#[error("[{kind}] {}{message}{}", table_prefix(.table), source_suffix(.source))]
pub struct StorageError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub table: Option<String>,
    pub message: String,
}

fn table_prefix(table: &Option<String>) -> String {
    table.as_ref().map(|t| format!("{}: ", t)).unwrap_or_default()
}

fn source_suffix(source: &Option<Box<dyn std::error::Error + Send + Sync>>) -> String {
    source.as_ref().map(|s| format!(", {}", s)).unwrap_or_default()
}

impl StorageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            table: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    // Convenience constructors

    /// `MissingProperty(table, field, cause)`
    pub fn missing_property(table: &str, field: &str, cause: PropertyError) -> Self {
        Self::new(
            ErrorKind::MissingProperty,
            format!("Failed to determine value for '{}' property", field),
        )
        .with_table(table)
        .with_source(cause)
    }

    pub fn schema_not_found(driver: &str, table: &str) -> Self {
        Self::new(
            ErrorKind::SchemaNotFound,
            format!("No schema registered for '{}' driver", driver),
        )
        .with_table(table)
    }

    pub fn unsupported_driver(driver: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::UnsupportedDriver,
            format!("Unhandled or unsupported database driver '{}'", driver.into()),
        )
    }

    pub fn table_creation(table: &str, err: rusqlite::Error) -> Self {
        Self::new(ErrorKind::TableCreation, "Failed to create table")
            .with_table(table)
            .with_source(err)
    }

    pub fn begin_transaction(table: &str, err: rusqlite::Error) -> Self {
        Self::new(ErrorKind::BeginTransaction, "Failed to begin transaction")
            .with_table(table)
            .with_source(err)
    }

    pub fn prepare_statement(table: &str, err: rusqlite::Error) -> Self {
        Self::new(ErrorKind::PrepareStatement, "Failed to prepare statement")
            .with_table(table)
            .with_source(err)
    }

    pub fn execute_statement(table: &str, err: rusqlite::Error) -> Self {
        Self::new(ErrorKind::ExecuteStatement, "Failed to execute statement")
            .with_table(table)
            .with_source(err)
    }

    pub fn commit_transaction(table: &str, err: rusqlite::Error) -> Self {
        Self::new(ErrorKind::CommitTransaction, "Failed to commit transaction")
            .with_table(table)
            .with_source(err)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    pub fn document(table: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Document, message).with_table(table)
    }

    pub fn cancelled(table: &str) -> Self {
        Self::new(ErrorKind::Cancelled, "Indexing cancelled").with_table(table)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::database("SQLite error").with_source(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::serialization("JSON error").with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StorageError>;
