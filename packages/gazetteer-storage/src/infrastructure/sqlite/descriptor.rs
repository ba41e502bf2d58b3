use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{Result, StorageError};

/// Database drivers we know how to open and inspect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    Sqlite,
}

impl Driver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Sqlite => "sqlite",
        }
    }

    /// Query listing every table name in the catalog
    pub fn catalog_query(&self) -> &'static str {
        match self {
            Driver::Sqlite => "SELECT name FROM sqlite_master WHERE type='table'",
        }
    }

    /// SQL expression turning a WKT placeholder into a native geometry
    pub fn geometry_from_text(&self, placeholder: &str) -> String {
        match self {
            Driver::Sqlite => format!("GeomFromText({}, 4326)", placeholder),
        }
    }
}

impl FromStr for Driver {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            other => Err(StorageError::unsupported_driver(other)),
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `sql://<driver>?dsn=<connection string>`
///
/// ```rust
/// use gazetteer_storage::infrastructure::sqlite::{ConnectionDescriptor, Driver};
///
/// let d: ConnectionDescriptor = "sql://sqlite?dsn=whosonfirst.db".parse().unwrap();
/// assert_eq!(d.driver, Driver::Sqlite);
/// assert_eq!(d.dsn, "whosonfirst.db");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub driver: Driver,
    pub dsn: String,
}

impl ConnectionDescriptor {
    pub fn new(driver: Driver, dsn: impl Into<String>) -> Self {
        Self {
            driver,
            dsn: dsn.into(),
        }
    }

    pub fn is_memory(&self) -> bool {
        let dsn = self.dsn.strip_prefix("file:").unwrap_or(&self.dsn);
        dsn.is_empty() || dsn.starts_with(":memory:")
    }
}

impl FromStr for ConnectionDescriptor {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        let url = Url::parse(s).map_err(|e| {
            StorageError::config(format!("Invalid connection descriptor '{}'", s)).with_source(e)
        })?;

        let driver: Driver = url
            .host_str()
            .ok_or_else(|| StorageError::config(format!("Connection descriptor '{}' has no driver", s)))?
            .parse()?;

        let dsn = url
            .query_pairs()
            .find(|(k, _)| k == "dsn")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();

        Ok(Self { driver, dsn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_descriptor() {
        let d: ConnectionDescriptor = "sql://sqlite?dsn=/tmp/wof.db".parse().unwrap();
        assert_eq!(d, ConnectionDescriptor::new(Driver::Sqlite, "/tmp/wof.db"));
        assert!(!d.is_memory());

        let d: ConnectionDescriptor = "sql://sqlite?dsn=:memory:".parse().unwrap();
        assert!(d.is_memory());

        let d: ConnectionDescriptor = "sql://sqlite".parse().unwrap();
        assert!(d.is_memory());
    }

    #[test]
    fn test_unsupported_driver() {
        let err = "sql://postgres?dsn=x".parse::<ConnectionDescriptor>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedDriver);

        let err = "mysql".parse::<Driver>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedDriver);
    }

    #[test]
    fn test_invalid_descriptor() {
        let err = "not a uri".parse::<ConnectionDescriptor>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
    }

    #[test]
    fn test_geometry_from_text() {
        assert_eq!(Driver::Sqlite.geometry_from_text("?"), "GeomFromText(?, 4326)");
    }
}
