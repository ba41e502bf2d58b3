//! Infrastructure layer - database adapters
//!
//! Only SQLite is wired up; the driver enum is where another backend would go.

pub mod sqlite;

pub use sqlite::{ConnectionDescriptor, Database, Driver};
