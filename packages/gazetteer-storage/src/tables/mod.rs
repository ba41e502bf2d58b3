//! Table indexers
//!
//! Every derived view implements [`Table`]. Indexing a record is always two
//! phases: decide whether the record belongs in the table and extract every
//! field the write needs, then run one transaction. Nothing is written if
//! extraction fails, and a failed phase rolls the transaction back.
//!
//! | Table | Alt records | Write |
//! |---|---|---|
//! | `properties` | opt-in | upsert by (id, alt_label) |
//! | `geometries` | opt-in | upsert by (id, alt_label) |
//! | `geojson` | opt-in | upsert by (id, alt_label) |
//! | `spelunker` | opt-in | upsert by (id, alt_label) |
//! | `spr` | opt-in | upsert by (id, alt_label) |
//! | `rtree` | opt-in | delete by (id, alt_label), then insert |
//! | `ancestors` | never | delete by id, then insert |
//! | `concordances` | never | delete by id, then insert |
//! | `supersedes` | never | delete by id, then insert |
//! | `names` | never | delete by id, then insert |
//! | `search` | never | delete by id, then insert |

pub mod ancestors;
pub mod concordances;
pub mod document;
pub mod geojson;
pub mod geometries;
pub mod names;
pub mod properties;
pub mod rtree;
pub mod search;
pub mod spelunker;
pub mod spr;
pub mod supersedes;

#[cfg(test)]
pub(crate) mod testing;

pub use ancestors::AncestorsTable;
pub use concordances::ConcordancesTable;
pub use document::{DocumentPreparer, SpelunkerDocument};
pub use geojson::{GeoJsonTable, GeoJsonTableOptions};
pub use geometries::{GeometriesTable, GeometriesTableOptions};
pub use names::NamesTable;
pub use properties::{PropertiesTable, PropertiesTableOptions};
pub use rtree::{RTreeTable, RTreeTableOptions};
pub use search::SearchTable;
pub use spelunker::{SpelunkerTable, SpelunkerTableOptions};
pub use spr::{SprTable, SprTableOptions};
pub use supersedes::SupersedesTable;

use async_trait::async_trait;
use rusqlite::{Params, Transaction};
use tokio_util::sync::CancellationToken;

use crate::domain::Record;
use crate::error::{Result, StorageError};
use crate::infrastructure::{Database, Driver};
use crate::schema::{self, SchemaRegistry};

pub const ANCESTORS_TABLE_NAME: &str = "ancestors";
pub const CONCORDANCES_TABLE_NAME: &str = "concordances";
pub const GEOJSON_TABLE_NAME: &str = "geojson";
pub const GEOMETRIES_TABLE_NAME: &str = "geometries";
pub const NAMES_TABLE_NAME: &str = "names";
pub const PROPERTIES_TABLE_NAME: &str = "properties";
pub const RTREE_TABLE_NAME: &str = "rtree";
pub const SEARCH_TABLE_NAME: &str = "search";
pub const SPELUNKER_TABLE_NAME: &str = "spelunker";
pub const SPR_TABLE_NAME: &str = "spr";
pub const SUPERSEDES_TABLE_NAME: &str = "supersedes";

/// A derived relation kept in sync with the record stream
///
/// Implementations are stateless across records. `index_record` must be
/// transactional: either every row it writes for a record commits, or none do.
#[async_trait]
pub trait Table: Send + Sync {
    /// Stable identifier, also the SQL relation name
    fn name(&self) -> &str;

    /// DDL for this table under `driver`
    ///
    /// Fails with `SchemaNotFound` if the registry has nothing for it.
    fn schema(&self, registry: &SchemaRegistry, driver: Driver) -> Result<String> {
        registry.lookup(driver, self.name()).map(str::to_string)
    }

    /// Create the table if the catalog does not already list it
    async fn initialize_table(
        &self,
        ctx: &CancellationToken,
        db: &Database,
        registry: &SchemaRegistry,
    ) -> Result<()> {
        schema::create_table_if_necessary(ctx, db, registry, self)?;
        Ok(())
    }

    /// Write the rows derived from one record
    async fn index_record(&self, ctx: &CancellationToken, db: &Database, record: &Record) -> Result<()>;
}

/// Run `write` inside one transaction on `db`
///
/// The transaction rolls back if `write` fails or if `ctx` is cancelled
/// before commit.
pub(crate) fn write_transaction<F>(
    ctx: &CancellationToken,
    db: &Database,
    table: &str,
    write: F,
) -> Result<()>
where
    F: FnOnce(&Transaction<'_>) -> Result<()>,
{
    if ctx.is_cancelled() {
        return Err(StorageError::cancelled(table));
    }

    let mut conn = db.connection();
    let tx = conn
        .transaction()
        .map_err(|e| StorageError::begin_transaction(table, e))?;

    write(&tx)?;

    if ctx.is_cancelled() {
        return Err(StorageError::cancelled(table));
    }

    tx.commit()
        .map_err(|e| StorageError::commit_transaction(table, e))
}

/// Prepare and execute one statement, tagging failures with the phase
pub(crate) fn execute<P: Params>(tx: &Transaction<'_>, table: &str, sql: &str, params: P) -> Result<usize> {
    let mut stmt = tx
        .prepare_cached(sql)
        .map_err(|e| StorageError::prepare_statement(table, e))?;

    stmt.execute(params)
        .map_err(|e| StorageError::execute_statement(table, e))
}

/// Delete every row for `id`; the first half of a replace-exact write
pub(crate) fn delete_by_id(tx: &Transaction<'_>, table: &str, id: i64) -> Result<usize> {
    execute(tx, table, &format!("DELETE FROM {} WHERE id = ?1", table), [id])
}
