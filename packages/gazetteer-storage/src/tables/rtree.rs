use async_trait::async_trait;
use geo_types::{Geometry, Polygon, Rect};
use rusqlite::params;
use tokio_util::sync::CancellationToken;

use super::{execute, write_transaction, Table, RTREE_TABLE_NAME};
use crate::domain::properties::geometry_bounds;
use crate::domain::Record;
use crate::error::{Result, StorageError};
use crate::infrastructure::Database;

#[derive(Debug, Clone, Default)]
pub struct RTreeTableOptions {
    pub index_alt_files: bool,
}

/// Bounding-box index over record geometries
///
/// Polygons and multipolygons get one row per polygon; any other geometry
/// gets a single row for its bounding box. The `geometry` column holds the
/// indexed shape as GeoJSON.
#[derive(Debug, Clone, Default)]
pub struct RTreeTable {
    options: RTreeTableOptions,
}

impl RTreeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RTreeTableOptions) -> Self {
        Self { options }
    }
}

struct Shape {
    bounds: Rect<f64>,
    geojson: String,
}

fn shape(table: &str, geom: &Geometry<f64>) -> Result<Option<Shape>> {
    let Some(bounds) = geometry_bounds(geom) else {
        return Ok(None);
    };

    let geojson = serde_json::to_string(&geojson::Geometry::new(geojson::Value::from(geom)))
        .map_err(|e| StorageError::from(e).with_table(table))?;

    Ok(Some(Shape { bounds, geojson }))
}

fn shapes(table: &str, geom: Geometry<f64>) -> Result<Vec<Shape>> {
    let polygons: Vec<Polygon<f64>> = match geom {
        Geometry::Polygon(p) => vec![p],
        Geometry::MultiPolygon(mp) => mp.0,
        other => return Ok(shape(table, &other)?.into_iter().collect()),
    };

    let mut shapes = Vec::with_capacity(polygons.len());
    for polygon in polygons {
        if let Some(s) = shape(table, &Geometry::Polygon(polygon))? {
            shapes.push(s);
        }
    }
    Ok(shapes)
}

#[async_trait]
impl Table for RTreeTable {
    fn name(&self) -> &str {
        RTREE_TABLE_NAME
    }

    async fn index_record(&self, ctx: &CancellationToken, db: &Database, record: &Record) -> Result<()> {
        let is_alt = record.is_alt();

        if is_alt && !self.options.index_alt_files {
            return Ok(());
        }

        let name = self.name();

        let id = record
            .id()
            .map_err(|e| StorageError::missing_property(name, "id", e))?;

        let alt_label = record
            .alt_label()
            .map_err(|e| StorageError::missing_property(name, "alt label", e))?;

        let geometry = record
            .geometry()
            .map_err(|e| StorageError::missing_property(name, "geometry", e))?;

        let shapes = shapes(name, geometry)?;
        let lastmod = record.last_modified();

        let delete = format!("DELETE FROM {} WHERE wof_id = ?1 AND alt_label = ?2", name);
        let insert = format!(
            "INSERT INTO {} (id, min_x, max_x, min_y, max_y, wof_id, is_alt, alt_label, geometry, lastmodified)
             VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            name
        );

        write_transaction(ctx, db, name, |tx| {
            execute(tx, name, &delete, params![id, alt_label])?;

            for s in &shapes {
                let (min, max) = (s.bounds.min(), s.bounds.max());
                execute(
                    tx,
                    name,
                    &insert,
                    params![min.x, max.x, min.y, max.y, id, is_alt, alt_label, s.geojson, lastmod],
                )?;
            }

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::tables::testing;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn islands(id: i64) -> Record {
        Record::new(json!({
            "type": "Feature",
            "properties": { "wof:id": id, "wof:placetype": "region" },
            "geometry": {
                "type": "MultiPolygon",
                "coordinates": [
                    [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0], [0.0, 0.0]]],
                    [[[10.0, 10.0], [12.0, 10.0], [12.0, 12.0], [10.0, 12.0], [10.0, 10.0]]]
                ]
            }
        }))
    }

    #[tokio::test]
    async fn test_one_row_per_polygon() {
        let table = RTreeTable::new();
        let db = testing::database_with(&table).await;
        let ctx = CancellationToken::new();

        table.index_record(&ctx, &db, &islands(404)).await.unwrap();
        table.index_record(&ctx, &db, &islands(404)).await.unwrap();

        let hits = testing::column(
            &db,
            "SELECT wof_id FROM rtree WHERE min_x <= 11.0 AND max_x >= 11.0 AND min_y <= 11.0 AND max_y >= 11.0",
        );
        assert_eq!(hits, vec!["404".to_string()]);
        assert_eq!(testing::column(&db, "SELECT count(*) FROM rtree"), vec!["2".to_string()]);

        let geometry = testing::column(&db, "SELECT geometry FROM rtree ORDER BY min_x LIMIT 1");
        let geometry: serde_json::Value = serde_json::from_str(&geometry[0]).unwrap();
        assert_eq!(geometry["type"], "Polygon");
    }

    #[tokio::test]
    async fn test_point_is_its_own_box() {
        let table = RTreeTable::new();
        let db = testing::database_with(&table).await;
        let ctx = CancellationToken::new();

        table
            .index_record(&ctx, &db, &testing::locality(85922583))
            .await
            .unwrap();

        let hits = testing::column(
            &db,
            "SELECT wof_id FROM rtree WHERE min_x <= -122.0 AND max_x >= -123.0 AND min_y <= 38.0 AND max_y >= 37.0",
        );
        assert_eq!(hits, vec!["85922583".to_string()]);
    }

    #[tokio::test]
    async fn test_alt_rows_only_when_enabled() {
        let ctx = CancellationToken::new();
        let alt = islands(404).with_alt_label("mz");

        let table = RTreeTable::new();
        let db = testing::database_with(&table).await;
        table.index_record(&ctx, &db, &alt).await.unwrap();
        assert_eq!(db.count_rows("rtree").unwrap(), 0);

        let table = RTreeTable::with_options(RTreeTableOptions { index_alt_files: true });
        let db = testing::database_with(&table).await;
        table.index_record(&ctx, &db, &islands(404)).await.unwrap();
        table.index_record(&ctx, &db, &alt).await.unwrap();

        let labels = testing::column(&db, "SELECT DISTINCT alt_label FROM rtree ORDER BY alt_label");
        assert_eq!(labels, vec!["".to_string(), "mz".to_string()]);
        assert_eq!(db.count_rows("rtree").unwrap(), 4);
    }

    #[tokio::test]
    async fn test_missing_geometry() {
        let table = RTreeTable::new();
        let db = testing::database_with(&table).await;
        let ctx = CancellationToken::new();

        let record = Record::new(json!({
            "type": "Feature",
            "properties": { "wof:id": 1 },
            "geometry": null
        }));
        let err = table.index_record(&ctx, &db, &record).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::MissingProperty);
        assert_eq!(err.table.as_deref(), Some("rtree"));
    }
}
