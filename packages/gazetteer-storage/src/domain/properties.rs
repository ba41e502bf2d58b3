//! Typed property accessors over a raw GeoJSON feature
//!
//! Every accessor reads from the `serde_json::Value` of one feature and either
//! returns a typed value or a [`PropertyError`]. Tables wrap these errors with
//! their own name (see `StorageError::missing_property`).

use std::collections::BTreeMap;

use geo_types::{Coord, Geometry, Rect};
use serde_json::Value;
use thiserror::Error;
use wkt::ToWkt;

pub const ID: &str = "wof:id";
pub const ALT_LABEL: &str = "src:alt_label";
pub const LAST_MODIFIED: &str = "wof:lastmodified";
pub const HIERARCHY: &str = "wof:hierarchy";
pub const CONCORDANCES: &str = "wof:concordances";
pub const SUPERSEDES: &str = "wof:supersedes";
pub const SUPERSEDED_BY: &str = "wof:superseded_by";
pub const BELONGS_TO: &str = "wof:belongsto";
pub const PLACETYPE: &str = "wof:placetype";
pub const NAME: &str = "wof:name";
pub const SOURCE: &str = "src:geom";
pub const PARENT_ID: &str = "wof:parent_id";
pub const COUNTRY: &str = "wof:country";
pub const REPO: &str = "wof:repo";
pub const IS_CURRENT: &str = "mz:is_current";
pub const INCEPTION: &str = "edtf:inception";
pub const CESSATION: &str = "edtf:cessation";
pub const DEPRECATED: &str = "edtf:deprecated";
pub const LATITUDE: &str = "geom:latitude";
pub const LONGITUDE: &str = "geom:longitude";

/// Prefix of the per-language name lists (`name:eng_x_preferred`)
pub const NAME_PREFIX: &str = "name:";

/// EDTF placeholder for an unknown date
pub const EDTF_UNKNOWN: &str = "uuuu";

/// Failure to derive one property from a feature
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyError {
    #[error("'{0}' property is missing")]
    Missing(String),

    #[error("'{path}' property has an unexpected type (expected {expected})")]
    InvalidType { path: String, expected: &'static str },

    #[error("invalid geometry: {0}")]
    Geometry(String),
}

impl PropertyError {
    pub fn missing(path: impl Into<String>) -> Self {
        Self::Missing(path.into())
    }

    fn invalid(path: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidType {
            path: path.into(),
            expected,
        }
    }
}

/// One `wof:hierarchy` entry: ancestor placetype key (`county_id`) to ancestor id
pub type Hierarchy = BTreeMap<String, i64>;

/// `properties` sub-document, if the feature has one
pub fn properties(feature: &Value) -> Option<&serde_json::Map<String, Value>> {
    feature.get("properties").and_then(Value::as_object)
}

fn property<'a>(feature: &'a Value, key: &str) -> Option<&'a Value> {
    properties(feature).and_then(|props| props.get(key))
}

fn as_i64(value: &Value, path: &str) -> Result<i64, PropertyError> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| PropertyError::invalid(path, "integer")),
        // Older records carry numeric ids as strings
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| PropertyError::invalid(path, "integer")),
        _ => Err(PropertyError::invalid(path, "integer")),
    }
}

/// `properties.wof:id`, falling back to the top-level feature `id`
pub fn id(feature: &Value) -> Result<i64, PropertyError> {
    if let Some(value) = property(feature, ID) {
        return as_i64(value, ID);
    }

    match feature.get("id") {
        Some(value) => as_i64(value, "id"),
        None => Err(PropertyError::missing(ID)),
    }
}

/// `properties.src:alt_label`; empty when the feature is not an alt variant
pub fn alt_label(feature: &Value) -> Result<String, PropertyError> {
    match property(feature, ALT_LABEL) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(PropertyError::invalid(ALT_LABEL, "string")),
    }
}

pub fn is_alt(feature: &Value) -> bool {
    matches!(property(feature, ALT_LABEL), Some(Value::String(s)) if !s.is_empty())
}

/// `properties.wof:lastmodified`, `-1` when absent or unreadable
pub fn last_modified(feature: &Value) -> i64 {
    property(feature, LAST_MODIFIED)
        .and_then(|v| as_i64(v, LAST_MODIFIED).ok())
        .unwrap_or(-1)
}

/// `properties.wof:hierarchy`, in document order
///
/// Entries whose values are not integers are dropped rather than failing the
/// whole record; a hierarchy that is not a list of objects is an error.
pub fn hierarchies(feature: &Value) -> Result<Vec<Hierarchy>, PropertyError> {
    let Some(value) = property(feature, HIERARCHY) else {
        return Ok(Vec::new());
    };

    let entries = value
        .as_array()
        .ok_or_else(|| PropertyError::invalid(HIERARCHY, "array"))?;

    entries
        .iter()
        .map(|entry| {
            let object = entry
                .as_object()
                .ok_or_else(|| PropertyError::invalid(HIERARCHY, "array of objects"))?;

            Ok(object
                .iter()
                .filter_map(|(key, v)| as_i64(v, HIERARCHY).ok().map(|id| (key.clone(), id)))
                .collect())
        })
        .collect()
}

/// `properties.wof:concordances`, external namespace to external id
pub fn concordances(feature: &Value) -> Result<BTreeMap<String, String>, PropertyError> {
    let Some(value) = property(feature, CONCORDANCES) else {
        return Ok(BTreeMap::new());
    };

    let object = value
        .as_object()
        .ok_or_else(|| PropertyError::invalid(CONCORDANCES, "object"))?;

    Ok(object
        .iter()
        .filter_map(|(source, other_id)| {
            let other_id = match other_id {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((source.clone(), other_id))
        })
        .collect())
}

fn id_list(feature: &Value, key: &str) -> Result<Vec<i64>, PropertyError> {
    match property(feature, key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(values)) => values.iter().map(|v| as_i64(v, key)).collect(),
        Some(_) => Err(PropertyError::invalid(key, "array")),
    }
}

pub fn supersedes(feature: &Value) -> Result<Vec<i64>, PropertyError> {
    id_list(feature, SUPERSEDES)
}

pub fn superseded_by(feature: &Value) -> Result<Vec<i64>, PropertyError> {
    id_list(feature, SUPERSEDED_BY)
}

pub fn belongs_to(feature: &Value) -> Result<Vec<i64>, PropertyError> {
    id_list(feature, BELONGS_TO)
}

pub fn placetype(feature: &Value) -> Result<String, PropertyError> {
    match property(feature, PLACETYPE) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(PropertyError::invalid(PLACETYPE, "string")),
        None => Err(PropertyError::missing(PLACETYPE)),
    }
}

pub fn name(feature: &Value) -> Option<String> {
    property(feature, NAME).and_then(Value::as_str).map(str::to_string)
}

/// `properties.src:geom`, the provenance of the geometry
pub fn source(feature: &Value) -> Result<String, PropertyError> {
    match property(feature, SOURCE) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) | None | Some(Value::Null) => Err(PropertyError::missing(SOURCE)),
        Some(_) => Err(PropertyError::invalid(SOURCE, "string")),
    }
}

/// Decoded feature geometry
pub fn geometry(feature: &Value) -> Result<geo_types::Geometry<f64>, PropertyError> {
    let value = match feature.get("geometry") {
        None | Some(Value::Null) => return Err(PropertyError::missing("geometry")),
        Some(value) => value,
    };

    let geom = geojson::Geometry::from_json_value(value.clone())
        .map_err(|e| PropertyError::Geometry(e.to_string()))?;

    geo_types::Geometry::<f64>::try_from(geom).map_err(|e| PropertyError::Geometry(e.to_string()))
}

/// Feature geometry rendered as well-known text
pub fn geometry_wkt(feature: &Value) -> Result<String, PropertyError> {
    geometry(feature).map(|geom| geom.wkt_string())
}

fn visit_coords(geom: &Geometry<f64>, f: &mut dyn FnMut(Coord<f64>)) {
    match geom {
        Geometry::Point(p) => f(p.0),
        Geometry::Line(l) => {
            f(l.start);
            f(l.end);
        }
        Geometry::LineString(ls) => ls.0.iter().copied().for_each(f),
        Geometry::Polygon(p) => p.exterior().0.iter().copied().for_each(f),
        Geometry::MultiPoint(mp) => mp.0.iter().for_each(|p| f(p.0)),
        Geometry::MultiLineString(mls) => mls.0.iter().flat_map(|ls| ls.0.iter()).copied().for_each(f),
        Geometry::MultiPolygon(mp) => mp
            .0
            .iter()
            .flat_map(|p| p.exterior().0.iter())
            .copied()
            .for_each(f),
        Geometry::GeometryCollection(gc) => gc.0.iter().for_each(|g| visit_coords(g, f)),
        Geometry::Rect(r) => {
            f(r.min());
            f(r.max());
        }
        Geometry::Triangle(t) => {
            f(t.0);
            f(t.1);
            f(t.2);
        }
    }
}

/// Bounding box of a decoded geometry; `None` for an empty one
pub fn geometry_bounds(geom: &Geometry<f64>) -> Option<Rect<f64>> {
    let mut corners: Option<(Coord<f64>, Coord<f64>)> = None;

    visit_coords(geom, &mut |c| {
        corners = Some(match corners {
            None => (c, c),
            Some((min, max)) => (
                Coord {
                    x: min.x.min(c.x),
                    y: min.y.min(c.y),
                },
                Coord {
                    x: max.x.max(c.x),
                    y: max.y.max(c.y),
                },
            ),
        });
    });

    corners.map(|(min, max)| Rect::new(min, max))
}

/// Bounding box of the feature geometry
pub fn bounds(feature: &Value) -> Result<Rect<f64>, PropertyError> {
    geometry_bounds(&geometry(feature)?)
        .ok_or_else(|| PropertyError::Geometry("geometry has no coordinates".to_string()))
}

/// `(latitude, longitude)` from `geom:latitude`/`geom:longitude`, else the
/// center of the geometry's bounding box
pub fn centroid(feature: &Value) -> Result<(f64, f64), PropertyError> {
    let lat = property(feature, LATITUDE).and_then(Value::as_f64);
    let lon = property(feature, LONGITUDE).and_then(Value::as_f64);

    if let (Some(lat), Some(lon)) = (lat, lon) {
        return Ok((lat, lon));
    }

    let center = bounds(feature)?.center();
    Ok((center.y, center.x))
}

fn string_property(feature: &Value, key: &str) -> Option<String> {
    property(feature, key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `wof:parent_id`, `-1` when unknown
pub fn parent_id(feature: &Value) -> i64 {
    property(feature, PARENT_ID)
        .and_then(|v| as_i64(v, PARENT_ID).ok())
        .unwrap_or(-1)
}

pub fn country(feature: &Value) -> String {
    string_property(feature, COUNTRY).unwrap_or_default()
}

pub fn repo(feature: &Value) -> String {
    string_property(feature, REPO).unwrap_or_default()
}

pub fn inception(feature: &Value) -> String {
    string_property(feature, INCEPTION).unwrap_or_else(|| EDTF_UNKNOWN.to_string())
}

pub fn cessation(feature: &Value) -> String {
    string_property(feature, CESSATION).unwrap_or_else(|| EDTF_UNKNOWN.to_string())
}

fn edtf_is_known(value: &str) -> bool {
    !matches!(value, "" | EDTF_UNKNOWN | ".." | "open")
}

/// `mz:is_current` as `1`, `0` or `-1` for unknown
pub fn is_current(feature: &Value) -> i64 {
    match property(feature, IS_CURRENT).and_then(|v| as_i64(v, IS_CURRENT).ok()) {
        Some(1) => 1,
        Some(0) => 0,
        _ => -1,
    }
}

pub fn is_deprecated(feature: &Value) -> bool {
    string_property(feature, DEPRECATED).is_some_and(|d| edtf_is_known(&d))
}

pub fn is_ceased(feature: &Value) -> bool {
    edtf_is_known(&cessation(feature))
}

/// Every `name:<tag>` list, keyed by tag (`eng_x_preferred`)
///
/// A bare string is treated as a one-name list; other values are ignored.
pub fn names(feature: &Value) -> BTreeMap<String, Vec<String>> {
    let Some(props) = properties(feature) else {
        return BTreeMap::new();
    };

    props
        .iter()
        .filter_map(|(key, value)| {
            let tag = key.strip_prefix(NAME_PREFIX)?;
            let names: Vec<String> = match value {
                Value::Array(values) => values.iter().filter_map(Value::as_str).map(str::to_string).collect(),
                Value::String(s) => vec![s.clone()],
                _ => return None,
            };
            (!tag.is_empty() && !names.is_empty()).then(|| (tag.to_string(), names))
        })
        .collect()
}

/// GeoJSON geometry type name (`Point`, `Polygon`, ...)
pub fn geometry_type(feature: &Value) -> Result<String, PropertyError> {
    feature
        .get("geometry")
        .and_then(|g| g.get("type"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PropertyError::missing("geometry.type"))
}
