use serde_json::Value;

use super::properties::{self, Hierarchy, PropertyError};
use crate::error::{Result, StorageError};
use std::collections::BTreeMap;

/// One feature document flowing through the indexer
///
/// A record owns the decoded feature and exposes the derived fields every
/// table consumes. Accessors are fallible so that each table can decide
/// which fields it depends on and report `MissingProperty` under its own name.
///
/// # Examples
///
/// ```rust
/// use gazetteer_storage::domain::Record;
///
/// let record = Record::from_slice(br#"{
///     "type": "Feature",
///     "properties": { "wof:id": 101, "wof:placetype": "locality" },
///     "geometry": { "type": "Point", "coordinates": [0.0, 0.0] }
/// }"#).unwrap();
///
/// assert_eq!(record.id().unwrap(), 101);
/// assert!(!record.is_alt());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    feature: Value,
    path: Option<String>,
}

impl Record {
    pub fn new(feature: Value) -> Self {
        Self {
            feature,
            path: None,
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let feature: Value = serde_json::from_slice(bytes)
            .map_err(|e| StorageError::serialization("Failed to decode feature").with_source(e))?;
        Ok(Self::new(feature))
    }

    /// Attach the path the record was read from (used in log and error messages)
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Mark the record as an alt variant, writing the label into its properties
    pub fn with_alt_label(mut self, label: impl Into<String>) -> Self {
        if let Some(props) = self
            .feature
            .as_object_mut()
            .map(|f| f.entry("properties").or_insert_with(|| Value::Object(Default::default())))
            .and_then(Value::as_object_mut)
        {
            props.insert(properties::ALT_LABEL.to_string(), Value::String(label.into()));
        }
        self
    }

    pub fn feature(&self) -> &Value {
        &self.feature
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn id(&self) -> std::result::Result<i64, PropertyError> {
        properties::id(&self.feature)
    }

    pub fn is_alt(&self) -> bool {
        properties::is_alt(&self.feature)
    }

    pub fn alt_label(&self) -> std::result::Result<String, PropertyError> {
        properties::alt_label(&self.feature)
    }

    pub fn last_modified(&self) -> i64 {
        properties::last_modified(&self.feature)
    }

    pub fn hierarchies(&self) -> std::result::Result<Vec<Hierarchy>, PropertyError> {
        properties::hierarchies(&self.feature)
    }

    pub fn concordances(&self) -> std::result::Result<BTreeMap<String, String>, PropertyError> {
        properties::concordances(&self.feature)
    }

    pub fn supersedes(&self) -> std::result::Result<Vec<i64>, PropertyError> {
        properties::supersedes(&self.feature)
    }

    pub fn superseded_by(&self) -> std::result::Result<Vec<i64>, PropertyError> {
        properties::superseded_by(&self.feature)
    }

    pub fn belongs_to(&self) -> std::result::Result<Vec<i64>, PropertyError> {
        properties::belongs_to(&self.feature)
    }

    pub fn placetype(&self) -> std::result::Result<String, PropertyError> {
        properties::placetype(&self.feature)
    }

    pub fn source(&self) -> std::result::Result<String, PropertyError> {
        properties::source(&self.feature)
    }

    pub fn geometry_wkt(&self) -> std::result::Result<String, PropertyError> {
        properties::geometry_wkt(&self.feature)
    }

    pub fn name(&self) -> Option<String> {
        properties::name(&self.feature)
    }

    pub fn parent_id(&self) -> i64 {
        properties::parent_id(&self.feature)
    }

    pub fn country(&self) -> String {
        properties::country(&self.feature)
    }

    pub fn repo(&self) -> String {
        properties::repo(&self.feature)
    }

    pub fn inception(&self) -> String {
        properties::inception(&self.feature)
    }

    pub fn cessation(&self) -> String {
        properties::cessation(&self.feature)
    }

    pub fn is_current(&self) -> i64 {
        properties::is_current(&self.feature)
    }

    pub fn is_deprecated(&self) -> bool {
        properties::is_deprecated(&self.feature)
    }

    pub fn is_ceased(&self) -> bool {
        properties::is_ceased(&self.feature)
    }

    pub fn names(&self) -> BTreeMap<String, Vec<String>> {
        properties::names(&self.feature)
    }

    pub fn geometry(&self) -> std::result::Result<geo_types::Geometry<f64>, PropertyError> {
        properties::geometry(&self.feature)
    }

    pub fn bounds(&self) -> std::result::Result<geo_types::Rect<f64>, PropertyError> {
        properties::bounds(&self.feature)
    }

    /// `(latitude, longitude)`
    pub fn centroid(&self) -> std::result::Result<(f64, f64), PropertyError> {
        properties::centroid(&self.feature)
    }

    pub fn geometry_type(&self) -> std::result::Result<String, PropertyError> {
        properties::geometry_type(&self.feature)
    }

    /// The `properties` sub-document as JSON text (`{}` when absent)
    pub fn properties_json(&self) -> Result<String> {
        match self.feature.get("properties") {
            Some(props) => Ok(serde_json::to_string(props)?),
            None => Ok("{}".to_string()),
        }
    }

    /// The whole feature as JSON text
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.feature)?)
    }

    /// Ids of every ancestor named by the record: hierarchy values plus
    /// `wof:belongsto`, without duplicates, non-positive ids, or the record itself
    pub fn ancestor_ids(&self) -> std::result::Result<Vec<i64>, PropertyError> {
        let own = self.id().ok();
        let mut ids: Vec<i64> = self
            .hierarchies()?
            .iter()
            .flat_map(|h| h.values().copied())
            .chain(self.belongs_to()?)
            .filter(|id| *id > 0 && Some(*id) != own)
            .collect();

        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}
