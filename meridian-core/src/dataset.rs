//! Dataset model as read from the registry.
//!
//! Datasets are owned by the registry (registration and ingestion live
//! elsewhere); this crate only reads them. A dataset is query-able by
//! the engine when it is a vector dataset with a name-validated backing
//! table — `queryable_table()` is the single place that decision is
//! made.

use crate::error::{GisError, Result};
use crate::ident::is_valid_identifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of data a dataset holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Vector,
    Raster,
}

impl DataType {
    pub fn from_str_lossy(s: &str) -> Option<Self> {
        match s {
            "vector" => Some(DataType::Vector),
            "raster" => Some(DataType::Raster),
            _ => None,
        }
    }
}

/// Geometry type discriminator for a vector dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    /// Stored metadata did not record a recognizable type
    Unknown,
}

impl GeometryKind {
    /// Parse the stored metadata string (GeoJSON type names).
    pub fn parse(s: &str) -> Self {
        match s {
            "Point" => GeometryKind::Point,
            "LineString" => GeometryKind::LineString,
            "Polygon" => GeometryKind::Polygon,
            "MultiPoint" => GeometryKind::MultiPoint,
            "MultiLineString" => GeometryKind::MultiLineString,
            "MultiPolygon" => GeometryKind::MultiPolygon,
            _ => GeometryKind::Unknown,
        }
    }
}

/// A registered dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub data_type: DataType,
    pub geometry_kind: Option<GeometryKind>,
    pub srid: i32,
    pub is_visible: bool,
    pub is_public: bool,
    /// Backing feature-store relation, present once ingestion finished
    pub table_name: Option<String>,
    pub feature_count: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Dataset {
    /// WFS feature type name (`gis:{uuid}`).
    pub fn type_name(&self) -> String {
        format!("gis:{}", self.id)
    }

    /// XML-safe feature element name (`feature_{uuid}` with underscores).
    pub fn feature_element_name(&self) -> String {
        format!("feature_{}", self.id.to_string().replace('-', "_"))
    }

    /// Resolve the backing table for querying.
    ///
    /// Fails with `Validation` for non-vector or table-less datasets
    /// (caller picked an unusable feature type) and `Configuration`
    /// for a table name that fails identifier validation (server-side
    /// metadata defect — that name must never be used to build SQL).
    pub fn queryable_table(&self) -> Result<&str> {
        if self.data_type != DataType::Vector {
            return Err(GisError::validation(format!(
                "dataset {} is not a vector dataset",
                self.id
            )));
        }
        let table = self
            .table_name
            .as_deref()
            .ok_or_else(|| GisError::validation(format!("dataset {} has no data table", self.id)))?;
        if !is_valid_identifier(table) {
            return Err(GisError::configuration("invalid table configuration"));
        }
        Ok(table)
    }
}

/// Parse a WFS type name (`gis:{uuid}` or bare `{uuid}`) to a dataset id.
pub fn parse_type_name(type_name: &str) -> Option<Uuid> {
    let candidate = match type_name.split_once(':') {
        Some((_, rest)) => rest,
        None => type_name,
    };
    Uuid::parse_str(candidate).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(table: Option<&str>, data_type: DataType) -> Dataset {
        Dataset {
            id: Uuid::nil(),
            name: "test".into(),
            description: None,
            data_type,
            geometry_kind: Some(GeometryKind::Point),
            srid: 4326,
            is_visible: true,
            is_public: true,
            table_name: table.map(Into::into),
            feature_count: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn queryable_table_validates_name() {
        let ds = dataset(Some("ds_abc123"), DataType::Vector);
        assert_eq!(ds.queryable_table().unwrap(), "ds_abc123");

        let bad = dataset(Some("ds; DROP TABLE x"), DataType::Vector);
        assert!(matches!(
            bad.queryable_table(),
            Err(GisError::Configuration(_))
        ));
    }

    #[test]
    fn raster_is_not_queryable() {
        let ds = dataset(Some("ds_raster"), DataType::Raster);
        assert!(matches!(ds.queryable_table(), Err(GisError::Validation(_))));
    }

    #[test]
    fn type_name_roundtrip() {
        let id = Uuid::new_v4();
        assert_eq!(parse_type_name(&format!("gis:{id}")), Some(id));
        assert_eq!(parse_type_name(&id.to_string()), Some(id));
        assert_eq!(parse_type_name("gis:not-a-uuid"), None);
    }
}
