//! GeoJSON-shaped geometry, the internal wire representation.
//!
//! Rows come out of the feature store as `ST_AsGeoJSON` output, so the
//! serde shape here matches GeoJSON exactly; the protocol codecs
//! convert from this type rather than from raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A GeoJSON geometry object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Vec<f64> },
    MultiPoint { coordinates: Vec<Vec<f64>> },
    LineString { coordinates: Vec<Vec<f64>> },
    MultiLineString { coordinates: Vec<Vec<Vec<f64>>> },
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
}

impl Geometry {
    /// Parse a GeoJSON value; anything unrecognized is treated as
    /// "no geometry".
    pub fn from_json(value: &JsonValue) -> Option<Geometry> {
        serde_json::from_value(value.clone()).ok()
    }

    /// Parse from GeoJSON text (the `ST_AsGeoJSON` column form).
    pub fn from_geojson_str(text: &str) -> Option<Geometry> {
        serde_json::from_str(text).ok()
    }

    /// GeoJSON type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point { .. } => "Point",
            Geometry::MultiPoint { .. } => "MultiPoint",
            Geometry::LineString { .. } => "LineString",
            Geometry::MultiLineString { .. } => "MultiLineString",
            Geometry::Polygon { .. } => "Polygon",
            Geometry::MultiPolygon { .. } => "MultiPolygon",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_point() {
        let g = Geometry::from_json(&json!({
            "type": "Point",
            "coordinates": [-122.4194, 37.7749]
        }))
        .unwrap();
        assert_eq!(
            g,
            Geometry::Point {
                coordinates: vec![-122.4194, 37.7749]
            }
        );
        assert_eq!(g.type_name(), "Point");
    }

    #[test]
    fn parses_polygon_with_hole() {
        let g = Geometry::from_geojson_str(
            r#"{"type":"Polygon","coordinates":[
                [[0.0,0.0],[10.0,0.0],[10.0,10.0],[0.0,0.0]],
                [[1.0,1.0],[2.0,1.0],[2.0,2.0],[1.0,1.0]]
            ]}"#,
        )
        .unwrap();
        match g {
            Geometry::Polygon { coordinates } => assert_eq!(coordinates.len(), 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_none() {
        assert!(Geometry::from_json(&json!({"type": "GeometryCollection"})).is_none());
        assert!(Geometry::from_json(&json!(null)).is_none());
    }
}
