//! ESRI ArcGIS REST JSON encoding.
//!
//! Geometry and feature conversion plus the small response envelopes
//! the Feature Server surface returns. The MultiPolygon conversion
//! flattens every constituent polygon's rings into one `rings` array;
//! the per-polygon grouping is not representable in the ESRI polygon
//! form and ArcGIS clients expect the flattened shape.

use crate::fields::{is_reserved_field, FieldDescriptor, FieldKind};
use crate::geometry::Geometry;
use serde_json::{json, Map, Value as JsonValue};

/// ESRI geometry type name for a geometry value.
pub fn esri_geometry_type(geometry: &Geometry) -> &'static str {
    match geometry {
        Geometry::Point { .. } => "esriGeometryPoint",
        Geometry::MultiPoint { .. } => "esriGeometryMultipoint",
        Geometry::LineString { .. } | Geometry::MultiLineString { .. } => "esriGeometryPolyline",
        Geometry::Polygon { .. } | Geometry::MultiPolygon { .. } => "esriGeometryPolygon",
    }
}

/// The WGS84 spatial reference object used on every response.
pub fn spatial_reference() -> JsonValue {
    json!({"wkid": 4326, "latestWkid": 4326})
}

/// Convert a geometry to its ESRI JSON object form.
pub fn geometry_to_esri(geometry: &Geometry) -> JsonValue {
    match geometry {
        Geometry::Point { coordinates } => {
            json!({
                "x": coordinates.first().copied().unwrap_or(0.0),
                "y": coordinates.get(1).copied().unwrap_or(0.0),
            })
        }
        Geometry::MultiPoint { coordinates } => json!({"points": coordinates}),
        Geometry::LineString { coordinates } => json!({"paths": [coordinates]}),
        Geometry::MultiLineString { coordinates } => json!({"paths": coordinates}),
        Geometry::Polygon { coordinates } => json!({"rings": coordinates}),
        Geometry::MultiPolygon { coordinates } => {
            let rings: Vec<&Vec<Vec<f64>>> = coordinates.iter().flatten().collect();
            json!({"rings": rings})
        }
    }
}

/// Build the ESRI attributes object for one feature.
///
/// `OBJECTID` is synthesized from the store id; reserved property
/// names are dropped so they cannot shadow it, and non-primitive
/// values are serialized to strings.
pub fn feature_attributes(id: i64, properties: &Map<String, JsonValue>) -> Map<String, JsonValue> {
    let mut attrs = Map::new();
    attrs.insert("OBJECTID".to_string(), json!(id));
    for (key, value) in properties {
        if is_reserved_field(key) {
            continue;
        }
        let out = match value {
            JsonValue::Array(_) | JsonValue::Object(_) => {
                JsonValue::String(value.to_string())
            }
            other => other.clone(),
        };
        attrs.insert(key.clone(), out);
    }
    attrs
}

/// Field definition list for layer metadata and query responses.
///
/// The synthetic OBJECTID field comes first; inferred string fields
/// get the conventional 4000-character length.
pub fn field_definitions(descriptors: &[FieldDescriptor]) -> Vec<JsonValue> {
    let mut fields = vec![json!({
        "name": "OBJECTID",
        "type": "esriFieldTypeOID",
        "alias": "OBJECTID",
        "sqlType": "sqlTypeOther",
        "domain": null,
        "defaultValue": null,
    })];
    for d in descriptors {
        let mut field = json!({
            "name": d.name,
            "type": d.kind.esri_type(),
            "alias": d.name,
            "sqlType": "sqlTypeOther",
            "domain": null,
            "defaultValue": null,
        });
        if d.kind == FieldKind::String {
            field["length"] = json!(4000);
        }
        fields.push(field);
    }
    fields
}

/// `returnCountOnly` response.
pub fn count_response(count: i64) -> JsonValue {
    json!({"count": count})
}

/// `returnIdsOnly` response.
pub fn ids_response(object_ids: &[i64]) -> JsonValue {
    json!({"objectIdFieldName": "OBJECTID", "objectIds": object_ids})
}

/// Full query response envelope.
pub fn query_response(
    geometry_type: &str,
    fields: Vec<JsonValue>,
    features: Vec<JsonValue>,
    exceeded_transfer_limit: bool,
) -> JsonValue {
    json!({
        "objectIdFieldName": "OBJECTID",
        "globalIdFieldName": "",
        "geometryType": geometry_type,
        "spatialReference": spatial_reference(),
        "fields": fields,
        "features": features,
        "exceededTransferLimit": exceeded_transfer_limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_converts_to_xy() {
        let g = Geometry::Point {
            coordinates: vec![-122.4194, 37.7749],
        };
        assert_eq!(geometry_to_esri(&g), json!({"x": -122.4194, "y": 37.7749}));
        assert_eq!(esri_geometry_type(&g), "esriGeometryPoint");
    }

    #[test]
    fn line_string_wraps_in_single_path() {
        let g = Geometry::LineString {
            coordinates: vec![vec![0.0, 0.0], vec![1.0, 1.0]],
        };
        assert_eq!(
            geometry_to_esri(&g),
            json!({"paths": [[[0.0, 0.0], [1.0, 1.0]]]})
        );
        assert_eq!(esri_geometry_type(&g), "esriGeometryPolyline");
    }

    #[test]
    fn multi_polygon_flattens_rings_in_order() {
        // two polygons, each with one hole: four rings total
        let exterior1 = vec![vec![0.0, 0.0], vec![4.0, 0.0], vec![4.0, 4.0], vec![0.0, 0.0]];
        let hole1 = vec![vec![1.0, 1.0], vec![2.0, 1.0], vec![2.0, 2.0], vec![1.0, 1.0]];
        let exterior2 = vec![
            vec![10.0, 10.0],
            vec![14.0, 10.0],
            vec![14.0, 14.0],
            vec![10.0, 10.0],
        ];
        let hole2 = vec![
            vec![11.0, 11.0],
            vec![12.0, 11.0],
            vec![12.0, 12.0],
            vec![11.0, 11.0],
        ];
        let g = Geometry::MultiPolygon {
            coordinates: vec![
                vec![exterior1.clone(), hole1.clone()],
                vec![exterior2.clone(), hole2.clone()],
            ],
        };
        let esri = geometry_to_esri(&g);
        let rings = esri["rings"].as_array().unwrap();
        assert_eq!(rings.len(), 4);
        assert_eq!(rings[0], json!(exterior1));
        assert_eq!(rings[1], json!(hole1));
        assert_eq!(rings[2], json!(exterior2));
        assert_eq!(rings[3], json!(hole2));
    }

    #[test]
    fn attributes_synthesize_objectid_and_skip_reserved() {
        let props: Map<String, JsonValue> = serde_json::from_value(json!({
            "name": "Pier 39",
            "OBJECTID": 999,
            "fid": 7,
            "tags": ["a", "b"],
        }))
        .unwrap();
        let attrs = feature_attributes(42, &props);
        assert_eq!(attrs["OBJECTID"], json!(42));
        assert!(!attrs.contains_key("fid"));
        assert_eq!(attrs["name"], json!("Pier 39"));
        // non-primitive values are stringified
        assert_eq!(attrs["tags"], json!("[\"a\",\"b\"]"));
    }

    #[test]
    fn string_fields_get_length() {
        let fields = field_definitions(&[
            FieldDescriptor {
                name: "name".into(),
                kind: FieldKind::String,
            },
            FieldDescriptor {
                name: "pop".into(),
                kind: FieldKind::Number,
            },
        ]);
        assert_eq!(fields[0]["type"], "esriFieldTypeOID");
        assert_eq!(fields[1]["length"], json!(4000));
        assert!(fields[2].get("length").is_none());
        assert_eq!(fields[2]["type"], "esriFieldTypeDouble");
    }
}
