//! WFS DescribeFeatureType: XSD generated from sampled fields.

use crate::error::{Result, ServerError};
use crate::registry;
use crate::state::AppState;
use meridian_codec::XmlWriter;
use meridian_core::{is_valid_identifier, GeometryKind};
use meridian_engine::{introspect, StoreTable};

const GIS_NS: &str = "http://meridian.dev/gis";
const GML_NS: &str = "http://www.opengis.net/gml";

/// GML property type for the `Shape` element.
///
/// Polygons advertise MultiSurface because that is the form GetFeature
/// actually emits.
fn geometry_property_type(kind: Option<GeometryKind>) -> &'static str {
    match kind {
        Some(GeometryKind::Point) => "gml:PointPropertyType",
        Some(GeometryKind::MultiPoint) => "gml:MultiPointPropertyType",
        Some(GeometryKind::LineString) => "gml:LineStringPropertyType",
        Some(GeometryKind::MultiLineString) => "gml:MultiCurvePropertyType",
        Some(GeometryKind::Polygon) | Some(GeometryKind::MultiPolygon) => {
            "gml:MultiSurfacePropertyType"
        }
        Some(GeometryKind::Unknown) | None => "gml:GeometryPropertyType",
    }
}

pub async fn describe(state: &AppState, type_name: &str) -> Result<String> {
    let dataset = registry::by_type_name(&state.pool, type_name)
        .await?
        .ok_or_else(|| ServerError::not_found(format!("unknown feature type '{type_name}'")))?;
    let table = StoreTable::for_dataset(&dataset)?;
    let descriptors = introspect::field_descriptors(&state.pool, &table).await?;

    let element = dataset.feature_element_name();
    let local_type = format!("{element}Type");
    let type_def = format!("gis:{local_type}");

    let mut w = XmlWriter::new();
    w.declaration()?;
    w.open(
        "xsd:schema",
        &[
            ("xmlns:xsd", "http://www.w3.org/2001/XMLSchema"),
            ("xmlns:gml", GML_NS),
            ("xmlns:gis", GIS_NS),
            ("targetNamespace", GIS_NS),
            ("elementFormDefault", "qualified"),
        ],
    )?;
    w.empty(
        "xsd:import",
        &[
            ("namespace", GML_NS),
            (
                "schemaLocation",
                "http://schemas.opengis.net/gml/3.1.1/base/gml.xsd",
            ),
        ],
    )?;

    w.empty(
        "xsd:element",
        &[
            ("name", element.as_str()),
            ("type", type_def.as_str()),
            ("substitutionGroup", "gml:_Feature"),
        ],
    )?;

    w.open("xsd:complexType", &[("name", local_type.as_str())])?;
    w.open("xsd:complexContent", &[])?;
    w.open("xsd:extension", &[("base", "gml:AbstractFeatureType")])?;
    w.open("xsd:sequence", &[])?;
    w.empty(
        "xsd:element",
        &[
            ("name", "Shape"),
            ("type", geometry_property_type(dataset.geometry_kind)),
            ("nillable", "true"),
            ("minOccurs", "0"),
        ],
    )?;
    for descriptor in &descriptors {
        // a key that cannot be an XML element name cannot be described
        if !is_valid_identifier(&descriptor.name) {
            continue;
        }
        w.empty(
            "xsd:element",
            &[
                ("name", descriptor.name.as_str()),
                ("type", descriptor.kind.xsd_type()),
                ("nillable", "true"),
                ("minOccurs", "0"),
            ],
        )?;
    }
    w.close("xsd:sequence")?;
    w.close("xsd:extension")?;
    w.close("xsd:complexContent")?;
    w.close("xsd:complexType")?;

    w.close("xsd:schema")?;
    Ok(w.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polygon_kinds_map_to_multi_surface() {
        assert_eq!(
            geometry_property_type(Some(GeometryKind::Polygon)),
            "gml:MultiSurfacePropertyType"
        );
        assert_eq!(
            geometry_property_type(Some(GeometryKind::MultiPolygon)),
            "gml:MultiSurfacePropertyType"
        );
        assert_eq!(
            geometry_property_type(Some(GeometryKind::Point)),
            "gml:PointPropertyType"
        );
        assert_eq!(geometry_property_type(None), "gml:GeometryPropertyType");
    }
}
