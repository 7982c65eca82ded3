//! GML 3.1.1 geometry output.
//!
//! Coordinate order follows the OGC axis-order rule: a URN-form SRS
//! name for EPSG 4326 (`urn:ogc:def:crs:EPSG::4326`) means latitude
//! first, while the plain `EPSG:4326` form keeps the common
//! longitude-first order clients expect. Polygons are emitted inside a
//! `gml:MultiSurface` wrapper rather than a bare `gml:Polygon`; the
//! desktop GIS clients this surface serves only bind the wrapped form
//! reliably.

use crate::geometry::Geometry;
use crate::xml_writer::XmlWriter;
use meridian_core::GisError;

/// True when the SRS name demands latitude-first coordinate order.
pub fn axis_latitude_first(srs_name: &str) -> bool {
    srs_name.starts_with("urn:") && srs_name.contains("4326")
}

/// Write one geometry as GML 3.1.1 elements.
pub fn write_geometry(w: &mut XmlWriter, geometry: &Geometry, srs_name: &str) -> Result<(), GisError> {
    let lat_first = axis_latitude_first(srs_name);
    let srs = [("srsName", srs_name)];
    match geometry {
        Geometry::Point { coordinates } => {
            w.open("gml:Point", &srs)?;
            w.leaf("gml:pos", &[], &pair(coordinates, lat_first))?;
            w.close("gml:Point")
        }
        Geometry::MultiPoint { coordinates } => {
            w.open("gml:MultiPoint", &srs)?;
            for point in coordinates {
                w.open("gml:pointMember", &[])?;
                w.open("gml:Point", &[])?;
                w.leaf("gml:pos", &[], &pair(point, lat_first))?;
                w.close("gml:Point")?;
                w.close("gml:pointMember")?;
            }
            w.close("gml:MultiPoint")
        }
        Geometry::LineString { coordinates } => {
            w.open("gml:LineString", &srs)?;
            write_pos_list(w, coordinates, lat_first)?;
            w.close("gml:LineString")
        }
        Geometry::MultiLineString { coordinates } => {
            w.open("gml:MultiLineString", &srs)?;
            for line in coordinates {
                w.open("gml:lineStringMember", &[])?;
                w.open("gml:LineString", &[])?;
                write_pos_list(w, line, lat_first)?;
                w.close("gml:LineString")?;
                w.close("gml:lineStringMember")?;
            }
            w.close("gml:MultiLineString")
        }
        Geometry::Polygon { coordinates } => {
            w.open("gml:MultiSurface", &srs)?;
            w.open("gml:surfaceMember", &[])?;
            write_polygon(w, coordinates, lat_first)?;
            w.close("gml:surfaceMember")?;
            w.close("gml:MultiSurface")
        }
        Geometry::MultiPolygon { coordinates } => {
            w.open("gml:MultiSurface", &srs)?;
            for polygon in coordinates {
                w.open("gml:surfaceMember", &[])?;
                write_polygon(w, polygon, lat_first)?;
                w.close("gml:surfaceMember")?;
            }
            w.close("gml:MultiSurface")
        }
    }
}

fn write_polygon(
    w: &mut XmlWriter,
    rings: &[Vec<Vec<f64>>],
    lat_first: bool,
) -> Result<(), GisError> {
    w.open("gml:Polygon", &[])?;
    for (i, ring) in rings.iter().enumerate() {
        let boundary = if i == 0 { "gml:exterior" } else { "gml:interior" };
        w.open(boundary, &[])?;
        w.open("gml:LinearRing", &[])?;
        write_pos_list(w, ring, lat_first)?;
        w.close("gml:LinearRing")?;
        w.close(boundary)?;
    }
    w.close("gml:Polygon")
}

fn write_pos_list(w: &mut XmlWriter, coords: &[Vec<f64>], lat_first: bool) -> Result<(), GisError> {
    let text = coords
        .iter()
        .map(|c| pair(c, lat_first))
        .collect::<Vec<_>>()
        .join(" ");
    w.leaf("gml:posList", &[("srsDimension", "2")], &text)
}

fn pair(coord: &[f64], lat_first: bool) -> String {
    let x = coord.first().copied().unwrap_or(0.0);
    let y = coord.get(1).copied().unwrap_or(0.0);
    if lat_first {
        format!("{y} {x}")
    } else {
        format!("{x} {y}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(geometry: &Geometry, srs: &str) -> String {
        let mut w = XmlWriter::new();
        write_geometry(&mut w, geometry, srs).unwrap();
        w.finish().unwrap()
    }

    fn sf_point() -> Geometry {
        Geometry::Point {
            coordinates: vec![-122.4194, 37.7749],
        }
    }

    #[test]
    fn urn_srs_emits_latitude_first() {
        let gml = render(&sf_point(), "urn:ogc:def:crs:EPSG::4326");
        assert!(gml.contains("<gml:pos>37.7749 -122.4194</gml:pos>"), "{gml}");
    }

    #[test]
    fn plain_epsg_srs_emits_longitude_first() {
        let gml = render(&sf_point(), "EPSG:4326");
        assert!(gml.contains("<gml:pos>-122.4194 37.7749</gml:pos>"), "{gml}");
    }

    #[test]
    fn polygon_is_wrapped_in_multi_surface() {
        let g = Geometry::Polygon {
            coordinates: vec![vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![1.0, 1.0],
                vec![0.0, 0.0],
            ]],
        };
        let gml = render(&g, "EPSG:4326");
        assert!(gml.starts_with("<gml:MultiSurface"));
        assert!(gml.contains("<gml:surfaceMember><gml:Polygon><gml:exterior>"));
        assert!(gml.contains("srsDimension=\"2\""));
    }

    #[test]
    fn polygon_holes_are_interior_rings() {
        let g = Geometry::Polygon {
            coordinates: vec![
                vec![vec![0.0, 0.0], vec![4.0, 0.0], vec![4.0, 4.0], vec![0.0, 0.0]],
                vec![vec![1.0, 1.0], vec![2.0, 1.0], vec![2.0, 2.0], vec![1.0, 1.0]],
            ],
        };
        let gml = render(&g, "EPSG:4326");
        assert_eq!(gml.matches("<gml:exterior>").count(), 1);
        assert_eq!(gml.matches("<gml:interior>").count(), 1);
    }

    #[test]
    fn multi_line_string_members() {
        let g = Geometry::MultiLineString {
            coordinates: vec![
                vec![vec![0.0, 0.0], vec![1.0, 1.0]],
                vec![vec![2.0, 2.0], vec![3.0, 3.0]],
            ],
        };
        let gml = render(&g, "EPSG:4326");
        assert_eq!(gml.matches("<gml:lineStringMember>").count(), 2);
        assert!(gml.contains("<gml:posList srsDimension=\"2\">0 0 1 1</gml:posList>"));
    }
}
