//! Inbound GML to WKT, used by transaction inserts.
//!
//! Only Point, LineString and Polygon are accepted; anything else
//! yields an empty string and the caller inserts the row without
//! geometry. Coordinates are taken in the order given (`x y`), from
//! `pos`/`posList` or the older comma-separated `coordinates` form.

use geo_types::{Coord, Geometry as GeoGeometry, LineString, Point, Polygon};
use meridian_core::XmlElement;
use wkt::ToWkt;

/// Convert a GML geometry element to WKT; empty string when the
/// element is not a convertible geometry.
pub fn gml_to_wkt(elem: &XmlElement) -> String {
    match build_geometry(elem) {
        Some(g) => g.wkt_string(),
        None => String::new(),
    }
}

fn build_geometry(elem: &XmlElement) -> Option<GeoGeometry<f64>> {
    match elem.name.as_str() {
        "Point" => {
            let coords = element_coords(elem);
            let c = coords.first()?;
            Some(Point::new(c.x, c.y).into())
        }
        "LineString" => {
            let coords = element_coords(elem);
            if coords.len() < 2 {
                return None;
            }
            Some(LineString::from(coords).into())
        }
        "Polygon" => {
            let exterior_elem = elem
                .descendant("exterior")
                .or_else(|| elem.descendant("outerBoundaryIs"))?;
            let exterior = element_coords(exterior_elem);
            if exterior.len() < 4 {
                return None;
            }
            let interiors: Vec<LineString<f64>> = elem
                .descendants("interior")
                .iter()
                .chain(elem.descendants("innerBoundaryIs").iter())
                .map(|b| LineString::from(element_coords(b)))
                .filter(|ring| ring.0.len() >= 4)
                .collect();
            Some(Polygon::new(LineString::from(exterior), interiors).into())
        }
        _ => None,
    }
}

/// Coordinate text of the first coordinate-bearing descendant.
fn element_coords(elem: &XmlElement) -> Vec<Coord<f64>> {
    let text = elem
        .descendant("posList")
        .or_else(|| elem.descendant("pos"))
        .or_else(|| elem.descendant("coordinates"))
        .map(|e| e.text_trimmed().to_string())
        .unwrap_or_default();
    parse_coord_text(&text)
}

fn parse_coord_text(text: &str) -> Vec<Coord<f64>> {
    let mut out = Vec::new();
    if text.contains(',') {
        // "x,y x,y" coordinate tuples
        for token in text.split_whitespace() {
            let mut parts = token.split(',');
            if let (Some(x), Some(y)) = (parts.next(), parts.next()) {
                if let (Ok(x), Ok(y)) = (x.parse(), y.parse()) {
                    out.push(Coord { x, y });
                }
            }
        }
    } else {
        // "x y x y" flat number list
        let nums: Vec<f64> = text
            .split_whitespace()
            .filter_map(|t| t.parse().ok())
            .collect();
        for chunk in nums.chunks(2) {
            if let [x, y] = chunk {
                out.push(Coord { x: *x, y: *y });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> XmlElement {
        XmlElement::parse(xml).unwrap()
    }

    #[test]
    fn point_from_pos() {
        let elem = parse("<gml:Point xmlns:gml=\"x\"><gml:pos>-122.4 37.8</gml:pos></gml:Point>");
        let wkt = gml_to_wkt(&elem);
        assert!(wkt.starts_with("POINT"), "{wkt}");
        assert!(wkt.contains("-122.4 37.8"), "{wkt}");
    }

    #[test]
    fn point_from_comma_coordinates() {
        let elem = parse("<Point><coordinates>-122.4,37.8</coordinates></Point>");
        let wkt = gml_to_wkt(&elem);
        assert!(wkt.contains("-122.4 37.8"), "{wkt}");
    }

    #[test]
    fn line_string_from_pos_list() {
        let elem = parse("<LineString><posList>0 0 1 1 2 0</posList></LineString>");
        let wkt = gml_to_wkt(&elem);
        assert!(wkt.starts_with("LINESTRING"), "{wkt}");
    }

    #[test]
    fn polygon_with_interior_ring() {
        let elem = parse(
            "<Polygon>\
             <exterior><LinearRing><posList>0 0 4 0 4 4 0 0</posList></LinearRing></exterior>\
             <interior><LinearRing><posList>1 1 2 1 2 2 1 1</posList></LinearRing></interior>\
             </Polygon>",
        );
        let wkt = gml_to_wkt(&elem);
        assert!(wkt.starts_with("POLYGON"), "{wkt}");
        // exterior and one hole
        assert_eq!(wkt.matches('(').count(), 3, "{wkt}");
    }

    #[test]
    fn unsupported_geometry_is_empty() {
        let elem = parse("<MultiSurface><surfaceMember/></MultiSurface>");
        assert_eq!(gml_to_wkt(&elem), "");
    }

    #[test]
    fn degenerate_line_is_empty() {
        let elem = parse("<LineString><posList>0 0</posList></LineString>");
        assert_eq!(gml_to_wkt(&elem), "");
    }
}
