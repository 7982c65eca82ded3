//! Wire-format codecs shared by the protocol front-ends.
//!
//! The internal geometry representation is GeoJSON-shaped
//! ([`Geometry`]); this crate converts it outward to ESRI JSON and
//! GML 3.1.1, converts inbound GML to WKT for inserts, and infers
//! field types (XSD and ESRI vocabularies) from sampled attribute
//! values. All WFS XML output goes through the push-style
//! [`XmlWriter`].

pub mod esri;
pub mod fields;
pub mod geometry;
pub mod gml;
pub mod gml_wkt;
pub mod ows;
pub mod xml_writer;

pub use fields::{FieldDescriptor, FieldKind};
pub use geometry::Geometry;
pub use xml_writer::XmlWriter;
