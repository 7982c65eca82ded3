//! Shared types for the Meridian GIS backend.
//!
//! This crate is the leaf of the workspace: the dataset model as read
//! from the registry, the error taxonomy used across all surfaces, the
//! strict identifier validation that guards every piece of SQL the
//! engine builds, and a small namespace-stripping XML element tree used
//! by the OGC filter parser and the WFS transaction processor.

pub mod dataset;
pub mod error;
pub mod ident;
pub mod xml;

pub use dataset::{parse_type_name, DataType, Dataset, GeometryKind};
pub use error::{GisError, Result};
pub use ident::{is_valid_identifier, slugify};
pub use xml::XmlElement;
