//! Field-type inference over sampled attribute values.
//!
//! The properties column has no schema, so field metadata is inferred
//! from samples and is best-effort by design. The same inferred kind
//! maps to an XSD type for DescribeFeatureType and an ESRI field type
//! for the Feature Server surface.

use serde_json::Value as JsonValue;

/// Attribute names that collide with the synthetic object id and are
/// never reported as user fields.
pub const RESERVED_FIELD_NAMES: &[&str] =
    &["OBJECTID", "objectid", "FID", "fid", "OID", "oid", "id", "ID"];

pub fn is_reserved_field(name: &str) -> bool {
    RESERVED_FIELD_NAMES.contains(&name)
}

/// Inferred scalar kind of an attribute field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    Boolean,
    String,
}

impl FieldKind {
    /// Plain name used by the internal REST field listing.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::String => "string",
        }
    }

    /// XSD type name for DescribeFeatureType output.
    pub fn xsd_type(&self) -> &'static str {
        match self {
            FieldKind::Number => "xsd:double",
            FieldKind::Boolean => "xsd:boolean",
            FieldKind::String => "xsd:string",
        }
    }

    /// ESRI field type name for layer metadata.
    pub fn esri_type(&self) -> &'static str {
        match self {
            FieldKind::Number => "esriFieldTypeDouble",
            FieldKind::Boolean => "esriFieldTypeSmallInteger",
            FieldKind::String => "esriFieldTypeString",
        }
    }

    /// Classify one sampled value; nulls carry no type information.
    pub fn classify(value: &JsonValue) -> Option<FieldKind> {
        match value {
            JsonValue::Null => None,
            JsonValue::Bool(_) => Some(FieldKind::Boolean),
            JsonValue::Number(_) => Some(FieldKind::Number),
            _ => Some(FieldKind::String),
        }
    }

    /// Pick the dominant kind of a mixed sample.
    ///
    /// Priority number > boolean > string: a field that is numeric in
    /// any sampled row is treated as numeric.
    pub fn dominant(kinds: &[FieldKind]) -> FieldKind {
        if kinds.contains(&FieldKind::Number) {
            FieldKind::Number
        } else if kinds.contains(&FieldKind::Boolean) {
            FieldKind::Boolean
        } else {
            FieldKind::String
        }
    }
}

/// One inferred field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
}

/// ESRI field type of one concrete value (per-feature inference used
/// when no sampled descriptor exists).
///
/// Booleans must be checked before the numeric case: a boolean is a
/// SmallInteger on this surface, never an Integer.
pub fn esri_value_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "esriFieldTypeString",
        JsonValue::Bool(_) => "esriFieldTypeSmallInteger",
        JsonValue::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "esriFieldTypeInteger"
            } else {
                "esriFieldTypeDouble"
            }
        }
        JsonValue::String(_) => "esriFieldTypeString",
        JsonValue::Array(_) | JsonValue::Object(_) => "esriFieldTypeString",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dominant_prefers_number_over_boolean_over_string() {
        assert_eq!(
            FieldKind::dominant(&[FieldKind::String, FieldKind::Number, FieldKind::Boolean]),
            FieldKind::Number
        );
        assert_eq!(
            FieldKind::dominant(&[FieldKind::String, FieldKind::Boolean]),
            FieldKind::Boolean
        );
        assert_eq!(FieldKind::dominant(&[FieldKind::String]), FieldKind::String);
        assert_eq!(FieldKind::dominant(&[]), FieldKind::String);
    }

    #[test]
    fn null_carries_no_type() {
        assert_eq!(FieldKind::classify(&json!(null)), None);
        assert_eq!(FieldKind::classify(&json!(true)), Some(FieldKind::Boolean));
        assert_eq!(FieldKind::classify(&json!(1.5)), Some(FieldKind::Number));
        assert_eq!(FieldKind::classify(&json!("x")), Some(FieldKind::String));
    }

    #[test]
    fn boolean_is_small_integer_not_integer() {
        assert_eq!(esri_value_type(&json!(true)), "esriFieldTypeSmallInteger");
        assert_eq!(esri_value_type(&json!(7)), "esriFieldTypeInteger");
        assert_eq!(esri_value_type(&json!(7.5)), "esriFieldTypeDouble");
        assert_eq!(esri_value_type(&json!(null)), "esriFieldTypeString");
        assert_eq!(esri_value_type(&json!([1, 2])), "esriFieldTypeString");
    }

    #[test]
    fn reserved_names_cover_both_cases() {
        assert!(is_reserved_field("OBJECTID"));
        assert!(is_reserved_field("fid"));
        assert!(is_reserved_field("id"));
        assert!(!is_reserved_field("name"));
    }
}
