//! Validated store handle and the row type queries return.

use meridian_codec::Geometry;
use meridian_core::{is_valid_identifier, Dataset, GisError, Result};
use serde_json::{Map, Value as JsonValue};

/// A feature-store table name that passed identifier validation.
///
/// Constructing one is the only way to get a table name into engine
/// SQL; a name that fails validation is a `Configuration` error
/// because it means the registry metadata is corrupt, not that the
/// caller did anything wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreTable(String);

impl StoreTable {
    pub fn new(name: &str) -> Result<StoreTable> {
        if !is_valid_identifier(name) {
            return Err(GisError::configuration("invalid table configuration"));
        }
        Ok(StoreTable(name.to_string()))
    }

    /// Resolve the store behind a dataset.
    pub fn for_dataset(dataset: &Dataset) -> Result<StoreTable> {
        StoreTable::new(dataset.queryable_table()?)
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// One feature row: id, optional geometry, open attribute map.
#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub id: i64,
    pub geometry: Option<Geometry>,
    pub properties: Map<String, JsonValue>,
}

impl FeatureRow {
    /// Coerce the stored JSONB value to an object map; non-object
    /// values (legal JSONB, corrupt for us) become an empty map.
    pub fn properties_from_json(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unvalidated_names() {
        assert!(StoreTable::new("ds_9f2a").is_ok());
        assert!(matches!(
            StoreTable::new("ds; DROP TABLE users"),
            Err(GisError::Configuration(_))
        ));
        assert!(StoreTable::new("1starts_with_digit").is_err());
        assert!(StoreTable::new("").is_err());
    }

    #[test]
    fn non_object_properties_become_empty() {
        assert!(FeatureRow::properties_from_json(serde_json::json!([1, 2])).is_empty());
        let m = FeatureRow::properties_from_json(serde_json::json!({"a": 1}));
        assert_eq!(m.len(), 1);
    }
}
