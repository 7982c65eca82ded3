//! Schema introspection by sampling, plus spatial metadata queries.
//!
//! The properties column has no schema; everything here is best-effort
//! over bounded samples. A key that never shows up in the sampled rows
//! is simply absent from the result.

use crate::query::MAX_PAGE_SIZE;
use crate::store::StoreTable;
use meridian_codec::{FieldDescriptor, FieldKind, Geometry};
use meridian_core::{is_valid_identifier, GisError, Result};
use serde_json::{json, Value as JsonValue};
use sqlx::{PgPool, Row};

/// Rows sampled for field inference.
const SAMPLE_ROWS: i64 = 100;
/// Distinct keys considered.
const MAX_SAMPLED_KEYS: usize = 100;
/// Values inspected per key when inferring its type.
const SAMPLE_VALUES_PER_KEY: usize = 5;

/// Regex (SQL-side) that admits values castable to a number.
const NUMERIC_PATTERN: &str = r"^-?[0-9]+(\.[0-9]+)?$";

/// Infer field descriptors from sampled properties objects.
///
/// Keys are taken in first-seen order up to the cap; per key, up to
/// five non-null values vote on the kind. Output is sorted by name.
pub fn infer_descriptors(samples: &[JsonValue]) -> Vec<FieldDescriptor> {
    let mut keys: Vec<String> = Vec::new();
    for sample in samples {
        let JsonValue::Object(map) = sample else {
            continue;
        };
        for key in map.keys() {
            if keys.len() >= MAX_SAMPLED_KEYS {
                break;
            }
            if !keys.iter().any(|k| k == key) {
                keys.push(key.clone());
            }
        }
    }

    let mut descriptors: Vec<FieldDescriptor> = keys
        .into_iter()
        .map(|name| {
            let mut kinds = Vec::new();
            for sample in samples {
                if kinds.len() >= SAMPLE_VALUES_PER_KEY {
                    break;
                }
                if let JsonValue::Object(map) = sample {
                    if let Some(kind) = map.get(&name).and_then(FieldKind::classify) {
                        kinds.push(kind);
                    }
                }
            }
            FieldDescriptor {
                name,
                kind: FieldKind::dominant(&kinds),
            }
        })
        .collect();
    descriptors.sort_by(|a, b| a.name.cmp(&b.name));
    descriptors
}

/// Sample the store and infer its field descriptors.
pub async fn field_descriptors(pool: &PgPool, table: &StoreTable) -> Result<Vec<FieldDescriptor>> {
    let sql = format!(
        "SELECT properties FROM {} WHERE properties IS NOT NULL LIMIT {SAMPLE_ROWS}",
        table.name()
    );
    let samples: Vec<JsonValue> = sqlx::query_scalar(&sql).fetch_all(pool).await?;
    tracing::debug!(
        table = table.name(),
        samples = samples.len(),
        "inferring field descriptors"
    );
    Ok(infer_descriptors(&samples))
}

/// Reinterpret a distinct text value as a typed scalar.
pub fn reparse_scalar(raw: &str) -> JsonValue {
    if let Ok(i) = raw.parse::<i64>() {
        return json!(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return json!(f);
        }
    }
    json!(raw)
}

pub fn unique_values_sql(table: &StoreTable, field: &str) -> String {
    format!(
        "SELECT DISTINCT properties->>'{field}' AS v FROM {} \
         WHERE properties->>'{field}' IS NOT NULL ORDER BY v LIMIT $1",
        table.name()
    )
}

/// Distinct values of one field plus the total distinct count.
pub async fn unique_values(
    pool: &PgPool,
    table: &StoreTable,
    field: &str,
    limit: i64,
) -> Result<(Vec<JsonValue>, i64)> {
    if !is_valid_identifier(field) {
        return Err(GisError::configuration("invalid field name"));
    }
    let limit = limit.clamp(1, MAX_PAGE_SIZE);
    let sql = unique_values_sql(table, field);
    let raw: Vec<String> = sqlx::query_scalar(&sql).bind(limit).fetch_all(pool).await?;

    let count_sql = format!(
        "SELECT COUNT(DISTINCT properties->>'{field}') FROM {}",
        table.name()
    );
    let total: i64 = sqlx::query_scalar(&count_sql).fetch_one(pool).await?;

    Ok((raw.iter().map(|v| reparse_scalar(v)).collect(), total))
}

/// Numeric aggregates over one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldStats {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub count: i64,
}

pub fn statistics_sql(table: &StoreTable, field: &str) -> String {
    format!(
        "SELECT MIN((properties->>'{field}')::float8) AS min, \
         MAX((properties->>'{field}')::float8) AS max, \
         AVG((properties->>'{field}')::float8) AS mean, \
         COUNT(*) AS count \
         FROM {} WHERE properties->>'{field}' ~ '{NUMERIC_PATTERN}'",
        table.name()
    )
}

/// Min/max/mean/count over the numeric-looking values of a field.
///
/// Rows whose value does not match the numeric pattern are excluded
/// from all four aggregates; they are not counted as zero.
pub async fn field_statistics(pool: &PgPool, table: &StoreTable, field: &str) -> Result<FieldStats> {
    if !is_valid_identifier(field) {
        return Err(GisError::configuration("invalid field name"));
    }
    let sql = statistics_sql(table, field);
    let row = sqlx::query(&sql).fetch_one(pool).await?;
    Ok(FieldStats {
        min: row.try_get("min")?,
        max: row.try_get("max")?,
        mean: row.try_get("mean")?,
        count: row.try_get("count")?,
    })
}

/// Bounding box of the whole store as (minx, miny, maxx, maxy).
pub async fn layer_extent(pool: &PgPool, table: &StoreTable) -> Result<Option<(f64, f64, f64, f64)>> {
    let sql = format!(
        "SELECT ST_XMin(e) AS minx, ST_YMin(e) AS miny, ST_XMax(e) AS maxx, ST_YMax(e) AS maxy \
         FROM (SELECT ST_Extent(geom) AS e FROM {}) AS sub",
        table.name()
    );
    let row = sqlx::query(&sql).fetch_one(pool).await?;
    let minx: Option<f64> = row.try_get("minx")?;
    let miny: Option<f64> = row.try_get("miny")?;
    let maxx: Option<f64> = row.try_get("maxx")?;
    let maxy: Option<f64> = row.try_get("maxy")?;
    Ok(match (minx, miny, maxx, maxy) {
        (Some(a), Some(b), Some(c), Some(d)) => Some((a, b, c, d)),
        _ => None,
    })
}

/// One stored geometry, used to resolve the layer's geometry type from
/// live data instead of registry metadata.
pub async fn sample_geometry(pool: &PgPool, table: &StoreTable) -> Result<Option<Geometry>> {
    let sql = format!(
        "SELECT ST_AsGeoJSON(geom) FROM {} WHERE geom IS NOT NULL LIMIT 1",
        table.name()
    );
    let raw: Option<String> = sqlx::query_scalar(&sql).fetch_optional(pool).await?;
    Ok(raw.as_deref().and_then(Geometry::from_geojson_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inference_votes_with_priority() {
        let samples = vec![
            json!({"name": "a", "pop": 10, "flag": true}),
            json!({"name": "b", "pop": "n/a", "flag": false}),
            json!({"name": null, "pop": 12.5}),
        ];
        let fields = infer_descriptors(&samples);
        let by_name = |n: &str| fields.iter().find(|f| f.name == n).unwrap().kind;
        assert_eq!(by_name("name"), FieldKind::String);
        // mixed number/string resolves to number
        assert_eq!(by_name("pop"), FieldKind::Number);
        assert_eq!(by_name("flag"), FieldKind::Boolean);
    }

    #[test]
    fn inference_output_is_sorted() {
        let samples = vec![json!({"zeta": 1, "alpha": "x"})];
        let fields = infer_descriptors(&samples);
        assert_eq!(fields[0].name, "alpha");
        assert_eq!(fields[1].name, "zeta");
    }

    #[test]
    fn key_cap_is_applied() {
        let mut obj = serde_json::Map::new();
        for i in 0..150 {
            obj.insert(format!("k{i:03}"), json!(i));
        }
        let fields = infer_descriptors(&[JsonValue::Object(obj)]);
        assert_eq!(fields.len(), 100);
    }

    #[test]
    fn reparse_recovers_numbers() {
        assert_eq!(reparse_scalar("1"), json!(1));
        assert_eq!(reparse_scalar("2.5"), json!(2.5));
        assert_eq!(reparse_scalar("abc"), json!("abc"));
        assert_eq!(reparse_scalar("-42"), json!(-42));
        // non-finite parses must stay strings
        assert_eq!(reparse_scalar("inf"), json!("inf"));
    }

    #[test]
    fn statistics_sql_guards_with_numeric_pattern() {
        let table = StoreTable::new("ds_x").unwrap();
        let sql = statistics_sql(&table, "pop");
        assert!(sql.contains(r"~ '^-?[0-9]+(\.[0-9]+)?$'"));
        assert!(sql.contains("AVG((properties->>'pop')::float8)"));
    }
}
