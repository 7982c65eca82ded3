//! Write primitives used by the WFS transaction processor.
//!
//! All three operations run on a caller-owned connection so the
//! processor can hold them inside one database transaction and roll
//! everything back together.

use crate::query::bind_query;
use crate::store::StoreTable;
use meridian_core::{is_valid_identifier, GisError, Result};
use meridian_filter::{BindValue, CompiledPredicate};
use serde_json::Value as JsonValue;
use sqlx::PgConnection;

/// Insert one feature, returning its new id.
///
/// `wkt` is the geometry in WKT form; `None` or empty inserts a row
/// with NULL geometry (unconvertible inbound GML degrades to this).
pub async fn insert_feature(
    conn: &mut PgConnection,
    table: &StoreTable,
    properties: &JsonValue,
    wkt: Option<&str>,
) -> Result<i64> {
    let id: i64 = match wkt.filter(|w| !w.is_empty()) {
        Some(wkt) => {
            let sql = format!(
                "INSERT INTO {} (geom, properties) \
                 VALUES (ST_GeomFromText($1, 4326), $2) RETURNING id::bigint",
                table.name()
            );
            sqlx::query_scalar(&sql)
                .bind(wkt)
                .bind(properties)
                .fetch_one(&mut *conn)
                .await?
        }
        None => {
            let sql = format!(
                "INSERT INTO {} (geom, properties) VALUES (NULL, $1) RETURNING id::bigint",
                table.name()
            );
            sqlx::query_scalar(&sql)
                .bind(properties)
                .fetch_one(&mut *conn)
                .await?
        }
    };
    Ok(id)
}

/// Build the UPDATE statement for a property-set operation.
///
/// Each value gets its own placeholder appended after the predicate's
/// parameters; property names go into the `jsonb_set` path and must
/// pass identifier validation.
pub fn update_sql(
    table: &StoreTable,
    predicate: &mut CompiledPredicate,
    updates: &[(String, String)],
) -> Result<String> {
    let mut expr = String::from("properties");
    for (name, value) in updates {
        if !is_valid_identifier(name) {
            return Err(GisError::validation(format!(
                "invalid property name '{name}'"
            )));
        }
        let p = predicate.params.push(BindValue::Text(value.clone()));
        expr = format!("jsonb_set({expr}, '{{{name}}}', to_jsonb({p}::text))");
    }
    Ok(format!(
        "UPDATE {} SET properties = {expr} WHERE {}",
        table.name(),
        predicate.where_sql()
    ))
}

/// Apply property updates to the rows matching the predicate.
///
/// Zero updates is a no-op success. The caller is responsible for
/// guaranteeing the predicate is constrained; this function does not
/// re-check it.
pub async fn update_features(
    conn: &mut PgConnection,
    table: &StoreTable,
    predicate: &mut CompiledPredicate,
    updates: &[(String, String)],
) -> Result<u64> {
    if updates.is_empty() {
        return Ok(0);
    }
    let sql = update_sql(table, predicate, updates)?;
    let result = bind_query(sqlx::query(&sql), predicate.params.values())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Delete the rows matching the predicate.
pub async fn delete_features(
    conn: &mut PgConnection,
    table: &StoreTable,
    predicate: &CompiledPredicate,
) -> Result<u64> {
    let sql = format!(
        "DELETE FROM {} WHERE {}",
        table.name(),
        predicate.where_sql()
    );
    let result = bind_query(sqlx::query(&sql), predicate.params.values())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
