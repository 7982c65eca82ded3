//! Read operations: count, id listing, paging, bulk fetch.

use crate::store::{FeatureRow, StoreTable};
use meridian_codec::Geometry;
use meridian_core::{is_valid_identifier, GisError, Result};
use meridian_filter::{BindValue, CompiledPredicate};
use sqlx::postgres::PgArguments;
use sqlx::{PgPool, Postgres, Row};

/// Hard ceiling on rows per page; callers cannot raise it.
pub const MAX_PAGE_SIZE: i64 = 50_000;

/// Sort order for `page()`.
///
/// Sorting by id is numeric; sorting by an attribute key compares the
/// JSONB text representation, so numeric attributes sort lexically.
/// Callers who need numeric order must sort by `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    Id,
    Field(String),
}

impl SortKey {
    fn order_sql(&self, descending: bool) -> Result<String> {
        let column = match self {
            SortKey::Id => "id".to_string(),
            SortKey::Field(field) => {
                if !is_valid_identifier(field) {
                    return Err(GisError::configuration("invalid sort field"));
                }
                format!("properties->>'{field}'")
            }
        };
        let direction = if descending { " DESC" } else { " ASC" };
        Ok(format!("{column}{direction}"))
    }
}

#[derive(Debug, Clone)]
pub struct PageOptions {
    pub limit: i64,
    pub offset: i64,
    pub sort: SortKey,
    pub descending: bool,
    pub include_geometry: bool,
}

impl Default for PageOptions {
    fn default() -> Self {
        PageOptions {
            limit: 100,
            offset: 0,
            sort: SortKey::Id,
            descending: false,
            include_geometry: true,
        }
    }
}

/// One page of rows plus the transfer-limit signal.
#[derive(Debug)]
pub struct Page {
    pub rows: Vec<FeatureRow>,
    /// Approximation: true when the page came back full. A result set
    /// whose size is an exact multiple of the limit reports one extra
    /// empty-but-flagged page.
    pub has_more: bool,
}

/// Apply accumulated bind values to a query, in placeholder order.
pub(crate) fn bind_query<'q>(
    mut query: sqlx::query::Query<'q, Postgres, PgArguments>,
    values: &'q [BindValue],
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    for value in values {
        query = match value {
            BindValue::Text(s) => query.bind(s),
            BindValue::Int(i) => query.bind(i),
            BindValue::Float(f) => query.bind(f),
            BindValue::Json(j) => query.bind(j),
        };
    }
    query
}

fn bind_scalar<'q, T>(
    mut query: sqlx::query::QueryScalar<'q, Postgres, T, PgArguments>,
    values: &'q [BindValue],
) -> sqlx::query::QueryScalar<'q, Postgres, T, PgArguments> {
    for value in values {
        query = match value {
            BindValue::Text(s) => query.bind(s),
            BindValue::Int(i) => query.bind(i),
            BindValue::Float(f) => query.bind(f),
            BindValue::Json(j) => query.bind(j),
        };
    }
    query
}

pub fn count_sql(table: &StoreTable, predicate: &CompiledPredicate) -> String {
    format!(
        "SELECT COUNT(*) FROM {} WHERE {}",
        table.name(),
        predicate.where_sql()
    )
}

/// Total matching rows.
pub async fn count(
    pool: &PgPool,
    table: &StoreTable,
    predicate: &CompiledPredicate,
) -> Result<i64> {
    let sql = count_sql(table, predicate);
    let count = bind_scalar(sqlx::query_scalar(&sql), predicate.params.values())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub fn list_ids_sql(table: &StoreTable, predicate: &CompiledPredicate) -> String {
    format!(
        "SELECT id::bigint FROM {} WHERE {} ORDER BY id",
        table.name(),
        predicate.where_sql()
    )
}

/// Matching ids, ascending.
pub async fn list_ids(
    pool: &PgPool,
    table: &StoreTable,
    predicate: &CompiledPredicate,
) -> Result<Vec<i64>> {
    let sql = list_ids_sql(table, predicate);
    let ids = bind_scalar(sqlx::query_scalar(&sql), predicate.params.values())
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

/// Build the page statement, pushing limit/offset onto the predicate's
/// parameter list. Returns the SQL and the clamped limit.
pub fn page_sql(
    table: &StoreTable,
    predicate: &mut CompiledPredicate,
    opts: &PageOptions,
) -> Result<(String, i64)> {
    let limit = opts.limit.clamp(1, MAX_PAGE_SIZE);
    let order = opts.sort.order_sql(opts.descending)?;
    let geometry_col = if opts.include_geometry {
        ", ST_AsGeoJSON(geom) AS geometry_json"
    } else {
        ""
    };
    let where_sql = predicate.where_sql();
    let limit_p = predicate.params.push(BindValue::Int(limit));
    let offset_p = predicate.params.push(BindValue::Int(opts.offset.max(0)));
    let sql = format!(
        "SELECT id::bigint AS id, properties{geometry_col} FROM {} WHERE {where_sql} \
         ORDER BY {order} LIMIT {limit_p} OFFSET {offset_p}",
        table.name()
    );
    Ok((sql, limit))
}

/// Fetch one page of features.
pub async fn page(
    pool: &PgPool,
    table: &StoreTable,
    mut predicate: CompiledPredicate,
    opts: &PageOptions,
) -> Result<Page> {
    let (sql, limit) = page_sql(table, &mut predicate, opts)?;
    let rows = bind_query(sqlx::query(&sql), predicate.params.values())
        .fetch_all(pool)
        .await?;
    let has_more = rows.len() as i64 == limit;
    let rows = rows
        .into_iter()
        .map(|row| decode_row(&row, opts.include_geometry))
        .collect::<Result<Vec<_>>>()?;
    Ok(Page { rows, has_more })
}

/// Bulk fetch by id; an empty id list short-circuits without a query.
pub async fn by_ids(
    pool: &PgPool,
    table: &StoreTable,
    ids: &[i64],
    include_geometry: bool,
) -> Result<Vec<FeatureRow>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let geometry_col = if include_geometry {
        ", ST_AsGeoJSON(geom) AS geometry_json"
    } else {
        ""
    };
    let sql = format!(
        "SELECT id::bigint AS id, properties{geometry_col} FROM {} \
         WHERE id = ANY($1) ORDER BY id",
        table.name()
    );
    let rows = sqlx::query(&sql).bind(ids).fetch_all(pool).await?;
    rows.iter()
        .map(|row| decode_row(row, include_geometry))
        .collect()
}

fn decode_row(row: &sqlx::postgres::PgRow, include_geometry: bool) -> Result<FeatureRow> {
    let id: i64 = row.try_get("id")?;
    let properties: serde_json::Value = row.try_get("properties")?;
    let geometry = if include_geometry {
        row.try_get::<Option<String>, _>("geometry_json")?
            .as_deref()
            .and_then(Geometry::from_geojson_str)
    } else {
        None
    };
    Ok(FeatureRow {
        id,
        geometry,
        properties: FeatureRow::properties_from_json(properties),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> StoreTable {
        StoreTable::new("ds_test").unwrap()
    }

    #[test]
    fn count_sql_uses_true_when_unconstrained() {
        let sql = count_sql(&table(), &CompiledPredicate::new());
        assert_eq!(sql, "SELECT COUNT(*) FROM ds_test WHERE TRUE");
    }

    #[test]
    fn page_sql_clamps_limit() {
        let mut pred = CompiledPredicate::new();
        let opts = PageOptions {
            limit: 999_999,
            ..Default::default()
        };
        let (sql, limit) = page_sql(&table(), &mut pred, &opts).unwrap();
        assert_eq!(limit, MAX_PAGE_SIZE);
        assert_eq!(
            pred.params.values(),
            &[BindValue::Int(MAX_PAGE_SIZE), BindValue::Int(0)]
        );
        assert!(sql.contains("LIMIT $1 OFFSET $2"));
    }

    #[test]
    fn page_sql_numbering_continues_after_predicate_params() {
        let mut pred = CompiledPredicate::new();
        let p = pred.params.push(BindValue::Text("active".into()));
        pred.clauses.push(format!("(properties->>'status') = {p}"));
        let (sql, _) = page_sql(&table(), &mut pred, &PageOptions::default()).unwrap();
        assert!(sql.contains("WHERE (properties->>'status') = $1"));
        assert!(sql.contains("LIMIT $2 OFFSET $3"));
    }

    #[test]
    fn attribute_sort_is_on_jsonb_text() {
        let mut pred = CompiledPredicate::new();
        let opts = PageOptions {
            sort: SortKey::Field("name".into()),
            descending: true,
            ..Default::default()
        };
        let (sql, _) = page_sql(&table(), &mut pred, &opts).unwrap();
        assert!(sql.contains("ORDER BY properties->>'name' DESC"));
    }

    #[test]
    fn invalid_sort_field_is_a_configuration_error() {
        let mut pred = CompiledPredicate::new();
        let opts = PageOptions {
            sort: SortKey::Field("name; --".into()),
            ..Default::default()
        };
        assert!(matches!(
            page_sql(&table(), &mut pred, &opts),
            Err(GisError::Configuration(_))
        ));
    }

    #[test]
    fn geometry_column_is_optional() {
        let mut pred = CompiledPredicate::new();
        let opts = PageOptions {
            include_geometry: false,
            ..Default::default()
        };
        let (sql, _) = page_sql(&table(), &mut pred, &opts).unwrap();
        assert!(!sql.contains("geometry_json"));
    }
}
