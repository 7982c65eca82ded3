//! Internal feature REST surface (read-only).

use crate::error::{Result, ServerError};
use crate::identity::current_user;
use crate::registry::{self, ensure_readable};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use meridian_core::Dataset;
use meridian_engine::{introspect, query, PageOptions, SortKey, StoreTable};
use meridian_filter::ogc::{Envelope, FilterNode};
use meridian_filter::{compile_column_filters, ColumnFilter, CompiledPredicate};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use uuid::Uuid;

async fn resolve_dataset(
    state: &AppState,
    id: Uuid,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> Result<(Dataset, StoreTable)> {
    let dataset = registry::by_id(&state.pool, id)
        .await?
        .ok_or_else(|| ServerError::not_found(format!("dataset {id} not found")))?;
    let user = current_user(state, headers, query_token).await?;
    ensure_readable(&dataset, user.as_ref())?;
    let table = StoreTable::for_dataset(&dataset)?;
    Ok((dataset, table))
}

#[derive(Debug, Deserialize)]
pub struct FeatureQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    /// JSON array of `{field, op, value}` objects
    pub filters: Option<String>,
    pub include_geometry: Option<bool>,
    pub access_token: Option<String>,
}

/// `GET /api/datasets/{id}/features`
pub async fn features(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<FeatureQuery>,
    headers: HeaderMap,
) -> Result<Json<JsonValue>> {
    let (_, table) =
        resolve_dataset(&state, id, &headers, params.access_token.as_deref()).await?;

    let mut predicate = CompiledPredicate::new();
    if let Some(raw) = params.filters.as_deref() {
        let filters: Vec<ColumnFilter> = serde_json::from_str(raw)
            .map_err(|_| ServerError::bad_request("filters must be a JSON array of {field, op, value}"))?;
        compile_column_filters(&mut predicate, &filters)?;
    }

    let page_number = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(50).clamp(1, 1000);
    let sort = match params.sort_by.as_deref() {
        None | Some("id") => SortKey::Id,
        Some(field) => SortKey::Field(field.to_string()),
    };
    let descending = params
        .sort_order
        .as_deref()
        .is_some_and(|o| o.eq_ignore_ascii_case("desc"));

    let total = query::count(&state.pool, &table, &predicate).await?;
    let opts = PageOptions {
        limit: page_size,
        offset: (page_number - 1) * page_size,
        sort,
        descending,
        include_geometry: params.include_geometry.unwrap_or(false),
    };
    let page = query::page(&state.pool, &table, predicate, &opts).await?;

    let features: Vec<JsonValue> = page
        .rows
        .iter()
        .map(|row| {
            let mut feature = json!({"id": row.id, "properties": row.properties});
            if opts.include_geometry {
                feature["geometry"] = serde_json::to_value(&row.geometry).unwrap_or(JsonValue::Null);
            }
            feature
        })
        .collect();

    let total_pages = if total == 0 {
        0
    } else {
        (total + page_size - 1) / page_size
    };
    Ok(Json(json!({
        "features": features,
        "total_count": total,
        "page": page_number,
        "page_size": page_size,
        "total_pages": total_pages,
    })))
}

#[derive(Debug, Deserialize)]
pub struct TokenOnly {
    pub access_token: Option<String>,
}

/// `GET /api/datasets/{id}/fields`
pub async fn fields(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<TokenOnly>,
    headers: HeaderMap,
) -> Result<Json<JsonValue>> {
    let (_, table) =
        resolve_dataset(&state, id, &headers, params.access_token.as_deref()).await?;
    let descriptors = introspect::field_descriptors(&state.pool, &table).await?;
    let fields: Vec<JsonValue> = descriptors
        .iter()
        .map(|d| json!({"name": d.name, "type": d.kind.name()}))
        .collect();
    Ok(Json(json!({"fields": fields})))
}

#[derive(Debug, Deserialize)]
pub struct UniqueValuesQuery {
    pub limit: Option<i64>,
    pub access_token: Option<String>,
}

/// `GET /api/datasets/{id}/fields/{field}/values`
pub async fn unique_values(
    State(state): State<Arc<AppState>>,
    Path((id, field)): Path<(Uuid, String)>,
    Query(params): Query<UniqueValuesQuery>,
    headers: HeaderMap,
) -> Result<Json<JsonValue>> {
    let (_, table) =
        resolve_dataset(&state, id, &headers, params.access_token.as_deref()).await?;
    let (values, total) =
        introspect::unique_values(&state.pool, &table, &field, params.limit.unwrap_or(100))
            .await?;
    Ok(Json(json!({"values": values, "total_count": total})))
}

/// `GET /api/datasets/{id}/fields/{field}/stats`
pub async fn field_stats(
    State(state): State<Arc<AppState>>,
    Path((id, field)): Path<(Uuid, String)>,
    Query(params): Query<TokenOnly>,
    headers: HeaderMap,
) -> Result<Json<JsonValue>> {
    let (_, table) =
        resolve_dataset(&state, id, &headers, params.access_token.as_deref()).await?;
    let stats = introspect::field_statistics(&state.pool, &table, &field).await?;
    Ok(Json(json!({
        "min": stats.min,
        "max": stats.max,
        "mean": stats.mean,
        "count": stats.count,
    })))
}

#[derive(Debug, Deserialize)]
pub struct GeoJsonQuery {
    /// `minx,miny,maxx,maxy`
    pub bbox: Option<String>,
    pub limit: Option<i64>,
    pub access_token: Option<String>,
}

pub(crate) fn parse_bbox(raw: &str) -> Result<Envelope> {
    let parts: Vec<f64> = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| ServerError::bad_request("bbox must be minx,miny,maxx,maxy"))?;
    if parts.len() < 4 {
        return Err(ServerError::bad_request("bbox must be minx,miny,maxx,maxy"));
    }
    Ok(Envelope {
        minx: parts[0],
        miny: parts[1],
        maxx: parts[2],
        maxy: parts[3],
    })
}

/// `GET /api/datasets/{id}/geojson`
///
/// Map-viewer endpoint: whole-layer GeoJSON with an optional bbox cut,
/// cacheable for a minute.
pub async fn geojson(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<GeoJsonQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    let (_, table) =
        resolve_dataset(&state, id, &headers, params.access_token.as_deref()).await?;

    let mut predicate = CompiledPredicate::new();
    if let Some(raw) = params.bbox.as_deref() {
        let envelope = parse_bbox(raw)?;
        if let Some(clause) = FilterNode::Bbox(Some(envelope)).compile(&mut predicate.params)? {
            predicate.clauses.push(clause);
        }
    }

    let opts = PageOptions {
        limit: params.limit.unwrap_or(10_000),
        ..Default::default()
    };
    let page = query::page(&state.pool, &table, predicate, &opts).await?;

    let features: Vec<JsonValue> = page
        .rows
        .iter()
        .map(|row| {
            json!({
                "type": "Feature",
                "id": row.id,
                "geometry": row.geometry,
                "properties": row.properties,
            })
        })
        .collect();
    let body = json!({"type": "FeatureCollection", "features": features});

    Ok((
        [
            ("content-type", "application/geo+json"),
            ("cache-control", "public, max-age=60"),
        ],
        body.to_string(),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_parsing() {
        let e = parse_bbox("0, 0, 10, 10").unwrap();
        assert_eq!((e.minx, e.miny, e.maxx, e.maxy), (0.0, 0.0, 10.0, 10.0));
        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
    }
}
