//! ESRI ArcGIS Feature Server REST surface.
//!
//! One FeatureServer per dataset, one layer (id 0) per service. The
//! service name in the URL is the dataset name or its slug. Query
//! constraints honor `objectIds` and envelope `geometry`; the `where`
//! parameter is accepted for client compatibility but not translated
//! to SQL, so it never constrains the result.

use crate::error::{Result, ServerError};
use crate::identity::current_user;
use crate::registry::{self, ensure_readable};
use crate::state::AppState;
use axum::extract::{Form, Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use meridian_codec::esri;
use meridian_core::{slugify, Dataset, GeometryKind};
use meridian_engine::{introspect, query, PageOptions, StoreTable};
use meridian_filter::ogc::{Envelope, FilterNode};
use meridian_filter::CompiledPredicate;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;

const CURRENT_VERSION: f64 = 10.81;
const MAX_RECORD_COUNT: i64 = 50_000;

/// `GET /arcgis/rest/services`
pub async fn services(State(state): State<Arc<AppState>>) -> Result<Json<JsonValue>> {
    let datasets = registry::list_public_vector(&state.pool).await?;
    let services: Vec<JsonValue> = datasets
        .iter()
        .map(|d| json!({"name": slugify(&d.name), "type": "FeatureServer"}))
        .collect();
    Ok(Json(json!({
        "currentVersion": CURRENT_VERSION,
        "folders": [],
        "services": services,
    })))
}

async fn resolve_service(
    state: &AppState,
    service: &str,
    headers: &HeaderMap,
    token: Option<&str>,
) -> Result<(Dataset, StoreTable)> {
    let dataset = registry::by_name_or_slug(&state.pool, service)
        .await?
        .ok_or_else(|| ServerError::not_found(format!("service '{service}' not found")))?;
    let user = current_user(state, headers, token).await?;
    ensure_readable(&dataset, user.as_ref())?;
    let table = StoreTable::for_dataset(&dataset)?;
    Ok((dataset, table))
}

/// ESRI geometry type from registry metadata, used when the store has
/// no geometry to sample.
fn kind_geometry_type(kind: Option<GeometryKind>) -> &'static str {
    match kind {
        Some(GeometryKind::MultiPoint) => "esriGeometryMultipoint",
        Some(GeometryKind::LineString) | Some(GeometryKind::MultiLineString) => {
            "esriGeometryPolyline"
        }
        Some(GeometryKind::Polygon) | Some(GeometryKind::MultiPolygon) => "esriGeometryPolygon",
        _ => "esriGeometryPoint",
    }
}

async fn layer_geometry_type(state: &AppState, dataset: &Dataset, table: &StoreTable) -> String {
    match introspect::sample_geometry(&state.pool, table).await {
        Ok(Some(geometry)) => esri::esri_geometry_type(&geometry).to_string(),
        _ => kind_geometry_type(dataset.geometry_kind).to_string(),
    }
}

fn renderer(geometry_type: &str) -> JsonValue {
    match geometry_type {
        "esriGeometryPolygon" => json!({
            "type": "simple",
            "symbol": {
                "type": "esriSFS",
                "style": "esriSFSSolid",
                "color": [76, 129, 205, 191],
                "outline": {
                    "type": "esriSLS",
                    "style": "esriSLSSolid",
                    "color": [0, 0, 0, 255],
                    "width": 0.75,
                },
            },
        }),
        "esriGeometryPolyline" => json!({
            "type": "simple",
            "symbol": {
                "type": "esriSLS",
                "style": "esriSLSSolid",
                "color": [76, 129, 205, 255],
                "width": 1.5,
            },
        }),
        _ => json!({
            "type": "simple",
            "symbol": {
                "type": "esriSMS",
                "style": "esriSMSCircle",
                "color": [76, 129, 205, 191],
                "size": 8,
                "outline": {"color": [0, 0, 0, 255], "width": 0.75},
            },
        }),
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct TokenParam {
    pub token: Option<String>,
}

/// `GET /arcgis/rest/services/{service}/FeatureServer`
pub async fn feature_server(
    State(state): State<Arc<AppState>>,
    Path(service): Path<String>,
    Query(params): Query<TokenParam>,
    headers: HeaderMap,
) -> Result<Json<JsonValue>> {
    let (dataset, table) =
        resolve_service(&state, &service, &headers, params.token.as_deref()).await?;
    let geometry_type = layer_geometry_type(&state, &dataset, &table).await;
    Ok(Json(json!({
        "currentVersion": CURRENT_VERSION,
        "serviceDescription": dataset.description,
        "hasVersionedData": false,
        "supportsDisconnectedEditing": false,
        "supportedQueryFormats": "JSON",
        "maxRecordCount": MAX_RECORD_COUNT,
        "capabilities": "Query",
        "spatialReference": esri::spatial_reference(),
        "layers": [{
            "id": 0,
            "name": dataset.name,
            "type": "Feature Layer",
            "defaultVisibility": true,
            "geometryType": geometry_type,
            "minScale": 0,
            "maxScale": 0,
        }],
        "tables": [],
    })))
}

/// `GET /arcgis/rest/services/{service}/FeatureServer/0`
pub async fn layer(
    State(state): State<Arc<AppState>>,
    Path(service): Path<String>,
    Query(params): Query<TokenParam>,
    headers: HeaderMap,
) -> Result<Json<JsonValue>> {
    let (dataset, table) =
        resolve_service(&state, &service, &headers, params.token.as_deref()).await?;
    let geometry_type = layer_geometry_type(&state, &dataset, &table).await;
    let descriptors = introspect::field_descriptors(&state.pool, &table).await?;
    let extent = introspect::layer_extent(&state.pool, &table).await?;

    let extent = match extent {
        Some((minx, miny, maxx, maxy)) => json!({
            "xmin": minx,
            "ymin": miny,
            "xmax": maxx,
            "ymax": maxy,
            "spatialReference": esri::spatial_reference(),
        }),
        None => json!({
            "xmin": -180.0,
            "ymin": -90.0,
            "xmax": 180.0,
            "ymax": 90.0,
            "spatialReference": esri::spatial_reference(),
        }),
    };
    let display_field = descriptors
        .first()
        .map(|d| d.name.clone())
        .unwrap_or_else(|| "OBJECTID".to_string());

    Ok(Json(json!({
        "currentVersion": CURRENT_VERSION,
        "id": 0,
        "name": dataset.name,
        "type": "Feature Layer",
        "description": dataset.description,
        "copyrightText": "",
        "defaultVisibility": true,
        "geometryType": geometry_type,
        "sourceSpatialReference": esri::spatial_reference(),
        "extent": extent,
        "drawingInfo": {"renderer": renderer(&geometry_type)},
        "hasAttachments": false,
        "objectIdField": "OBJECTID",
        "displayField": display_field,
        "fields": esri::field_definitions(&descriptors),
        "maxRecordCount": MAX_RECORD_COUNT,
        "supportedQueryFormats": "JSON",
        "capabilities": "Query",
        "supportsAdvancedQueries": false,
        "supportsStatistics": false,
    })))
}

/// Build the query predicate from request parameters.
///
/// Only `objectIds` and an envelope `geometry` constrain the result;
/// `where` is logged and dropped.
fn build_query_predicate(params: &HashMap<String, String>) -> Result<CompiledPredicate> {
    let mut predicate = CompiledPredicate::new();

    if let Some(where_clause) = params.get("where") {
        if !where_clause.is_empty() {
            tracing::debug!(clause = %where_clause, "where parameter ignored");
        }
    }

    if let Some(raw) = params.get("objectIds").filter(|v| !v.is_empty()) {
        let nodes: Vec<FilterNode> = raw
            .split(',')
            .map(|id| FilterNode::FeatureId(id.trim().parse().ok()))
            .collect();
        if let Some(clause) = FilterNode::Or(nodes).compile(&mut predicate.params)? {
            predicate.clauses.push(clause);
        }
    }

    if let Some(raw) = params.get("geometry").filter(|v| !v.is_empty()) {
        if let Some(envelope) = parse_esri_envelope(raw) {
            if let Some(clause) =
                FilterNode::Bbox(Some(envelope)).compile(&mut predicate.params)?
            {
                predicate.clauses.push(clause);
            }
        }
    }

    Ok(predicate)
}

/// Parse the `geometry` parameter: an envelope JSON object or the
/// short `xmin,ymin,xmax,ymax` form.
fn parse_esri_envelope(raw: &str) -> Option<Envelope> {
    if let Ok(value) = serde_json::from_str::<JsonValue>(raw) {
        let f = |key: &str| value.get(key).and_then(JsonValue::as_f64);
        return Some(Envelope {
            minx: f("xmin")?,
            miny: f("ymin")?,
            maxx: f("xmax")?,
            maxy: f("ymax")?,
        });
    }
    let parts: Vec<f64> = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    if parts.len() < 4 {
        return None;
    }
    Some(Envelope {
        minx: parts[0],
        miny: parts[1],
        maxx: parts[2],
        maxy: parts[3],
    })
}

fn truthy(params: &HashMap<String, String>, key: &str) -> bool {
    params
        .get(key)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

async fn run_query(
    state: &AppState,
    service: &str,
    params: &HashMap<String, String>,
    headers: &HeaderMap,
) -> Result<Json<JsonValue>> {
    let (dataset, table) = resolve_service(
        state,
        service,
        headers,
        params.get("token").map(String::as_str),
    )
    .await?;

    let predicate = build_query_predicate(params)?;

    if truthy(params, "returnCountOnly") {
        let count = query::count(&state.pool, &table, &predicate).await?;
        return Ok(Json(esri::count_response(count)));
    }
    if truthy(params, "returnIdsOnly") {
        let ids = query::list_ids(&state.pool, &table, &predicate).await?;
        return Ok(Json(esri::ids_response(&ids)));
    }

    let return_geometry = params
        .get("returnGeometry")
        .map(|v| !v.eq_ignore_ascii_case("false"))
        .unwrap_or(true);
    let limit = params
        .get("resultRecordCount")
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(MAX_RECORD_COUNT);
    let offset = params
        .get("resultOffset")
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|n| *n >= 0)
        .unwrap_or(0);

    let geometry_type = layer_geometry_type(state, &dataset, &table).await;
    let descriptors = introspect::field_descriptors(&state.pool, &table).await?;

    let opts = PageOptions {
        limit,
        offset,
        include_geometry: return_geometry,
        ..Default::default()
    };
    let page = query::page(&state.pool, &table, predicate, &opts).await?;

    let features: Vec<JsonValue> = page
        .rows
        .iter()
        .map(|row| {
            let mut feature = json!({
                "attributes": esri::feature_attributes(row.id, &row.properties),
            });
            if return_geometry {
                if let Some(geometry) = &row.geometry {
                    feature["geometry"] = esri::geometry_to_esri(geometry);
                }
            }
            feature
        })
        .collect();

    Ok(Json(esri::query_response(
        &geometry_type,
        esri::field_definitions(&descriptors),
        features,
        page.has_more,
    )))
}

/// `GET /arcgis/rest/services/{service}/FeatureServer/0/query`
pub async fn query_get(
    State(state): State<Arc<AppState>>,
    Path(service): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<JsonValue>> {
    run_query(&state, &service, &params, &headers).await
}

/// `POST /arcgis/rest/services/{service}/FeatureServer/0/query`
pub async fn query_post(
    State(state): State<Arc<AppState>>,
    Path(service): Path<String>,
    headers: HeaderMap,
    Form(params): Form<HashMap<String, String>>,
) -> Result<Json<JsonValue>> {
    run_query(&state, &service, &params, &headers).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn where_clause_is_not_translated() {
        let predicate = build_query_predicate(&params(&[("where", "pop > 1000")])).unwrap();
        assert!(predicate.is_unconstrained());
    }

    #[test]
    fn object_ids_become_an_id_disjunction() {
        let predicate = build_query_predicate(&params(&[("objectIds", "1, 2, 3")])).unwrap();
        assert_eq!(predicate.clauses, vec!["(id = $1 OR id = $2 OR id = $3)"]);
    }

    #[test]
    fn envelope_geometry_constrains_spatially() {
        let predicate = build_query_predicate(&params(&[(
            "geometry",
            r#"{"xmin": 0, "ymin": 0, "xmax": 10, "ymax": 10}"#,
        )]))
        .unwrap();
        assert_eq!(predicate.clauses.len(), 1);
        assert!(predicate.clauses[0].starts_with("ST_Intersects(geom,"));
    }

    #[test]
    fn envelope_accepts_the_comma_form() {
        let env = parse_esri_envelope("0, 1, 2, 3").unwrap();
        assert_eq!((env.minx, env.miny, env.maxx, env.maxy), (0.0, 1.0, 2.0, 3.0));
        assert!(parse_esri_envelope("0,1,2").is_none());
        assert!(parse_esri_envelope("{\"xmin\": 1}").is_none());
    }

    #[test]
    fn metadata_geometry_type_fallback() {
        assert_eq!(
            kind_geometry_type(Some(GeometryKind::MultiLineString)),
            "esriGeometryPolyline"
        );
        assert_eq!(
            kind_geometry_type(Some(GeometryKind::MultiPolygon)),
            "esriGeometryPolygon"
        );
        assert_eq!(kind_geometry_type(None), "esriGeometryPoint");
    }
}
