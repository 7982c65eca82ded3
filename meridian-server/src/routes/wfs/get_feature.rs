//! WFS GetFeature over the feature store.
//!
//! Accepts the 1.1.0 KVP parameters (plus the 2.0 spellings `count`
//! and `resourceId` that real clients send anyway) and answers in GML
//! 3.1.1 or GeoJSON depending on `outputFormat`. The target feature
//! type may be named explicitly or inferred from a requested feature
//! id, whose `gis:{uuid}.{n}` shape carries the dataset id.

use super::{exception, xml_response, WfsParams};
use crate::error::{Result, ServerError};
use crate::identity::current_user;
use crate::registry::{self, ensure_readable};
use crate::state::AppState;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use meridian_codec::{gml, ows, XmlWriter};
use meridian_core::{is_valid_identifier, parse_type_name, Dataset};
use meridian_engine::{query, FeatureRow, PageOptions, StoreTable};
use meridian_filter::ogc::FilterNode;
use meridian_filter::{compile_ogc_filter, CompiledPredicate};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

const GIS_NS: &str = "http://meridian.dev/gis";
const WFS_NS: &str = "http://www.opengis.net/wfs";
const GML_NS: &str = "http://www.opengis.net/gml";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

// the plain EPSG form keeps default output in longitude-first order;
// clients that want the urn axis order must ask for it with srsName
const DEFAULT_SRS: &str = "EPSG:4326";
const DEFAULT_MAX_FEATURES: i64 = 1000;

pub async fn get_feature(
    state: &AppState,
    params: &WfsParams,
    headers: &HeaderMap,
) -> Result<Response> {
    let fids: Vec<&str> = params
        .get("featureid")
        .or_else(|| params.get("resourceid"))
        .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let type_name = params
        .get("typename")
        .or_else(|| params.get("typenames"))
        .map(str::to_string)
        .or_else(|| fids.first().and_then(|fid| type_name_of_fid(fid)));
    let Some(type_name) = type_name else {
        return Ok(exception(
            StatusCode::BAD_REQUEST,
            ows::MISSING_PARAMETER_VALUE,
            Some("typeName"),
            "typeName parameter is required",
        ));
    };
    // clients may list several type names; only the first is served
    let type_name = match type_name.split(',').next() {
        Some(first) => first.to_string(),
        None => type_name,
    };

    let dataset = registry::by_type_name(&state.pool, &type_name)
        .await?
        .ok_or_else(|| ServerError::not_found(format!("unknown feature type '{type_name}'")))?;
    let user = current_user(state, headers, params.get("access_token")).await?;
    ensure_readable(&dataset, user.as_ref())?;
    let table = StoreTable::for_dataset(&dataset)?;

    let mut predicate = CompiledPredicate::new();
    if !fids.is_empty() {
        let nodes = fids
            .iter()
            .map(|fid| FilterNode::FeatureId(trailing_id(fid)))
            .collect();
        if let Some(clause) = FilterNode::Or(nodes).compile(&mut predicate.params)? {
            predicate.clauses.push(clause);
        }
    } else if let Some(filter_xml) = params.get("filter") {
        compile_ogc_filter(filter_xml, &mut predicate)?;
    } else if let Some(raw) = params.get("bbox") {
        let envelope = crate::routes::datasets::parse_bbox(raw)?;
        if let Some(clause) = FilterNode::Bbox(Some(envelope)).compile(&mut predicate.params)? {
            predicate.clauses.push(clause);
        }
    }

    let srs_name = params.get("srsname").unwrap_or(DEFAULT_SRS).to_string();
    let limit = positive_int(params.get("count"))
        .or_else(|| positive_int(params.get("maxfeatures")))
        .unwrap_or(DEFAULT_MAX_FEATURES);
    let offset = non_negative_int(params.get("startindex")).unwrap_or(0);
    let projection = params.get("propertyname").map(parse_projection);
    let wants_json = params
        .get("outputformat")
        .is_some_and(|f| f.to_ascii_lowercase().contains("json"));

    let total = query::count(&state.pool, &table, &predicate).await?;

    if params
        .get("resulttype")
        .is_some_and(|t| t.eq_ignore_ascii_case("hits"))
    {
        return Ok(xml_response(StatusCode::OK, hits_document(total)?));
    }

    let opts = PageOptions {
        limit,
        offset,
        include_geometry: true,
        ..Default::default()
    };
    let page = query::page(&state.pool, &table, predicate, &opts).await?;

    if wants_json {
        let body = geojson_document(&dataset, &page.rows, total, projection.as_deref());
        return Ok((
            [("content-type", "application/json")],
            body.to_string(),
        )
            .into_response());
    }

    let body = gml_document(
        &state.config.wfs_url(),
        &dataset,
        &page.rows,
        &srs_name,
        projection.as_deref(),
    )?;
    Ok(xml_response(StatusCode::OK, body))
}

/// Dataset type name carried by a dotted feature id, if any.
fn type_name_of_fid(fid: &str) -> Option<String> {
    let (prefix, _) = fid.rsplit_once('.')?;
    parse_type_name(prefix).map(|id: Uuid| format!("gis:{id}"))
}

fn trailing_id(fid: &str) -> Option<i64> {
    fid.rsplit('.').next()?.parse().ok()
}

fn positive_int(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|v| v.parse::<i64>().ok()).filter(|n| *n > 0)
}

fn non_negative_int(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|v| v.parse::<i64>().ok()).filter(|n| *n >= 0)
}

/// Split a `propertyName` list, dropping namespace prefixes.
fn parse_projection(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|p| {
            let p = p.trim();
            match p.rsplit_once(':') {
                Some((_, local)) => local.to_string(),
                None => p.to_string(),
            }
        })
        .filter(|p| !p.is_empty())
        .collect()
}

fn include_property(projection: Option<&[String]>, key: &str) -> bool {
    match projection {
        Some(names) => names.iter().any(|n| n == key),
        None => true,
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Count-only collection for `resultType=hits`.
fn hits_document(total: i64) -> Result<String> {
    let mut w = XmlWriter::new();
    w.declaration()?;
    w.open(
        "wfs:FeatureCollection",
        &[
            ("xmlns:wfs", WFS_NS),
            ("xmlns:gml", GML_NS),
            ("numberOfFeatures", &total.to_string()),
            ("timeStamp", &timestamp()),
        ],
    )?;
    w.close("wfs:FeatureCollection")?;
    Ok(w.finish()?)
}

fn geojson_document(
    dataset: &Dataset,
    rows: &[FeatureRow],
    total: i64,
    projection: Option<&[String]>,
) -> JsonValue {
    let type_name = dataset.type_name();
    let features: Vec<JsonValue> = rows
        .iter()
        .map(|row| {
            let properties: serde_json::Map<String, JsonValue> = row
                .properties
                .iter()
                .filter(|(key, _)| include_property(projection, key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            json!({
                "type": "Feature",
                "id": format!("{type_name}.{}", row.id),
                "geometry": row.geometry,
                "properties": properties,
            })
        })
        .collect();
    json!({
        "type": "FeatureCollection",
        "features": features,
        "numberMatched": total,
        "numberReturned": features.len(),
    })
}

fn gml_document(
    wfs_url: &str,
    dataset: &Dataset,
    rows: &[FeatureRow],
    srs_name: &str,
    projection: Option<&[String]>,
) -> Result<String> {
    let element = dataset.feature_element_name();
    let qualified = format!("gis:{element}");
    let id_stem = dataset.id.to_string().replace('-', "_");
    let describe_url = format!(
        "{wfs_url}?service=WFS&version=1.1.0&request=DescribeFeatureType&typeName={}",
        dataset.type_name()
    );
    let schema_location = format!(
        "{GIS_NS} {describe_url} {WFS_NS} http://schemas.opengis.net/wfs/1.1.0/wfs.xsd"
    );

    let mut w = XmlWriter::new();
    w.declaration()?;
    w.open(
        "wfs:FeatureCollection",
        &[
            ("xmlns:gis", GIS_NS),
            ("xmlns:wfs", WFS_NS),
            ("xmlns:gml", GML_NS),
            ("xmlns:xsi", XSI_NS),
            ("numberOfFeatures", &rows.len().to_string()),
            ("timeStamp", &timestamp()),
            ("xsi:schemaLocation", &schema_location),
        ],
    )?;
    w.open("gml:boundedBy", &[])?;
    w.leaf("gml:Null", &[], "unknown")?;
    w.close("gml:boundedBy")?;

    for row in rows {
        let gml_id = format!("F{id_stem}_{}", row.id);
        w.open("gml:featureMember", &[])?;
        w.open(&qualified, &[("gml:id", gml_id.as_str())])?;
        if let Some(geometry) = &row.geometry {
            w.open("gis:Shape", &[])?;
            gml::write_geometry(&mut w, geometry, srs_name)?;
            w.close("gis:Shape")?;
        }
        for (key, value) in &row.properties {
            // keys that cannot be XML element names are not representable
            if !is_valid_identifier(key) || !include_property(projection, key) {
                continue;
            }
            let name = format!("gis:{key}");
            match value {
                JsonValue::Null => w.empty(&name, &[("xsi:nil", "true")])?,
                JsonValue::String(s) => w.leaf(&name, &[], s)?,
                other => w.leaf(&name, &[], &other.to_string())?,
            }
        }
        w.close(&qualified)?;
        w.close("gml:featureMember")?;
    }

    w.close("wfs:FeatureCollection")?;
    Ok(w.finish()?)
}
