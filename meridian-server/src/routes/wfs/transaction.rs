//! WFS-T transaction processing.
//!
//! A Transaction document is applied atomically: all operations run on
//! one database transaction, and any failure rolls the whole batch
//! back and answers with a single exception listing every operation
//! that failed. Update and Delete refuse
//! to run without a constraining filter; a client that meant to touch
//! every row must say so with a filter that matches every row, because
//! the far more common case is a filter that failed to parse.

use super::{error_response, exception, xml_response};
use crate::error::{Result, ServerError};
use crate::identity::current_user;
use crate::registry;
use crate::state::AppState;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use meridian_codec::gml_wkt::gml_to_wkt;
use meridian_codec::{ows, XmlWriter};
use meridian_core::{parse_type_name, Dataset, GisError, XmlElement};
use meridian_engine::{write, StoreTable};
use meridian_filter::{compile_filter_element, CompiledPredicate};
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use uuid::Uuid;

const WFS_NS: &str = "http://www.opengis.net/wfs";
const OGC_NS: &str = "http://www.opengis.net/ogc";

pub async fn handle(
    state: &AppState,
    headers: &HeaderMap,
    query_token: Option<&str>,
    root: &XmlElement,
) -> Response {
    let user = match current_user(state, headers, query_token).await {
        Ok(user) => user,
        Err(err) => return error_response(err),
    };
    if !user.is_some_and(|u| u.is_admin) {
        return exception(
            StatusCode::FORBIDDEN,
            ows::NO_APPLICABLE_CODE,
            None,
            "transactions require an administrator token",
        );
    }

    let mut tx = match state.pool.begin().await {
        Ok(tx) => tx,
        Err(err) => return error_response(ServerError::Gis(GisError::from(err))),
    };

    let mut inserted_fids: Vec<String> = Vec::new();
    let mut updated: u64 = 0;
    let mut deleted: u64 = 0;
    let mut errors: Vec<String> = Vec::new();

    // every operation is attempted so the client sees all failures in
    // one report; statements issued after a database error fail inside
    // the aborted transaction and their messages collect alongside it
    for op in &root.children {
        let result = match op.name.as_str() {
            "Insert" => apply_insert(state, &mut tx, op, &mut inserted_fids).await,
            "Update" => match apply_update(state, &mut tx, op).await {
                Ok(n) => {
                    updated += n;
                    Ok(())
                }
                Err(err) => Err(err),
            },
            "Delete" => match apply_delete(state, &mut tx, op).await {
                Ok(n) => {
                    deleted += n;
                    Ok(())
                }
                Err(err) => Err(err),
            },
            other => Err(ServerError::bad_request(format!(
                "unsupported transaction operation '{other}'"
            ))),
        };
        if let Err(err) = result {
            errors.push(err.to_string());
        }
    }

    if !errors.is_empty() {
        if let Err(err) = tx.rollback().await {
            tracing::error!(error = %err, "transaction rollback failed");
        }
        return exception(
            StatusCode::INTERNAL_SERVER_ERROR,
            ows::OPERATION_PROCESSING_FAILED,
            None,
            &rollback_message(&errors),
        );
    }
    if let Err(err) = tx.commit().await {
        return error_response(ServerError::Gis(GisError::from(err)));
    }

    tracing::info!(
        inserted = inserted_fids.len(),
        updated,
        deleted,
        "transaction committed"
    );
    match response_document(&inserted_fids, updated, deleted) {
        Ok(body) => xml_response(StatusCode::OK, body),
        Err(err) => error_response(err),
    }
}

async fn apply_insert(
    state: &AppState,
    conn: &mut PgConnection,
    op: &XmlElement,
    fids: &mut Vec<String>,
) -> Result<()> {
    let op_type_name = op.attr("typeName");
    for feature in &op.children {
        let dataset_id = insert_dataset_id(op_type_name, &feature.name).ok_or_else(|| {
            ServerError::bad_request(format!("'{}' is not a feature element", feature.name))
        })?;
        let dataset = registry::by_id(&state.pool, dataset_id)
            .await?
            .ok_or_else(|| ServerError::not_found(format!("dataset {dataset_id} not found")))?;
        let table = StoreTable::for_dataset(&dataset)?;

        let (properties, wkt) = insert_payload(feature);
        let id = write::insert_feature(
            conn,
            &table,
            &JsonValue::Object(properties),
            wkt.as_deref(),
        )
        .await?;
        fids.push(format!("{}.{id}", dataset.type_name()));
    }
    Ok(())
}

/// Properties and geometry WKT carried by one Insert feature element.
///
/// `boundedBy` envelopes and elements with no text are metadata, not
/// attributes, and are not stored.
fn insert_payload(feature: &XmlElement) -> (serde_json::Map<String, JsonValue>, Option<String>) {
    let mut properties = serde_json::Map::new();
    let mut wkt: Option<String> = None;
    for child in &feature.children {
        match child.name.as_str() {
            "geometry" | "Shape" => {
                if let Some(geom) = child.children.first() {
                    let converted = gml_to_wkt(geom);
                    if !converted.is_empty() {
                        wkt = Some(converted);
                    }
                }
            }
            "boundedBy" => {}
            _ => {
                let text = child.text_trimmed();
                if !text.is_empty() {
                    properties.insert(child.name.clone(), JsonValue::String(text.to_string()));
                }
            }
        }
    }
    (properties, wkt)
}

async fn apply_update(state: &AppState, conn: &mut PgConnection, op: &XmlElement) -> Result<u64> {
    let updates = update_pairs(op);
    if updates.is_empty() {
        // nothing to change; a filter is only required when rows would move
        return Ok(0);
    }

    let mut predicate = CompiledPredicate::new();
    constrained_filter(op, &mut predicate, "Update")?;
    let dataset = dataset_for_type_attr(state, op).await?;
    let table = StoreTable::for_dataset(&dataset)?;
    Ok(write::update_features(conn, &table, &mut predicate, &updates).await?)
}

/// Name/value pairs from an Update operation's Property children.
fn update_pairs(op: &XmlElement) -> Vec<(String, String)> {
    let mut updates: Vec<(String, String)> = Vec::new();
    for prop in op.children.iter().filter(|c| c.name == "Property") {
        let Some(name) = prop.child("Name") else {
            continue;
        };
        let name = local_part(name.text_trimmed());
        if name.is_empty() {
            continue;
        }
        let value = prop
            .child("Value")
            .map(|v| v.text_trimmed().to_string())
            .unwrap_or_default();
        updates.push((name.to_string(), value));
    }
    updates
}

async fn apply_delete(state: &AppState, conn: &mut PgConnection, op: &XmlElement) -> Result<u64> {
    let mut predicate = CompiledPredicate::new();
    constrained_filter(op, &mut predicate, "Delete")?;
    let dataset = dataset_for_type_attr(state, op).await?;
    let table = StoreTable::for_dataset(&dataset)?;
    Ok(write::delete_features(conn, &table, &predicate).await?)
}

/// Compile the operation's filter, rejecting the unconstrained case.
fn constrained_filter(
    op: &XmlElement,
    predicate: &mut CompiledPredicate,
    operation: &str,
) -> Result<()> {
    let added = match op.child("Filter") {
        Some(filter) => compile_filter_element(filter, predicate)?,
        None => false,
    };
    if !added {
        return Err(ServerError::bad_request(format!(
            "{operation} requires a constraining filter"
        )));
    }
    Ok(())
}

/// Dataset id from an Insert feature element name.
fn element_dataset_id(element_name: &str) -> Option<Uuid> {
    let suffix = element_name.strip_prefix("feature_")?;
    Uuid::parse_str(&suffix.replace('_', "-")).ok()
}

/// Resolve an Insert target: the operation's `typeName` attribute when
/// it carries a readable `gis:{uuid}` name, the feature element's own
/// `feature_{uuid}` name otherwise.
fn insert_dataset_id(op_type_name: Option<&str>, element_name: &str) -> Option<Uuid> {
    op_type_name
        .and_then(parse_type_name)
        .or_else(|| element_dataset_id(element_name))
}

fn rollback_message(errors: &[String]) -> String {
    format!("transaction rolled back: {}", errors.join("; "))
}

async fn dataset_for_type_attr(state: &AppState, op: &XmlElement) -> Result<Dataset> {
    let type_name = op
        .attr("typeName")
        .ok_or_else(|| ServerError::bad_request("typeName attribute is required"))?;
    registry::by_type_name(&state.pool, type_name)
        .await?
        .ok_or_else(|| ServerError::not_found(format!("unknown feature type '{type_name}'")))
}

fn local_part(name: &str) -> &str {
    match name.rsplit_once(':') {
        Some((_, local)) => local,
        None => name,
    }
}

fn response_document(fids: &[String], updated: u64, deleted: u64) -> Result<String> {
    let mut w = XmlWriter::new();
    w.declaration()?;
    w.open(
        "wfs:TransactionResponse",
        &[
            ("version", "1.1.0"),
            ("xmlns:wfs", WFS_NS),
            ("xmlns:ogc", OGC_NS),
        ],
    )?;
    w.open("wfs:TransactionSummary", &[])?;
    w.leaf("wfs:totalInserted", &[], &fids.len().to_string())?;
    w.leaf("wfs:totalUpdated", &[], &updated.to_string())?;
    w.leaf("wfs:totalDeleted", &[], &deleted.to_string())?;
    w.close("wfs:TransactionSummary")?;
    if !fids.is_empty() {
        w.open("wfs:InsertResults", &[])?;
        for fid in fids {
            w.open("wfs:Feature", &[])?;
            w.empty("ogc:FeatureId", &[("fid", fid.as_str())])?;
            w.close("wfs:Feature")?;
        }
        w.close("wfs:InsertResults")?;
    }
    w.close("wfs:TransactionResponse")?;
    Ok(w.finish()?)
}
