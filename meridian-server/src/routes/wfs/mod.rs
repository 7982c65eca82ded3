//! WFS 1.1.0 front-end: operation dispatch and exception mapping.
//!
//! GET carries query parameters (names are case-insensitive per the
//! spec and per real clients, which send `TYPENAME`, `typeName` and
//! `typename` interchangeably); POST carries an XML body and is
//! dispatched on the root element. Every error leaves as an OWS
//! ExceptionReport rather than the JSON error body the other surfaces
//! use.

mod capabilities;
mod describe;
mod get_feature;
mod transaction;

use crate::error::ServerError;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use meridian_codec::ows;
use meridian_core::{GisError, XmlElement};
use std::collections::HashMap;
use std::sync::Arc;

/// Query parameters with case-insensitive names.
pub struct WfsParams(HashMap<String, String>);

impl WfsParams {
    pub fn new(raw: HashMap<String, String>) -> Self {
        WfsParams(
            raw.into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(|v| v.as_str())
    }
}

pub(crate) fn xml_response(status: StatusCode, body: String) -> Response {
    (status, [("content-type", "application/xml")], body).into_response()
}

/// Build an OWS ExceptionReport response.
pub(crate) fn exception(
    status: StatusCode,
    code: &str,
    locator: Option<&str>,
    text: &str,
) -> Response {
    let body = ows::exception_report(code, locator, text).unwrap_or_else(|_| text.to_string());
    xml_response(status, body)
}

/// Map a server error onto the WFS exception vocabulary.
pub(crate) fn error_response(err: ServerError) -> Response {
    let (status, code) = match &err {
        ServerError::Gis(GisError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, ows::INVALID_PARAMETER_VALUE)
        }
        ServerError::Gis(GisError::AccessDenied(_)) => {
            (StatusCode::FORBIDDEN, ows::NO_APPLICABLE_CODE)
        }
        ServerError::Gis(GisError::Configuration(_)) | ServerError::Gis(GisError::Database(_)) => {
            tracing::error!(error = %err, "WFS request failed with server-side error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ows::OPERATION_PROCESSING_FAILED,
            )
        }
        _ => (StatusCode::BAD_REQUEST, ows::INVALID_PARAMETER_VALUE),
    };
    exception(status, code, None, &err.to_string())
}

fn respond(result: crate::error::Result<String>) -> Response {
    match result {
        Ok(xml) => xml_response(StatusCode::OK, xml),
        Err(err) => error_response(err),
    }
}

/// `GET /api/wfs`
pub async fn handle_get(
    State(state): State<Arc<AppState>>,
    Query(raw): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let params = WfsParams::new(raw);
    let Some(request) = params.get("request") else {
        return exception(
            StatusCode::BAD_REQUEST,
            ows::MISSING_PARAMETER_VALUE,
            Some("request"),
            "request parameter is required",
        );
    };

    match request.to_ascii_lowercase().as_str() {
        "getcapabilities" => respond(capabilities::get_capabilities(&state).await),
        "describefeaturetype" => match params.get("typename").or_else(|| params.get("typenames")) {
            Some(type_name) => respond(describe::describe(&state, type_name).await),
            None => exception(
                StatusCode::BAD_REQUEST,
                ows::MISSING_PARAMETER_VALUE,
                Some("typeName"),
                "typeName parameter is required",
            ),
        },
        "getfeature" => match get_feature::get_feature(&state, &params, &headers).await {
            Ok(response) => response,
            Err(err) => error_response(err),
        },
        "transaction" => exception(
            StatusCode::BAD_REQUEST,
            ows::INVALID_PARAMETER_VALUE,
            Some("request"),
            "Transaction must be submitted as a POST XML body",
        ),
        _ => exception(
            StatusCode::BAD_REQUEST,
            ows::INVALID_PARAMETER_VALUE,
            Some("request"),
            &format!("unsupported request '{request}'"),
        ),
    }
}

/// `POST /api/wfs`
pub async fn handle_post(
    State(state): State<Arc<AppState>>,
    Query(raw): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let params = WfsParams::new(raw);
    let root = match XmlElement::parse(&body) {
        Ok(root) => root,
        Err(_) => {
            return exception(
                StatusCode::BAD_REQUEST,
                ows::NO_APPLICABLE_CODE,
                None,
                "request body is not well-formed XML",
            )
        }
    };

    match root.name.as_str() {
        "Transaction" => {
            transaction::handle(&state, &headers, params.get("access_token"), &root).await
        }
        "GetCapabilities" => respond(capabilities::get_capabilities(&state).await),
        "DescribeFeatureType" => {
            let type_name = root
                .attr("typeName")
                .map(str::to_string)
                .or_else(|| root.descendant("TypeName").map(|e| e.text_trimmed().to_string()));
            match type_name {
                Some(type_name) => respond(describe::describe(&state, &type_name).await),
                None => exception(
                    StatusCode::BAD_REQUEST,
                    ows::MISSING_PARAMETER_VALUE,
                    Some("typeName"),
                    "typeName is required",
                ),
            }
        }
        "GetFeature" => exception(
            StatusCode::NOT_IMPLEMENTED,
            ows::OPERATION_NOT_SUPPORTED,
            Some("GetFeature"),
            "POST GetFeature is not supported; use GET with query parameters",
        ),
        other => exception(
            StatusCode::BAD_REQUEST,
            ows::INVALID_PARAMETER_VALUE,
            None,
            &format!("unsupported operation '{other}'"),
        ),
    }
}
