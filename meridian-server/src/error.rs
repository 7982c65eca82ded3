//! Server error types with HTTP status code mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use meridian_core::GisError;
use meridian_filter::FilterError;
use serde::Serialize;
use thiserror::Error;

/// Server error type wrapping core errors with HTTP status mapping.
///
/// The JSON body is what the internal REST and ArcGIS surfaces
/// return; the WFS routes convert errors to OWS ExceptionReport XML
/// before they reach `IntoResponse`.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Core GIS error (validation, not-found, access, config, db)
    #[error("{0}")]
    Gis(#[from] GisError),

    /// JSON parsing error
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic bad request error
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<FilterError> for ServerError {
    fn from(e: FilterError) -> Self {
        ServerError::Gis(e.into())
    }
}

impl ServerError {
    /// Map error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Gis(GisError::Validation(_)) => StatusCode::BAD_REQUEST,
            ServerError::Gis(GisError::Xml(_)) => StatusCode::BAD_REQUEST,
            ServerError::Gis(GisError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Gis(GisError::AccessDenied(_)) => StatusCode::FORBIDDEN,
            ServerError::Gis(GisError::Configuration(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Gis(GisError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Json(_) => StatusCode::BAD_REQUEST,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Create a bad request error
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ServerError::BadRequest(msg.into())
    }

    /// Create a not found error (404)
    pub fn not_found(msg: impl Into<String>) -> Self {
        ServerError::Gis(GisError::not_found(msg.into()))
    }

    /// Create an access denied error (403)
    pub fn access_denied(msg: impl Into<String>) -> Self {
        ServerError::Gis(GisError::access_denied(msg.into()))
    }
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// HTTP status code
    pub status: u16,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed with server-side error");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            status: status.as_u16(),
        };
        let json = serde_json::to_string(&body)
            .unwrap_or_else(|_| format!(r#"{{"error":"{}","status":{}}}"#, self, status.as_u16()));

        (status, [("content-type", "application/json")], json).into_response()
    }
}

/// Result type alias for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_taxonomy() {
        assert_eq!(
            ServerError::Gis(GisError::validation("x")).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::not_found("x").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::access_denied("x").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServerError::Gis(GisError::configuration("x")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
