//! Error taxonomy shared by every surface.
//!
//! The split matters for protocol mapping: `Validation` is caller
//! fault (4xx / OWS `InvalidParameterValue`), `Configuration` is
//! corrupted server-side metadata such as an invalid table name
//! (500 / OWS `OperationProcessingFailed`) and is logged as a defect.

use thiserror::Error;

/// Error type used across the query engine and protocol front-ends.
#[derive(Error, Debug)]
pub enum GisError {
    /// Malformed caller input (bad bbox, bad filter JSON, bad identifier)
    #[error("{0}")]
    Validation(String),

    /// Unresolvable dataset or feature type name
    #[error("{0}")]
    NotFound(String),

    /// Non-public dataset without auth, or non-admin transaction attempt
    #[error("{0}")]
    AccessDenied(String),

    /// Invalid store or field identifier: corrupted metadata, not caller fault
    #[error("{0}")]
    Configuration(String),

    /// Database-level failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed XML at the transport layer (not filter leniency)
    #[error("invalid XML: {0}")]
    Xml(String),
}

impl GisError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        GisError::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        GisError::NotFound(msg.into())
    }

    /// Create an access denied error
    pub fn access_denied(msg: impl Into<String>) -> Self {
        GisError::AccessDenied(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        GisError::Configuration(msg.into())
    }

    /// True when the error indicates a server-side defect rather than
    /// caller fault.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, GisError::Configuration(_) | GisError::Database(_))
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, GisError>;
