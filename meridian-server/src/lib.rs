//! Meridian GIS HTTP server.
//!
//! Three protocol front-ends over the same engine: OGC WFS 1.1.0
//! (including transactions), ESRI ArcGIS Feature Server REST, and the
//! internal feature REST API.

pub mod config;
pub mod error;
pub mod identity;
pub mod registry;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use state::AppState;
