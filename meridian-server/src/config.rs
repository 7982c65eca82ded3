//! Server configuration

use clap::Parser;
use std::net::SocketAddr;

/// Meridian GIS server configuration
#[derive(Parser, Debug, Clone)]
#[command(name = "meridian-server")]
#[command(about = "Meridian GIS HTTP server (WFS 1.1.0, ArcGIS Feature Server, feature REST)")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "MERIDIAN_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    /// Postgres/PostGIS connection URL
    #[arg(
        long,
        env = "MERIDIAN_DATABASE_URL",
        default_value = "postgres://localhost:5432/meridian"
    )]
    pub database_url: String,

    /// Maximum database connections in the pool
    #[arg(long, env = "MERIDIAN_DB_MAX_CONNECTIONS", default_value = "10")]
    pub db_max_connections: u32,

    /// Public base URL advertised in capabilities documents
    #[arg(
        long,
        env = "MERIDIAN_PUBLIC_URL",
        default_value = "http://localhost:8080"
    )]
    pub public_base_url: String,

    /// HS256 secret for verifying access tokens
    #[arg(long, env = "MERIDIAN_JWT_SECRET", default_value = "dev-secret-change-me")]
    pub jwt_secret: String,

    /// Enable CORS (Cross-Origin Resource Sharing)
    #[arg(long, env = "MERIDIAN_CORS_ENABLED", default_value = "true")]
    pub cors_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MERIDIAN_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([0, 0, 0, 0], 8080).into(),
            database_url: "postgres://localhost:5432/meridian".to_string(),
            db_max_connections: 10,
            public_base_url: "http://localhost:8080".to_string(),
            jwt_secret: "dev-secret-change-me".to_string(),
            cors_enabled: true,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from CLI args
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// WFS endpoint URL advertised in GetCapabilities
    pub fn wfs_url(&self) -> String {
        format!("{}/api/wfs", self.public_base_url.trim_end_matches('/'))
    }
}
