use meridian_server::routes::build_router;
use meridian_server::telemetry::{init_logging, TelemetryConfig};
use meridian_server::{AppState, ServerConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_args();
    init_logging(&TelemetryConfig::with_server_config(&config));

    let listen_addr = config.listen_addr;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        %listen_addr,
        public_url = %config.public_base_url,
        "starting meridian server"
    );

    let state = Arc::new(AppState::new(config)?);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}
