//! HTTP route handlers and router configuration

mod arcgis;
mod datasets;
mod wfs;

use crate::state::AppState;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the main application router
pub fn build_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        // Health check
        .route("/health", get(health))
        // Internal feature REST
        .route("/api/datasets/:id/features", get(datasets::features))
        .route("/api/datasets/:id/fields", get(datasets::fields))
        .route(
            "/api/datasets/:id/fields/:field/values",
            get(datasets::unique_values),
        )
        .route(
            "/api/datasets/:id/fields/:field/stats",
            get(datasets::field_stats),
        )
        .route("/api/datasets/:id/geojson", get(datasets::geojson))
        // WFS 1.1.0 (GET query parameters, POST XML body)
        .route("/api/wfs", get(wfs::handle_get).post(wfs::handle_post))
        // ESRI ArcGIS Feature Server REST
        .route("/arcgis/rest/services", get(arcgis::services))
        .route(
            "/arcgis/rest/services/:service/FeatureServer",
            get(arcgis::feature_server),
        )
        .route(
            "/arcgis/rest/services/:service/FeatureServer/0",
            get(arcgis::layer),
        )
        .route(
            "/arcgis/rest/services/:service/FeatureServer/0/query",
            get(arcgis::query_get).post(arcgis::query_post),
        );

    let mut router = router.with_state(state.clone());

    router = router.layer(TraceLayer::new_for_http());

    // GIS clients are cross-origin by nature; errors must carry CORS
    // headers too, which the layer guarantees
    if state.config.cors_enabled {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
