//! Router-level tests.
//!
//! The pool connects lazily, so everything that answers before
//! touching the database is exercised here without a running Postgres:
//! health, WFS dispatch and exception shapes, the transaction
//! authorization gate, and CORS.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use meridian_server::routes::build_router;
use meridian_server::{AppState, ServerConfig};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let state = AppState::new(ServerConfig::default()).expect("state");
    build_router(Arc::new(state))
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

#[tokio::test]
async fn health_reports_ok_and_version() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: JsonValue = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn wfs_requires_the_request_parameter() {
    let response = app()
        .oneshot(Request::get("/api/wfs").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_string(response).await;
    assert!(body.contains("ows:ExceptionReport"), "{body}");
    assert!(body.contains("MissingParameterValue"), "{body}");
}

#[tokio::test]
async fn wfs_rejects_unknown_operations() {
    let response = app()
        .oneshot(
            Request::get("/api/wfs?service=WFS&request=GetGonzo")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_string(response).await;
    assert!(body.contains("InvalidParameterValue"), "{body}");
    assert!(body.contains("GetGonzo"), "{body}");
}

#[tokio::test]
async fn wfs_request_parameter_is_case_insensitive_in_name_and_value() {
    // DescribeFeatureType without typeName gets a typeName exception,
    // which proves REQUEST itself was recognized
    let response = app()
        .oneshot(
            Request::get("/api/wfs?REQUEST=describefeaturetype")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_string(response).await;
    assert!(body.contains("typeName"), "{body}");
}

#[tokio::test]
async fn wfs_post_rejects_malformed_xml() {
    let response = app()
        .oneshot(
            Request::post("/api/wfs")
                .header(header::CONTENT_TYPE, "application/xml")
                .body(Body::from("this is not xml <"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_string(response).await;
    assert!(body.contains("NoApplicableCode"), "{body}");
}

#[tokio::test]
async fn wfs_post_get_feature_is_not_supported() {
    let response = app()
        .oneshot(
            Request::post("/api/wfs")
                .header(header::CONTENT_TYPE, "application/xml")
                .body(Body::from("<GetFeature service=\"WFS\"/>"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    let body = body_string(response).await;
    assert!(body.contains("OperationNotSupported"), "{body}");
}

#[tokio::test]
async fn transaction_without_a_token_is_denied_before_any_work() {
    let transaction = "<Transaction service=\"WFS\" version=\"1.1.0\">\
                       <Delete typeName=\"gis:abc\"/></Transaction>";
    let response = app()
        .oneshot(
            Request::post("/api/wfs")
                .header(header::CONTENT_TYPE, "application/xml")
                .body(Body::from(transaction))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_string(response).await;
    assert!(body.contains("NoApplicableCode"), "{body}");
    assert!(body.contains("administrator"), "{body}");
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let response = app()
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/wfs")
                .header(header::ORIGIN, "https://viewer.example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn errors_carry_cors_headers() {
    let response = app()
        .oneshot(
            Request::get("/api/wfs")
                .header(header::ORIGIN, "https://viewer.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn unknown_routes_are_404() {
    let response = app()
        .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
