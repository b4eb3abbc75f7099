use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use tower::ServiceExt;

use checkout_core::cache::CatalogCaches;
use checkout_core::config::Config;
use checkout_core::gateway::{GatewayClient, GatewaySettings};
use checkout_core::services::order_sink::{OrderStatusSink, OrderUpdate, SinkError};
use checkout_core::{create_app, AppState};

struct NoopSink;

#[async_trait]
impl OrderStatusSink for NoopSink {
    async fn update(&self, _order_id: &str, _update: OrderUpdate) -> Result<(), SinkError> {
        Ok(())
    }
}

fn catalog_app(dir: &std::path::Path) -> Router {
    let config = Config {
        server_port: 3000,
        gateway_base_url: "http://127.0.0.1:9".to_string(),
        store_id: "teststore".to_string(),
        store_passwd: "testpass".to_string(),
        app_base_url: "http://localhost:3000".to_string(),
        order_api_url: "http://localhost:3001".to_string(),
        currency: "BDT".to_string(),
        products_path: dir.join("products.json").to_string_lossy().into_owned(),
        collections_path: dir.join("collections.json").to_string_lossy().into_owned(),
        cors_allowed_origins: None,
    };
    let gateway = GatewayClient::new(GatewaySettings {
        base_url: config.gateway_base_url.clone(),
        store_id: config.store_id.clone(),
        store_passwd: config.store_passwd.clone(),
        callback_base_url: config.app_base_url.clone(),
        currency: config.currency.clone(),
    });
    let catalogs = Arc::new(CatalogCaches::from_config(&config));

    create_app(AppState {
        config,
        gateway,
        order_sink: Arc::new(NoopSink),
        catalogs,
    })
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn x_cache(response: &axum::response::Response) -> String {
    response
        .headers()
        .get("x-cache")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn test_products_miss_then_hit() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("products.json"), r#"[{"id":1,"name":"Mug"}]"#).unwrap();
    std::fs::write(dir.path().join("collections.json"), r#"[]"#).unwrap();
    let app = catalog_app(dir.path());

    let response = app.clone().oneshot(get("/catalog/products")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(x_cache(&response), "MISS");

    let response = app.clone().oneshot(get("/catalog/products")).await.unwrap();
    assert_eq!(x_cache(&response), "HIT");

    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body[0]["name"], "Mug");
}

#[tokio::test]
async fn test_no_cache_header_forces_refresh() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("products.json"), r#"[]"#).unwrap();
    std::fs::write(dir.path().join("collections.json"), r#"[{"id":"summer"}]"#).unwrap();
    let app = catalog_app(dir.path());

    let response = app
        .clone()
        .oneshot(get("/catalog/collections"))
        .await
        .unwrap();
    assert_eq!(x_cache(&response), "MISS");

    let request = Request::builder()
        .method("GET")
        .uri("/catalog/collections")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(x_cache(&response), "MISS");
}

#[tokio::test]
async fn test_caches_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("products.json"), r#"[]"#).unwrap();
    std::fs::write(dir.path().join("collections.json"), r#"[]"#).unwrap();
    let app = catalog_app(dir.path());

    let response = app.clone().oneshot(get("/catalog/products")).await.unwrap();
    assert_eq!(x_cache(&response), "MISS");

    // Warming the products cache must not warm the collections cache.
    let response = app
        .clone()
        .oneshot(get("/catalog/collections"))
        .await
        .unwrap();
    assert_eq!(x_cache(&response), "MISS");

    let response = app.oneshot(get("/catalog/collections")).await.unwrap();
    assert_eq!(x_cache(&response), "HIT");
}

#[tokio::test]
async fn test_missing_backing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    // No files written at all.
    let app = catalog_app(dir.path());

    let response = app.oneshot(get("/catalog/products")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
