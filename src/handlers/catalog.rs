//! Catalog endpoints backed by the TTL response caches.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};

use crate::cache::ResponseCache;
use crate::error::AppError;
use crate::AppState;

pub async fn products(State(state): State<AppState>, headers: HeaderMap) -> Response {
    serve_cached(&state.catalogs.products, &headers).await
}

pub async fn collections(State(state): State<AppState>, headers: HeaderMap) -> Response {
    serve_cached(&state.catalogs.collections, &headers).await
}

async fn serve_cached(cache: &ResponseCache, headers: &HeaderMap) -> Response {
    // `Cache-Control: no-cache` from the client is the forced-refresh signal.
    let bypass = headers
        .get(header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("no-cache"))
        .unwrap_or(false);

    match cache.get(bypass).await {
        Ok((payload, status)) => {
            let mut response = Json(payload).into_response();
            response.headers_mut().insert(
                HeaderName::from_static("x-cache"),
                HeaderValue::from_static(status.as_str()),
            );
            response
        }
        Err(e) => {
            tracing::error!("catalog read failed: {}", e);
            AppError::Internal("catalog data is unavailable".to_string()).into_response()
        }
    }
}
