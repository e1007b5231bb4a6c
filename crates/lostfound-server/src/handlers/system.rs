use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use lostfound_cache::CacheSnapshot;
use serde::Serialize;
use serde_json::json;

use crate::server::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "Lost & Found Portal",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Ready whenever the document store is; an unavailable cache only means
/// requests bypass it.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let cache = if state.cache.is_ready() {
        "ready"
    } else {
        "bypassed"
    };
    (StatusCode::OK, Json(json!({ "status": "ready", "cache": cache })))
}

pub async fn cache_health(State(state): State<AppState>) -> Json<CacheSnapshot> {
    Json(state.cache.snapshot())
}

pub async fn metrics() -> impl IntoResponse {
    match crate::metrics::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "metrics recorder not installed".to_string(),
        )
            .into_response(),
    }
}
