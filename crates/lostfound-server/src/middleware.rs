use std::time::{Duration, Instant};

use axum::{
    body::{Body, HttpBody},
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use lostfound_cache::idempotency::{IDEMPOTENCY_KEY_HEADER, IDEMPOTENCY_REPLAYED_HEADER};
use lostfound_cache::{IdempotencyGuard, IdempotencyKey, IdempotencyRecord, Lookup};
use uuid::Uuid;

use crate::error::ApiError;

// Middleware that ensures each request has an X-Request-Id and mirrors it on the response
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    // If the incoming request already has a request-id, preserve it; otherwise generate one
    let req_id_value = req.headers().get(&header_name).cloned().unwrap_or_else(|| {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
    });

    // Add to request extensions for downstream usage (e.g., logging)
    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(header_name, req_id_value);
    res
}

fn is_json_media_type(value: &str) -> bool {
    value.trim_start().to_ascii_lowercase().starts_with("application/json")
}

// Content negotiation: JSON only for Accept, and a JSON Content-Type on
// POST/PUT/PATCH bodies.
pub async fn content_negotiation(req: Request<Body>, next: Next) -> Response {
    let accept_ok = req
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            let v = v.to_ascii_lowercase();
            v.contains("application/json") || v.contains("*/*") || v.contains("text/plain")
        })
        .unwrap_or(true); // if missing, treat as ok per HTTP defaults

    if !accept_ok {
        return ApiError::unsupported_media_type("Only application/json is supported in Accept")
            .into_response();
    }

    let needs_body_type = matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH);
    if needs_body_type {
        let content_ok = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(is_json_media_type);
        if !content_ok {
            return ApiError::unsupported_media_type("Content-Type must be application/json")
                .into_response();
        }
    }

    next.run(req).await
}

/// Record count and latency of every request.
pub async fn http_metrics(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let res = next.run(req).await;

    crate::metrics::record_http_request(
        method.as_str(),
        &path,
        res.status().as_u16(),
        start.elapsed(),
    );
    res
}

// =============================================================================
// Idempotency
// =============================================================================

/// State for [`idempotency_guard`].
#[derive(Clone, Debug)]
pub struct IdempotencyState {
    pub guard: IdempotencyGuard,
    /// Record TTL for `POST` (every `POST` in this API creates a document)
    pub create_ttl: Duration,
    /// Record TTL for `PUT`, `PATCH` and `DELETE`
    pub default_ttl: Duration,
    /// Responses larger than this are passed through unrecorded
    pub max_body_bytes: usize,
}

impl IdempotencyState {
    fn ttl_for(&self, method: &Method) -> Duration {
        if method == Method::POST {
            self.create_ttl
        } else {
            self.default_ttl
        }
    }
}

fn is_guarded_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Deduplicate retried mutations carrying an `Idempotency-Key` header.
///
/// - no (or malformed) key, or a safe method: pass through
/// - key with a recorded response: replay it without running the handler
/// - unseen key: run the handler and record its response
///
/// The handler and the recording run in a spawned task, so a client that
/// disconnects mid-request does not cancel either.
pub async fn idempotency_guard(
    State(state): State<IdempotencyState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !is_guarded_method(req.method()) {
        return next.run(req).await;
    }

    let Some(key) = req
        .headers()
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| state.guard.parse_key(raw))
    else {
        return next.run(req).await;
    };

    if let Lookup::Replay(record) = state.guard.lookup(&key).await {
        return replay_response(&record);
    }

    let ttl = state.ttl_for(req.method());
    let task = tokio::spawn(async move {
        let response = next.run(req).await;
        capture_response(&state, &key, ttl, response).await
    });

    match task.await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "idempotent request task failed");
            ApiError::internal("request processing failed").into_response()
        }
    }
}

fn replay_response(record: &IdempotencyRecord) -> Response {
    let status = StatusCode::from_u16(record.status_code).unwrap_or(StatusCode::OK);
    let mut res = (status, Body::from(record.body_bytes().to_vec())).into_response();
    let headers = res.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(IDEMPOTENCY_REPLAYED_HEADER, HeaderValue::from_static("true"));
    res
}

fn has_json_body(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(is_json_media_type)
}

/// Buffer a handler response and record it. Server errors and non-JSON or
/// oversized bodies are returned untouched and not recorded, so a retry runs
/// the handler again.
async fn capture_response(
    state: &IdempotencyState,
    key: &IdempotencyKey,
    ttl: Duration,
    response: Response,
) -> Response {
    let status = response.status();
    if status.is_server_error() || !has_json_body(response.headers()) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let fits = body
        .size_hint()
        .upper()
        .is_some_and(|upper| upper <= state.max_body_bytes as u64);
    if !fits {
        tracing::debug!(idempotency_key = %key, "response body too large to record");
        return Response::from_parts(parts, body);
    }

    let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(idempotency_key = %key, error = %e, "failed to buffer response body");
            return ApiError::internal("failed to read response body").into_response();
        }
    };

    match IdempotencyRecord::from_json_bytes(status.as_u16(), &bytes) {
        Ok(record) => state.guard.record(key, &record, ttl).await,
        Err(e) => {
            tracing::debug!(idempotency_key = %key, error = %e, "response body is not JSON, not recorded");
        }
    }

    Response::from_parts(parts, Body::from(bytes))
}
