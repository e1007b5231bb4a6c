use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, patch, post},
};
use lostfound_cache::{Cache, CacheError, IdempotencyGuard, create_cache};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::{
    config::AppConfig,
    handlers::{claims, feedback, items, reports, system, users},
    middleware as app_middleware,
    storage::DocumentStore,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DocumentStore>,
    pub cache: Cache,
    pub guard: IdempotencyGuard,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Create an empty document store and the configured cache.
    pub async fn from_config(cfg: &AppConfig) -> Result<Self, CacheError> {
        let cache = create_cache(&cfg.cache, &cfg.redis).await?;
        let guard = IdempotencyGuard::new(cache.adapter().clone(), cfg.idempotency.max_key_length);
        Ok(Self {
            store: Arc::new(DocumentStore::new()),
            cache,
            guard,
            config: Arc::new(cfg.clone()),
        })
    }

    fn idempotency_state(&self) -> app_middleware::IdempotencyState {
        let idem = &self.config.idempotency;
        app_middleware::IdempotencyState {
            guard: self.guard.clone(),
            create_ttl: idem.create_ttl(),
            default_ttl: idem.default_ttl(),
            max_body_bytes: idem.max_body_bytes,
        }
    }
}

fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/items", get(items::list_items).post(items::create_item))
        .route(
            "/items/{id}",
            get(items::get_item)
                .patch(items::update_item)
                .delete(items::delete_item),
        )
        .route("/items/{id}/claims", get(items::list_item_claims))
        .route("/claims", get(claims::list_claims).post(claims::create_claim))
        .route(
            "/claims/{id}",
            get(claims::get_claim).delete(claims::delete_claim),
        )
        .route("/claims/{id}/status", patch(claims::update_claim_status))
        .route(
            "/reports",
            get(reports::list_reports).post(reports::create_report),
        )
        .route(
            "/reports/{id}",
            get(reports::get_report)
                .patch(reports::update_report)
                .delete(reports::delete_report),
        )
        .route(
            "/feedback",
            get(feedback::list_feedback).post(feedback::create_feedback),
        )
        .route(
            "/feedback/{id}",
            get(feedback::get_feedback).delete(feedback::delete_feedback),
        )
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/{id}/claims", get(users::list_user_claims))
        .route("/users/{id}/items", get(users::list_user_items))
        .route_layer(middleware::from_fn_with_state(
            state.idempotency_state(),
            app_middleware::idempotency_guard,
        ))
}

pub fn build_router(state: AppState) -> Router {
    let cfg = state.config.clone();
    Router::new()
        // Health and info endpoints
        .route("/", get(system::root))
        .route("/healthz", get(system::healthz))
        .route("/readyz", get(system::readyz))
        .route("/health/cache", get(system::cache_health))
        .route("/metrics", get(system::metrics))
        .nest("/api", api_routes(&state))
        .with_state(state)
        // Middleware stack (outermost last): trace/cors/compression/timeout -> request id -> metrics -> content negotiation -> body limit
        .layer(axum::extract::DefaultBodyLimit::max(cfg.server.body_limit_bytes))
        .layer(middleware::from_fn(app_middleware::content_negotiation))
        .layer(middleware::from_fn(app_middleware::http_metrics))
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            use tracing::field::Empty;
                            let req_id = req
                                .headers()
                                .get("x-request-id")
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or("")
                                .to_string();
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri(),
                                http.status_code = Empty,
                                request_id = %req_id
                            )
                        })
                        .on_response(
                            |res: &axum::http::Response<_>,
                             latency: std::time::Duration,
                             span: &tracing::Span| {
                                span.record(
                                    "http.status_code",
                                    tracing::field::display(res.status().as_u16()),
                                );
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            },
                        ),
                )
                .layer(CorsLayer::permissive())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(cfg.request_timeout())),
        )
}

/// Build the application from configuration.
pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let state = AppState::from_config(cfg).await?;
    Ok(build_router(state))
}

pub struct LostFoundServer {
    addr: SocketAddr,
    app: Router,
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<LostFoundServer> {
        crate::metrics::init_metrics();
        let app = build_app(&self.config).await?;
        Ok(LostFoundServer {
            addr: self.addr,
            app,
        })
    }
}

impl LostFoundServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
