//! REST backend for the campus lost & found portal.
//!
//! Documents live in an in-memory [`storage::DocumentStore`]; reads go through
//! the `lostfound_cache` read-through cache and mutating requests pass the
//! idempotency guard in [`middleware`].

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod server;
pub mod storage;

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use server::{AppState, LostFoundServer, ServerBuilder, build_app, build_router};
