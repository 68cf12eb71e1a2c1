//! cuadrante-locator library interface
//!
//! The resolution engine (code grammar, bounded source clients, TTL caches,
//! CAI resolver, quadrant orchestrator) plus the HTTP surface in [`api`].

pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod locator;
pub mod resolver;
pub mod roster;
pub mod sessions;
pub mod siv_code;
pub mod sources;
pub mod types;

pub use crate::error::{ApiError, ApiResult};
pub use crate::locator::Locator;

use axum::Router;
use chrono::{DateTime, Utc};
use crate::sessions::ViewportSessions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub locator: Arc<Locator>,
    /// In-flight viewport queries, keyed by client session id
    pub sessions: Arc<ViewportSessions>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(locator: Arc<Locator>) -> Self {
        let debounce = locator.settings().debounce;
        Self {
            locator,
            sessions: Arc::new(ViewportSessions::new(debounce)),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::quadrant_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
