//! boardsync-engine library interface
//!
//! Keeps proposal-backed boards in sync with their proposal source: schema
//! reconciliation, card materialization, rubric aggregation and relation
//! link symmetry, plus the HTTP surface wrapping them.

pub mod api;
pub mod error;
pub mod lock;
pub mod materializer;
pub mod relation;
pub mod rubric;
pub mod schema;
pub mod service;
pub mod store;

pub use crate::error::{ApiError, ApiResult};
pub use crate::service::{SyncReport, SyncService};

use std::sync::Arc;

use axum::Router;
use boardsync_common::events::EventBus;
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SyncService>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: Arc<SyncService>, event_bus: EventBus) -> Self {
        Self {
            service,
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::board_routes())
        .merge(api::relation_routes())
        .merge(api::card_routes())
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
