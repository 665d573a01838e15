//! asmbly-dash library - membership dashboard API
//!
//! Serves the daily counts and member tables written by `asmbly-sync`.
//! The only write is the outreach `emailed` flag.

use axum::Router;
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod api;
pub mod db;
pub mod error;
pub mod pagination;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let api_routes = Router::new()
        .route("/api/buildinfo", get(api::get_build_info))
        .route("/api/counts", get(api::list_counts))
        .route("/api/counts/summary", get(api::counts_summary))
        .route("/api/counts/churns-joins", get(api::churns_joins))
        .route("/api/members/risk", get(api::risk_table))
        .route("/api/members/emailed", post(api::set_emailed))
        .route("/api/members/zip-counts", get(api::zip_counts));

    Router::new()
        .merge(api_routes)
        .merge(api::health_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
