//! Campsite reservations service.
//!
//! Availability checks, seasonal pricing and the reservation lifecycle behind a JSON API.

pub mod auth;
pub mod booking;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use booking::{Clock, RetryPolicy};
use cache::AppCache;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub cache: AppCache,
    pub clock: Arc<dyn Clock>,
    pub retry: RetryPolicy,
    pub currency: Arc<str>,
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", booking::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
