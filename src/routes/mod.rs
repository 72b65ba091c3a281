use axum::{Router, routing::get};

use crate::state::AppState;

pub mod admin;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/orders", orders::router())
        .nest("/admin", admin::router())
}

/// Health check, `/api` routes and the docs, still waiting for state.
pub fn create_app() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", create_api_router())
        .merge(doc::scalar_docs())
}
