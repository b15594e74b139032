//! API route handlers

pub mod balance;
pub mod health;
pub mod holders;
pub mod node;
pub mod reconcile;
pub mod tiers;

use axum::{routing::get, Router};

use crate::AppState;

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/tiers", get(tiers::get_tiers))
        .route("/balance/:address", get(balance::get_balance))
        .nest("/holders", holders::router())
        .nest("/reconcile", reconcile::router())
        .nest("/node", node::router())
        .with_state(state)
}
