//! Tier ladder endpoint

use axum::{extract::State, Json};

use crate::dto::TiersResponse;
use crate::AppState;

/// GET /tiers - Configured ladder, lowest tier first
pub async fn get_tiers(State(state): State<AppState>) -> Json<TiersResponse> {
    let driver = state.driver();
    Json(TiersResponse {
        token: driver.token().to_string(),
        tiers: driver.ladder().tiers().to_vec(),
    })
}
