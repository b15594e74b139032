//! Tier reconciliation endpoints

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tiergate_engine::BatchSummary;

use crate::dto::{driver_failure, ApiError, ApiFailure, ReconcileRequest, ReconcileResponse};
use crate::AppState;

/// Create reconciliation routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(reconcile))
        .route("/batch", post(run_batch))
}

/// POST /reconcile - Reconcile one member given as mention, id or name
pub async fn reconcile(
    State(state): State<AppState>,
    Json(request): Json<ReconcileRequest>,
) -> Result<Json<ReconcileResponse>, ApiFailure> {
    match state.driver().on_demand(&request.query).await {
        Ok(report) => Ok(Json(ReconcileResponse::from(report))),
        Err(e) => {
            tracing::warn!(query = %request.query, code = e.error_code(), "Reconciliation failed: {}", e);
            Err(driver_failure(e))
        }
    }
}

/// POST /reconcile/batch - Reconcile every registered holder
pub async fn run_batch(State(state): State<AppState>) -> Result<Json<BatchSummary>, ApiFailure> {
    let outcome = state.try_run_batch().await.ok_or_else(|| {
        (
            StatusCode::CONFLICT,
            Json(ApiError::new("batch_in_progress", "A batch is already running")),
        )
    })?;

    outcome.map(Json).map_err(|e| {
        tracing::error!("Batch reconciliation failed: {}", e);
        driver_failure(e)
    })
}
