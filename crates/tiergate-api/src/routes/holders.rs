//! Wallet registration endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tiergate_core::{DriverError, EvmAddress, MemberId};

use crate::dto::{driver_failure, ApiError, ApiFailure, HolderResponse, RegisterHolderRequest};
use crate::AppState;

/// Create holder routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(register))
        .route("/:member_id", get(get_holder))
}

/// POST /holders - Register or replace a member's wallet
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterHolderRequest>,
) -> Result<Json<HolderResponse>, ApiFailure> {
    let address = EvmAddress::parse(&request.address).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new("invalid_address", e.to_string())),
        )
    })?;

    let member = MemberId(request.member_id);
    let previous = state
        .driver()
        .address_book()
        .upsert(member, address.clone())
        .await
        .map_err(|e| driver_failure(DriverError::from(e)))?;

    Ok(Json(HolderResponse {
        member_id: member.0,
        address: address.to_string(),
        previous: previous.map(|a| a.to_string()),
    }))
}

/// GET /holders/:member_id - Registered wallet of a member
pub async fn get_holder(
    State(state): State<AppState>,
    Path(member_id): Path<u64>,
) -> Result<Json<HolderResponse>, ApiFailure> {
    let address = state
        .driver()
        .address_book()
        .get(MemberId(member_id))
        .await
        .map_err(|e| driver_failure(DriverError::from(e)))?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ApiError::not_found(format!(
                    "Member {} has no registered wallet",
                    member_id
                ))),
            )
        })?;

    Ok(Json(HolderResponse {
        member_id,
        address: address.to_string(),
        previous: None,
    }))
}
