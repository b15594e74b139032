//! Balance lookup endpoint

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tiergate_core::{DriverError, EvmAddress};

use crate::dto::{driver_failure, ApiError, ApiFailure, BalanceResponse};
use crate::AppState;

/// GET /balance/:address - Balance of the tracked token and the tier it maps to.
///
/// Read-only: no roles are touched.
pub async fn get_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<BalanceResponse>, ApiFailure> {
    let address = EvmAddress::parse(&address).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new("invalid_address", e.to_string())),
        )
    })?;

    let driver = state.driver();
    let balance = driver
        .balances()
        .balance_of(&address, driver.token())
        .await
        .map_err(|e| {
            tracing::warn!(address = %address, "Balance lookup failed: {}", e);
            driver_failure(DriverError::from(e))
        })?;
    let tier = driver.ladder().resolve(&balance.whole).label.clone();

    Ok(Json(BalanceResponse::new(
        address.to_string(),
        driver.token().to_string(),
        &balance,
        tier,
    )))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::routes::test_support::{app, send, ALICE, BROKEN, TOKEN};

    #[tokio::test]
    async fn test_balance_and_tier() {
        let app = app().await;
        let (status, body) = send(&app.router, "GET", &format!("/balance/{}", ALICE), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token"], TOKEN);
        assert_eq!(body["raw"], "750025");
        assert_eq!(body["whole"], "7500");
        assert_eq!(body["display"], "7500.25 ZKL");
        assert_eq!(body["tier"], "Silver");
    }

    #[tokio::test]
    async fn test_node_failure_is_bad_gateway() {
        let app = app().await;
        let (status, body) = send(&app.router, "GET", &format!("/balance/{}", BROKEN), None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "balance_query_failed");
        assert!(body["message"].as_str().unwrap().contains("balance call failed"));
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let app = app().await;
        let (status, _) = send(&app.router, "GET", "/balance/not-an-address", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
