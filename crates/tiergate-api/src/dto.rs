//! Data Transfer Objects for API requests and responses

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tiergate_core::{DriverError, TokenBalance};
use tiergate_engine::{Tier, TierReport};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Node status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatusResponse {
    pub connected: bool,
    pub url: String,
    pub chain_id: Option<u64>,
    pub block_number: Option<u64>,
}

/// Configured ladder for the tracked token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TiersResponse {
    pub token: String,
    pub tiers: Vec<Tier>,
}

/// Wallet registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterHolderRequest {
    pub member_id: u64,
    pub address: String,
}

/// A registered wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolderResponse {
    pub member_id: u64,
    pub address: String,
    /// Address replaced by this registration, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
}

/// Token balance of an address and the tier it maps to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub address: String,
    pub token: String,
    /// Smallest-unit amount as a decimal string
    pub raw: String,
    pub decimals: u8,
    /// Whole token units as a decimal string
    pub whole: String,
    pub symbol: String,
    pub display: String,
    pub tier: String,
}

impl BalanceResponse {
    pub fn new(address: String, token: String, balance: &TokenBalance, tier: String) -> Self {
        Self {
            address,
            token,
            raw: balance.raw.to_string(),
            decimals: balance.decimals,
            whole: balance.whole.to_string(),
            symbol: balance.symbol.clone(),
            display: balance.to_string(),
            tier,
        }
    }
}

/// On-demand reconciliation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileRequest {
    /// Mention, numeric member id or `name[#discriminator]`
    pub query: String,
}

/// On-demand reconciliation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub member_id: u64,
    pub address: String,
    pub balance: String,
    pub tier: String,
    pub removed: Vec<String>,
    pub added: Option<String>,
    pub created: bool,
    pub message: String,
}

impl From<TierReport> for ReconcileResponse {
    fn from(report: TierReport) -> Self {
        Self {
            member_id: report.member.0,
            address: report.address.to_string(),
            balance: report.balance.to_string(),
            message: report.to_string(),
            tier: report.tier,
            removed: report.changes.removed,
            added: report.changes.added,
            created: report.changes.created,
        }
    }
}

/// Generic API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }
}

/// Error half of every handler result
pub type ApiFailure = (StatusCode, Json<ApiError>);

impl From<DriverError> for ApiError {
    fn from(e: DriverError) -> Self {
        Self::new(e.error_code(), e.to_string())
    }
}

/// Map a pipeline failure to its status code and body
pub fn driver_failure(e: DriverError) -> ApiFailure {
    let status =
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ApiError::from(e)))
}
