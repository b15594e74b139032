//! Tiergate-api: HTTP API layer for Tiergate
//!
//! Exposes wallet registration, balance lookups and tier reconciliation
//! over a small JSON API.

pub mod dto;
pub mod routes;
pub mod server;
pub mod state;

pub use server::*;
pub use state::AppState;
