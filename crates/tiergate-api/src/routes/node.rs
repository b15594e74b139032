//! Node status endpoint

use axum::{extract::State, routing::get, Json, Router};

use crate::dto::NodeStatusResponse;
use crate::AppState;

/// Create node routes
pub fn router() -> Router<AppState> {
    Router::new().route("/status", get(get_status))
}

/// GET /node/status - Reachability of the configured node
pub async fn get_status(State(state): State<AppState>) -> Json<NodeStatusResponse> {
    let Some(client) = state.node_client() else {
        return Json(NodeStatusResponse {
            connected: false,
            url: String::new(),
            chain_id: None,
            block_number: None,
        });
    };

    let url = client.config().url.clone();
    let (chain_id, block_number) = tokio::join!(client.chain_id(), client.block_number());
    if let Err(e) = &block_number {
        tracing::warn!(url = %url, "Node status check failed: {}", e);
    }

    Json(NodeStatusResponse {
        connected: block_number.is_ok(),
        url,
        chain_id: chain_id.ok(),
        block_number: block_number.ok(),
    })
}
