//! evm-node-client: JSON-RPC client for EVM nodes with a token balance oracle
//!
//! This crate provides a small client for read-only contract calls
//! (`eth_call` at the `latest` block), the ABI helpers needed to build and
//! decode those calls, and an oracle that turns them into token balances.

pub mod abi;
pub mod oracle;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use num_traits::ToPrimitive;
use serde::Serialize;
use serde_json::{json, Value};
use tiergate_core::{EvmAddress, NodeConfig, RpcError};

pub use abi::{decode_text, decode_text_or_empty, decode_uint, encode_call, selector, AbiArg};
pub use oracle::{BalanceOracle, TokenMetadata};

/// Result type for node client operations
pub type Result<T> = std::result::Result<T, RpcError>;

/// Read-only contract call capability
#[async_trait]
pub trait ContractCaller: Send + Sync {
    /// Run `data` against `contract` at the latest block and return the raw hex result
    async fn call(&self, contract: &EvmAddress, data: &[u8]) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

/// JSON-RPC client bound to a single node endpoint.
///
/// Every request is exactly one HTTP round trip; retries belong to the caller.
#[derive(Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    config: NodeConfig,
    next_id: Arc<AtomicU64>,
}

impl NodeClient {
    /// Create a new node client. No request is sent until the first call.
    pub fn new(config: NodeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("tiergate")
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RpcError::Transport {
                url: config.url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            config,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Get the current node configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// `eth_call` against `contract` at the `latest` block
    pub async fn eth_call(&self, contract: &EvmAddress, data: &[u8]) -> Result<String> {
        let params = json!([
            { "to": contract.as_str(), "data": abi::to_hex(data) },
            "latest"
        ]);
        self.request("eth_call", params).await
    }

    /// Chain ID reported by the node (`eth_chainId`)
    pub async fn chain_id(&self) -> Result<u64> {
        let raw = self.request("eth_chainId", json!([])).await?;
        hex_quantity(&raw)
    }

    /// Latest block number (`eth_blockNumber`)
    pub async fn block_number(&self) -> Result<u64> {
        let raw = self.request("eth_blockNumber", json!([])).await?;
        hex_quantity(&raw)
    }

    /// Check if node is online
    pub async fn is_online(&self) -> bool {
        self.block_number().await.is_ok()
    }

    async fn request(&self, method: &str, params: Value) -> Result<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        tracing::debug!(method, id, url = %self.config.url, "Sending JSON-RPC request");

        let response = self
            .http
            .post(&self.config.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        parse_response(&self.config.url, status, &text)
    }

    fn transport_error(&self, e: reqwest::Error) -> RpcError {
        let reason = if e.is_timeout() {
            format!("request timed out after {}s", self.config.timeout_secs)
        } else {
            e.to_string()
        };
        RpcError::Transport {
            url: self.config.url.clone(),
            reason,
        }
    }
}

#[async_trait]
impl ContractCaller for NodeClient {
    async fn call(&self, contract: &EvmAddress, data: &[u8]) -> Result<String> {
        self.eth_call(contract, data).await
    }
}

/// Interpret a JSON-RPC response body.
///
/// An explicit `error` object wins over the HTTP status; a non-success status
/// without one is a transport failure.
fn parse_response(url: &str, status: reqwest::StatusCode, body: &str) -> Result<String> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) if status.is_success() => {
            return Err(RpcError::protocol(format!("response is not JSON: {}", e)));
        }
        Err(_) => {
            return Err(RpcError::Transport {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }
    };

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        return Err(RpcError::Node {
            code: error["code"].as_i64().unwrap_or(0),
            message: error["message"]
                .as_str()
                .unwrap_or("unknown node error")
                .to_string(),
        });
    }

    if !status.is_success() {
        return Err(RpcError::Transport {
            url: url.to_string(),
            reason: format!("HTTP {}", status),
        });
    }

    match value.get("result") {
        Some(Value::String(result)) => Ok(result.clone()),
        Some(other) => Err(RpcError::protocol(format!(
            "result is not a hex string: {}",
            other
        ))),
        None => Err(RpcError::protocol("missing result field")),
    }
}

fn hex_quantity(raw: &str) -> Result<u64> {
    decode_uint(raw)?
        .to_u64()
        .ok_or_else(|| RpcError::decode(format!("quantity out of range: {}", raw)))
}
