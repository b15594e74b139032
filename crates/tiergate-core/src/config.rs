//! Configuration types for Tiergate

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, EvmAddress, Result};

/// Node connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// JSON-RPC endpoint (e.g., "http://127.0.0.1:8545")
    pub url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_node_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_node_timeout_secs() -> u64 {
    15
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8545".to_string(),
            timeout_secs: default_node_timeout_secs(),
        }
    }
}

/// Token whose balance drives tier assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// ERC-20 contract address
    #[serde(default)]
    pub contract: String,

    /// Cache decimals and symbol per contract after the first fetch
    #[serde(default = "default_true")]
    pub cache_metadata: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            contract: String::new(),
            cache_metadata: true,
        }
    }
}

/// One rung of the tier ladder.
///
/// `upper_bound` is exclusive; `None` marks the unbounded top tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    pub label: String,
    pub upper_bound: Option<u64>,
}

impl TierConfig {
    pub fn new(label: impl Into<String>, upper_bound: Option<u64>) -> Self {
        Self {
            label: label.into(),
            upper_bound,
        }
    }
}

fn default_tiers() -> Vec<TierConfig> {
    vec![
        TierConfig::new("Bronze", Some(5_000)),
        TierConfig::new("Silver", Some(10_000)),
        TierConfig::new("Gold", Some(50_000)),
        TierConfig::new("Platinum", Some(100_000)),
        TierConfig::new("Diamond", None),
    ]
}

/// Reconciliation pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Deadline for one member's full pipeline
    #[serde(default = "default_pipeline_timeout_secs")]
    pub pipeline_timeout_secs: u64,

    /// Extra attempts for retryable balance query failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between attempts, multiplied by the attempt number
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Members reconciled concurrently during a batch (1 = sequential)
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
}

fn default_pipeline_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_batch_concurrency() -> usize {
    1
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            pipeline_timeout_secs: default_pipeline_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            batch_concurrency: default_batch_concurrency(),
        }
    }
}

/// Daily batch schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// IANA time zone name (e.g., "Europe/Berlin")
    #[serde(default = "default_time_zone")]
    pub time_zone: String,

    /// Local wall-clock time of the daily run, "HH:MM"
    #[serde(default = "default_run_at")]
    pub run_at: String,

    /// Also run a batch right after startup
    #[serde(default)]
    pub run_on_startup: bool,
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

fn default_run_at() -> String {
    "00:00".to_string()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            time_zone: default_time_zone(),
            run_at: default_run_at(),
            run_on_startup: false,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Node connection settings
    #[serde(default)]
    pub node: NodeConfig,

    /// Tracked token
    #[serde(default)]
    pub token: TokenConfig,

    /// Tier ladder, ascending by bound
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierConfig>,

    #[serde(default)]
    pub reconcile: ReconcileConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// JSON file holding member → wallet registrations
    #[serde(default = "default_address_book_path")]
    pub address_book_path: String,

    /// Optional JSON snapshot of guild members and roles
    #[serde(default)]
    pub guild_path: Option<String>,
}

fn default_api_port() -> u16 {
    19545
}

fn default_address_book_path() -> String {
    "address_book.json".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            token: TokenConfig::default(),
            tiers: default_tiers(),
            reconcile: ReconcileConfig::default(),
            schedule: ScheduleConfig::default(),
            api_port: default_api_port(),
            address_book_path: default_address_book_path(),
            guild_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file. A missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Apply `TIERGATE_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("TIERGATE_NODE_URL") {
            self.node.url = url;
        }
        if let Some(contract) = lookup("TIERGATE_TOKEN_CONTRACT") {
            self.token.contract = contract;
        }
        if let Some(port) = lookup("TIERGATE_API_PORT") {
            self.api_port = port
                .parse()
                .map_err(|_| Error::Config(format!("TIERGATE_API_PORT is not a port: {}", port)))?;
        }
        Ok(())
    }

    /// Parsed token contract address
    pub fn token_contract(&self) -> Result<EvmAddress> {
        if self.token.contract.is_empty() {
            return Err(Error::Config("token.contract is not set".to_string()));
        }
        Ok(EvmAddress::parse(&self.token.contract)?)
    }

    /// Check settings that are not validated by their consumers
    pub fn validate(&self) -> Result<()> {
        self.token_contract()?;

        if self.node.url.is_empty() {
            return Err(Error::Config("node.url is not set".to_string()));
        }
        if self.node.timeout_secs == 0 {
            return Err(Error::Config("node.timeout_secs must be at least 1".to_string()));
        }
        if self.reconcile.batch_concurrency == 0 {
            return Err(Error::Config(
                "reconcile.batch_concurrency must be at least 1".to_string(),
            ));
        }
        if self.reconcile.pipeline_timeout_secs == 0 {
            return Err(Error::Config(
                "reconcile.pipeline_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
