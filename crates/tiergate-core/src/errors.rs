//! Error types for Tiergate

use std::fmt;

use thiserror::Error;

use crate::MemberId;

/// Core errors that can occur in Tiergate
#[derive(Debug, Error)]
pub enum Error {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Balance query failed: {0}")]
    Balance(#[from] BalanceQueryError),

    #[error("Invalid address: {0}")]
    Address(#[from] AddressError),

    #[error("Invalid tier ladder: {0}")]
    Ladder(#[from] LadderError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Contract call and node communication errors
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Cannot encode call to {signature}: {reason}")]
    Encoding { signature: String, reason: String },

    #[error("Node unreachable at {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Node returned error {code}: {message}")]
    Node { code: i64, message: String },

    #[error("Malformed node response: {reason}")]
    Protocol { reason: String },

    #[error("Failed to decode call result: {reason}")]
    Decode { reason: String },
}

impl RpcError {
    /// Whether repeating the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Node { .. })
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }
}

/// Which of the three oracle sub-calls failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BalanceCall {
    Balance,
    Decimals,
    Symbol,
}

impl BalanceCall {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Balance => "balance",
            Self::Decimals => "decimals",
            Self::Symbol => "symbol",
        }
    }
}

impl fmt::Display for BalanceCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure of a balance query, naming the sub-call that failed
#[derive(Debug, Error)]
#[error("{call} call failed: {source}")]
pub struct BalanceQueryError {
    pub call: BalanceCall,
    #[source]
    pub source: RpcError,
}

impl BalanceQueryError {
    pub fn new(call: BalanceCall, source: RpcError) -> Self {
        Self { call, source }
    }

    pub fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}

/// Malformed wallet or contract address
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address '{address}' must start with 0x")]
    MissingPrefix { address: String },

    #[error("address '{address}' has {len} hex digits, expected 40")]
    InvalidLength { address: String, len: usize },

    #[error("address '{address}' contains non-hex characters")]
    InvalidHex { address: String },
}

/// Tier ladder validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LadderError {
    #[error("ladder has no tiers")]
    Empty,

    #[error("tier label must not be empty")]
    EmptyLabel,

    #[error("duplicate tier label '{label}'")]
    DuplicateLabel { label: String },

    #[error("bound of tier '{label}' is not above the previous tier")]
    NotIncreasing { label: String },

    #[error("tier '{label}' is unbounded but not last")]
    UnboundedNotLast { label: String },

    #[error("last tier must be unbounded")]
    MissingUnbounded,
}

/// Failures reported by the chat platform's membership/role API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleError {
    #[error("Unknown member {member}")]
    UnknownMember { member: MemberId },

    #[error("Unknown role '{role}'")]
    UnknownRole { role: String },

    #[error("Role API error: {message}")]
    Api { message: String },
}

/// Step of a role reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleStep {
    ListMemberRoles,
    ListRegistry,
    Remove { role: String },
    Create { role: String },
    Add { role: String },
}

impl fmt::Display for RoleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListMemberRoles => write!(f, "listing member roles"),
            Self::ListRegistry => write!(f, "listing registry roles"),
            Self::Remove { role } => write!(f, "removing role '{}'", role),
            Self::Create { role } => write!(f, "creating role '{}'", role),
            Self::Add { role } => write!(f, "adding role '{}'", role),
        }
    }
}

/// A role reconciliation failure.
///
/// Steps before `step` were applied and are not rolled back.
#[derive(Debug, Error)]
#[error("{step} failed: {source}")]
pub struct RoleStepError {
    pub step: RoleStep,
    #[source]
    pub source: RoleError,
}

/// Address book persistence errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Address book I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Address book is corrupt: {0}")]
    Corrupt(String),
}

/// Terminal errors of one reconciliation pipeline
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("No member matches '{query}'")]
    IdentityNotFound { query: String },

    #[error("Member {member} has no registered wallet")]
    NotRegistered { member: MemberId },

    #[error("Balance lookup failed: {0}")]
    Balance(#[from] BalanceQueryError),

    #[error("Role update failed: {0}")]
    Roles(#[from] RoleStepError),

    #[error("Member lookup failed: {0}")]
    Membership(#[from] RoleError),

    #[error("{0}")]
    AddressBook(#[from] StorageError),

    #[error("Reconciliation timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Result type alias for Tiergate operations
pub type Result<T> = std::result::Result<T, Error>;

impl DriverError {
    /// Whether running the pipeline again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Balance(e) => e.is_retryable(),
            Self::Roles(_) | Self::Membership(_) | Self::Timeout { .. } => true,
            Self::IdentityNotFound { .. } | Self::NotRegistered { .. } | Self::AddressBook(_) => {
                false
            }
        }
    }

    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::IdentityNotFound { .. } => "identity_not_found",
            Self::NotRegistered { .. } => "not_registered",
            Self::Balance(_) => "balance_query_failed",
            Self::Roles(_) => "role_update_failed",
            Self::Membership(_) => "membership_unavailable",
            Self::AddressBook(_) => "address_book_error",
            Self::Timeout { .. } => "timeout",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::IdentityNotFound { .. } | Self::NotRegistered { .. } => 404,
            Self::Balance(_) | Self::Roles(_) | Self::Membership(_) => 502,
            Self::AddressBook(_) => 500,
            Self::Timeout { .. } => 504,
        }
    }
}
