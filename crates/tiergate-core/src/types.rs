//! Core type definitions for Tiergate

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::AddressError;

/// EVM account or contract address (20 bytes, `0x`-prefixed hex)
///
/// Stored lower-cased so equality and hashing ignore checksum casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EvmAddress(String);

impl EvmAddress {
    /// Parse and normalize an address (`0x` + 40 hex digits)
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();
        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| AddressError::MissingPrefix {
                address: trimmed.to_string(),
            })?;

        if body.len() != 40 {
            return Err(AddressError::InvalidLength {
                address: trimmed.to_string(),
                len: body.len(),
            });
        }

        if !body.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressError::InvalidHex {
                address: trimmed.to_string(),
            });
        }

        Ok(Self(format!("0x{}", body.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 20 raw address bytes
    pub fn to_bytes(&self) -> [u8; 20] {
        let mut out = [0u8; 20];
        // Validated as 40 hex digits in `parse`
        if let Ok(decoded) = hex::decode(&self.0[2..]) {
            if decoded.len() == out.len() {
                out.copy_from_slice(&decoded);
            }
        }
        out
    }
}

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EvmAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EvmAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EvmAddress> for String {
    fn from(addr: EvmAddress) -> Self {
        addr.0
    }
}

/// Chat-platform member identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat-platform role identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub u64);

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A role as known to the platform's role registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

impl Role {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: RoleId(id),
            name: name.into(),
        }
    }
}

/// A member together with the wallet address they registered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredHolder {
    pub member: MemberId,
    pub address: EvmAddress,
}

/// Token balance of one holder at the `latest` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    /// On-chain integer amount (smallest unit)
    pub raw: BigUint,
    /// Token decimals as reported by the contract
    pub decimals: u8,
    /// `raw / 10^decimals`, truncated
    pub whole: BigUint,
    /// Display symbol, may be empty
    pub symbol: String,
}

impl TokenBalance {
    pub fn new(raw: BigUint, decimals: u8, symbol: impl Into<String>) -> Self {
        let whole = normalize_units(&raw, decimals);
        Self {
            raw,
            decimals,
            whole,
            symbol: symbol.into(),
        }
    }

    /// Render the balance with at most `precision` fractional digits (truncating)
    pub fn format_units(&self, precision: u32) -> String {
        let shown = precision.min(u32::from(self.decimals));
        if shown == 0 {
            return self.whole.to_string();
        }

        let scale = BigUint::from(10u32).pow(u32::from(self.decimals));
        let remainder = &self.raw % &scale;
        let fraction = remainder * BigUint::from(10u32).pow(shown) / scale;

        format!(
            "{}.{:0>width$}",
            self.whole,
            fraction.to_string(),
            width = shown as usize
        )
    }
}

impl fmt::Display for TokenBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let amount = self.format_units(constants::DISPLAY_PRECISION);
        if self.symbol.is_empty() {
            write!(f, "{}", amount)
        } else {
            write!(f, "{} {}", amount, self.symbol)
        }
    }
}

/// Scale a raw on-chain amount down to whole token units.
///
/// Exact integer division, any fractional remainder is dropped.
pub fn normalize_units(raw: &BigUint, decimals: u8) -> BigUint {
    raw / BigUint::from(10u32).pow(u32::from(decimals))
}

/// Constants
pub mod constants {
    /// ERC-20 `balanceOf` signature
    pub const BALANCE_OF_SIGNATURE: &str = "balanceOf(address)";

    /// ERC-20 `decimals` signature
    pub const DECIMALS_SIGNATURE: &str = "decimals()";

    /// ERC-20 `symbol` signature
    pub const SYMBOL_SIGNATURE: &str = "symbol()";

    /// Fractional digits shown in human-readable balances
    pub const DISPLAY_PRECISION: u32 = 4;
}
