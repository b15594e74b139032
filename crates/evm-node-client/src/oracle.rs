//! Token balance oracle
//!
//! Combines `balanceOf`, `decimals` and `symbol` calls into a normalized
//! balance. The three calls each target `latest` and are not a single
//! consistent snapshot; decimals and symbol are contract constants in practice.

use std::collections::HashMap;

use num_traits::ToPrimitive;
use tiergate_core::constants::{BALANCE_OF_SIGNATURE, DECIMALS_SIGNATURE, SYMBOL_SIGNATURE};
use tiergate_core::{BalanceCall, BalanceQueryError, EvmAddress, RpcError, TokenBalance};
use tokio::sync::RwLock;

use crate::abi::{self, AbiArg};
use crate::ContractCaller;

/// Decimals and symbol of a token contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub decimals: u8,
    pub symbol: String,
}

/// Reads ERC-20 balances through a [`ContractCaller`]
pub struct BalanceOracle<C> {
    caller: C,
    cache_metadata: bool,
    metadata: RwLock<HashMap<EvmAddress, TokenMetadata>>,
}

impl<C: ContractCaller> BalanceOracle<C> {
    /// Create an oracle that caches token metadata per contract
    pub fn new(caller: C) -> Self {
        Self {
            caller,
            cache_metadata: true,
            metadata: RwLock::new(HashMap::new()),
        }
    }

    /// Enable or disable the per-contract metadata cache
    pub fn with_metadata_cache(mut self, enabled: bool) -> Self {
        self.cache_metadata = enabled;
        self
    }

    pub fn caller(&self) -> &C {
        &self.caller
    }

    /// Balance of `holder` in `token`, scaled to whole units
    pub async fn get_balance(
        &self,
        holder: &EvmAddress,
        token: &EvmAddress,
    ) -> Result<TokenBalance, BalanceQueryError> {
        let data = abi::encode_call(BALANCE_OF_SIGNATURE, &[AbiArg::address(holder)])
            .map_err(|e| BalanceQueryError::new(BalanceCall::Balance, e))?;
        let raw = self.call(BalanceCall::Balance, token, &data).await?;
        let raw = abi::decode_uint(&raw).map_err(|e| BalanceQueryError::new(BalanceCall::Balance, e))?;

        let metadata = self.token_metadata(token).await?;
        let balance = TokenBalance::new(raw, metadata.decimals, metadata.symbol);

        tracing::debug!(
            holder = %holder,
            token = %token,
            whole = %balance.whole,
            decimals = balance.decimals,
            "Fetched token balance"
        );

        Ok(balance)
    }

    /// Decimals and symbol of `token`, from cache when enabled
    pub async fn token_metadata(
        &self,
        token: &EvmAddress,
    ) -> Result<TokenMetadata, BalanceQueryError> {
        if self.cache_metadata {
            if let Some(cached) = self.metadata.read().await.get(token) {
                return Ok(cached.clone());
            }
        }

        let decimals = self.fetch_decimals(token).await?;
        let symbol = self.fetch_symbol(token).await?;
        let metadata = TokenMetadata { decimals, symbol };

        if self.cache_metadata {
            self.metadata
                .write()
                .await
                .insert(token.clone(), metadata.clone());
        }

        Ok(metadata)
    }

    async fn fetch_decimals(&self, token: &EvmAddress) -> Result<u8, BalanceQueryError> {
        let wrap = |e| BalanceQueryError::new(BalanceCall::Decimals, e);

        let data = abi::encode_call(DECIMALS_SIGNATURE, &[]).map_err(wrap)?;
        let raw = self.call(BalanceCall::Decimals, token, &data).await?;
        let value = abi::decode_uint(&raw).map_err(wrap)?;

        value
            .to_u8()
            .ok_or_else(|| wrap(RpcError::decode(format!("decimals {} out of range", value))))
    }

    async fn fetch_symbol(&self, token: &EvmAddress) -> Result<String, BalanceQueryError> {
        let data = abi::encode_call(SYMBOL_SIGNATURE, &[])
            .map_err(|e| BalanceQueryError::new(BalanceCall::Symbol, e))?;
        let raw = self.call(BalanceCall::Symbol, token, &data).await?;

        let symbol = abi::decode_text_or_empty(&raw);
        if symbol.is_empty() {
            tracing::warn!(token = %token, raw = %raw, "Empty or undecodable token symbol");
        }
        Ok(symbol)
    }

    async fn call(
        &self,
        call: BalanceCall,
        token: &EvmAddress,
        data: &[u8],
    ) -> Result<String, BalanceQueryError> {
        self.caller
            .call(token, data)
            .await
            .map_err(|e| BalanceQueryError::new(call, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use num_bigint::BigUint;

    const TOKEN: &str = "0x19ac2659599fd01c853de846919544276ad26f50";
    const HOLDER: &str = "0x8ba1f109551bd432803012645ac136ddd64dba72";
    const ZKL_BYTES32: &str = "0x5a4b4c0000000000000000000000000000000000000000000000000000000000";

    /// Answers by selector and records the order of calls
    #[derive(Default)]
    struct ScriptedNode {
        replies: HashMap<[u8; 4], Result<String, (i64, String)>>,
        calls: Mutex<Vec<[u8; 4]>>,
    }

    impl ScriptedNode {
        fn reply(mut self, signature: &str, result: &str) -> Self {
            self.replies
                .insert(abi::selector(signature), Ok(result.to_string()));
            self
        }

        fn fail(mut self, signature: &str, code: i64, message: &str) -> Self {
            self.replies
                .insert(abi::selector(signature), Err((code, message.to_string())));
            self
        }

        fn erc20(balance_hex: &str, decimals: u8) -> Self {
            Self::default()
                .reply(BALANCE_OF_SIGNATURE, balance_hex)
                .reply(DECIMALS_SIGNATURE, &format!("0x{:064x}", decimals))
                .reply(SYMBOL_SIGNATURE, ZKL_BYTES32)
        }

        fn call_log(&self) -> Vec<[u8; 4]> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContractCaller for ScriptedNode {
        async fn call(&self, _contract: &EvmAddress, data: &[u8]) -> crate::Result<String> {
            let mut sel = [0u8; 4];
            sel.copy_from_slice(&data[..4]);
            self.calls.lock().unwrap().push(sel);
            match self.replies.get(&sel) {
                Some(Ok(result)) => Ok(result.clone()),
                Some(Err((code, message))) => Err(RpcError::Node {
                    code: *code,
                    message: message.clone(),
                }),
                None => Err(RpcError::protocol("no scripted reply")),
            }
        }
    }

    fn addr(s: &str) -> EvmAddress {
        EvmAddress::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_three_calls_in_order() {
        // 1234.5 tokens with 18 decimals
        let raw: BigUint = "1234500000000000000000".parse().unwrap();
        let oracle = BalanceOracle::new(ScriptedNode::erc20(&format!("0x{:x}", raw), 18))
            .with_metadata_cache(false);

        let balance = oracle.get_balance(&addr(HOLDER), &addr(TOKEN)).await.unwrap();
        assert_eq!(balance.raw, raw);
        assert_eq!(balance.whole, BigUint::from(1234u32));
        assert_eq!(balance.decimals, 18);
        assert_eq!(balance.symbol, "ZKL");

        assert_eq!(
            oracle.caller().call_log(),
            vec![
                abi::selector(BALANCE_OF_SIGNATURE),
                abi::selector(DECIMALS_SIGNATURE),
                abi::selector(SYMBOL_SIGNATURE),
            ]
        );
    }

    #[tokio::test]
    async fn test_wide_balance_is_exact() {
        let raw: BigUint = "123456789012345678901234567890".parse().unwrap();
        let oracle = BalanceOracle::new(ScriptedNode::erc20(&format!("0x{:064x}", raw), 18));

        let balance = oracle.get_balance(&addr(HOLDER), &addr(TOKEN)).await.unwrap();
        assert_eq!(balance.whole, BigUint::from(123_456_789_012u64));
    }

    #[tokio::test]
    async fn test_metadata_cached_per_contract() {
        let oracle = BalanceOracle::new(ScriptedNode::erc20("0x64", 0));

        oracle.get_balance(&addr(HOLDER), &addr(TOKEN)).await.unwrap();
        let second = oracle.get_balance(&addr(HOLDER), &addr(TOKEN)).await.unwrap();
        assert_eq!(second.whole, BigUint::from(100u32));

        let log = oracle.caller().call_log();
        assert_eq!(log.len(), 4);
        assert_eq!(log[3], abi::selector(BALANCE_OF_SIGNATURE));
    }

    #[tokio::test]
    async fn test_uncached_refetches_metadata() {
        let oracle =
            BalanceOracle::new(ScriptedNode::erc20("0x64", 0)).with_metadata_cache(false);

        oracle.get_balance(&addr(HOLDER), &addr(TOKEN)).await.unwrap();
        oracle.get_balance(&addr(HOLDER), &addr(TOKEN)).await.unwrap();
        assert_eq!(oracle.caller().call_log().len(), 6);
    }

    #[tokio::test]
    async fn test_decimals_failure_names_call() {
        let node = ScriptedNode::default()
            .reply(BALANCE_OF_SIGNATURE, "0x01")
            .fail(DECIMALS_SIGNATURE, 3, "execution reverted");
        let oracle = BalanceOracle::new(node);

        let err = oracle
            .get_balance(&addr(HOLDER), &addr(TOKEN))
            .await
            .unwrap_err();
        assert_eq!(err.call, BalanceCall::Decimals);
        assert!(matches!(err.source, RpcError::Node { code: 3, .. }));
    }

    #[tokio::test]
    async fn test_malformed_balance_names_call() {
        let oracle = BalanceOracle::new(ScriptedNode::erc20("0xnothex", 18));

        let err = oracle
            .get_balance(&addr(HOLDER), &addr(TOKEN))
            .await
            .unwrap_err();
        assert_eq!(err.call, BalanceCall::Balance);
        assert!(matches!(err.source, RpcError::Decode { .. }));
        // Nothing after the failing call is attempted
        assert_eq!(oracle.caller().call_log().len(), 1);
    }

    #[tokio::test]
    async fn test_decimals_out_of_range() {
        let node = ScriptedNode::default()
            .reply(BALANCE_OF_SIGNATURE, "0x01")
            .reply(DECIMALS_SIGNATURE, "0x012c");
        let oracle = BalanceOracle::new(node);

        let err = oracle
            .get_balance(&addr(HOLDER), &addr(TOKEN))
            .await
            .unwrap_err();
        assert_eq!(err.call, BalanceCall::Decimals);
        assert!(matches!(err.source, RpcError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_undecodable_symbol_falls_back_to_empty() {
        let node = ScriptedNode::default()
            .reply(BALANCE_OF_SIGNATURE, "0x0a")
            .reply(DECIMALS_SIGNATURE, "0x00")
            .reply(SYMBOL_SIGNATURE, "0xfffe");
        let oracle = BalanceOracle::new(node);

        let balance = oracle.get_balance(&addr(HOLDER), &addr(TOKEN)).await.unwrap();
        assert_eq!(balance.symbol, "");
        assert_eq!(balance.whole, BigUint::from(10u32));
    }

    #[tokio::test]
    async fn test_symbol_node_error_propagates() {
        let node = ScriptedNode::default()
            .reply(BALANCE_OF_SIGNATURE, "0x0a")
            .reply(DECIMALS_SIGNATURE, "0x00")
            .fail(SYMBOL_SIGNATURE, -32000, "header not found");
        let oracle = BalanceOracle::new(node);

        let err = oracle
            .get_balance(&addr(HOLDER), &addr(TOKEN))
            .await
            .unwrap_err();
        assert_eq!(err.call, BalanceCall::Symbol);
    }
}
