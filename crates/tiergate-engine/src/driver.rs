//! Reconciliation driver
//!
//! Runs balance → tier → roles for one member on demand, or for every
//! registered holder as a batch. This is the only place pipeline errors are
//! handled terminally: on-demand failures come back as one `DriverError`,
//! batch failures are logged and collected without stopping the loop.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use evm_node_client::{BalanceOracle, ContractCaller};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tiergate_core::{
    BalanceQueryError, DriverError, EvmAddress, MemberId, ReconcileConfig, RegisteredHolder,
    TokenBalance,
};
use tokio::sync::Mutex;

use crate::address_book::AddressBook;
use crate::guild::Guild;
use crate::identity::resolve_identity;
use crate::ladder::TierLadder;
use crate::roles::{self, RoleChanges};

/// Source of token balances
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn balance_of(
        &self,
        holder: &EvmAddress,
        token: &EvmAddress,
    ) -> Result<TokenBalance, BalanceQueryError>;
}

#[async_trait]
impl<C: ContractCaller> BalanceSource for BalanceOracle<C> {
    async fn balance_of(
        &self,
        holder: &EvmAddress,
        token: &EvmAddress,
    ) -> Result<TokenBalance, BalanceQueryError> {
        self.get_balance(holder, token).await
    }
}

/// Outcome of one successful pipeline run
#[derive(Debug, Clone)]
pub struct TierReport {
    pub member: MemberId,
    pub address: EvmAddress,
    pub balance: TokenBalance,
    pub tier: String,
    pub changes: RoleChanges,
}

impl fmt::Display for TierReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "member {} holds {} at {}, tier {}",
            self.member, self.balance, self.address, self.tier
        )?;
        if self.changes.is_empty() {
            write!(f, " (unchanged)")
        } else if self.changes.removed.is_empty() {
            write!(f, " (assigned)")
        } else {
            write!(f, " (replaced {})", self.changes.removed.join(", "))
        }
    }
}

/// A holder the batch could not reconcile
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub member: MemberId,
    pub code: String,
    pub message: String,
}

/// Result of a batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    /// Ordered by member id
    pub failures: Vec<BatchFailure>,
    /// Number of reconciled holders per tier
    pub tiers: BTreeMap<String, usize>,
}

/// Orchestrates the reconciliation pipeline
pub struct TierDriver {
    balances: Arc<dyn BalanceSource>,
    guild: Arc<dyn Guild>,
    address_book: Arc<dyn AddressBook>,
    ladder: TierLadder,
    token: EvmAddress,
    config: ReconcileConfig,
    /// Serializes role registry lookups with role creation
    role_registry: Mutex<()>,
}

impl TierDriver {
    pub fn new(
        balances: Arc<dyn BalanceSource>,
        guild: Arc<dyn Guild>,
        address_book: Arc<dyn AddressBook>,
        ladder: TierLadder,
        token: EvmAddress,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            balances,
            guild,
            address_book,
            ladder,
            token,
            config,
            role_registry: Mutex::new(()),
        }
    }

    pub fn ladder(&self) -> &TierLadder {
        &self.ladder
    }

    pub fn token(&self) -> &EvmAddress {
        &self.token
    }

    pub fn address_book(&self) -> &Arc<dyn AddressBook> {
        &self.address_book
    }

    pub fn balances(&self) -> &Arc<dyn BalanceSource> {
        &self.balances
    }

    /// Resolve `query` to a member and reconcile it
    pub async fn on_demand(&self, query: &str) -> Result<TierReport, DriverError> {
        self.with_deadline(async {
            let member = resolve_identity(query, &*self.guild)
                .await?
                .ok_or_else(|| DriverError::IdentityNotFound {
                    query: query.to_string(),
                })?;
            self.pipeline(member).await
        })
        .await
    }

    /// Reconcile a known member
    pub async fn reconcile_member(&self, member: MemberId) -> Result<TierReport, DriverError> {
        self.with_deadline(self.pipeline(member)).await
    }

    /// Reconcile every registered holder. Only a failure to list holders
    /// fails the batch as a whole.
    pub async fn run_batch(&self) -> Result<BatchSummary, DriverError> {
        let holders = self.address_book.holders().await?;
        let concurrency = self.config.batch_concurrency.max(1);

        tracing::info!(holders = holders.len(), concurrency, "Starting batch reconciliation");

        let outcomes: Vec<_> = stream::iter(holders)
            .map(|holder| self.reconcile_holder(holder))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut summary = BatchSummary {
            attempted: outcomes.len(),
            ..BatchSummary::default()
        };

        for (member, outcome) in outcomes {
            match outcome {
                Ok(report) => {
                    summary.succeeded += 1;
                    *summary.tiers.entry(report.tier).or_default() += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        member = %member,
                        code = e.error_code(),
                        retryable = e.is_retryable(),
                        "Holder reconciliation failed: {}",
                        e
                    );
                    summary.failures.push(BatchFailure {
                        member,
                        code: e.error_code().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        summary.failures.sort_by_key(|f| f.member);

        tracing::info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failures.len(),
            "Batch reconciliation finished"
        );

        Ok(summary)
    }

    async fn reconcile_holder(
        &self,
        holder: RegisteredHolder,
    ) -> (MemberId, Result<TierReport, DriverError>) {
        let outcome = self
            .with_deadline(self.run(holder.member, &holder.address))
            .await;
        (holder.member, outcome)
    }

    async fn pipeline(&self, member: MemberId) -> Result<TierReport, DriverError> {
        let address = self
            .address_book
            .get(member)
            .await?
            .ok_or(DriverError::NotRegistered { member })?;
        self.run(member, &address).await
    }

    async fn run(&self, member: MemberId, address: &EvmAddress) -> Result<TierReport, DriverError> {
        let balance = self.fetch_balance(address).await?;
        let tier = self.ladder.resolve(&balance.whole).label.clone();
        let changes = roles::reconcile(
            &*self.guild,
            member,
            &self.ladder,
            &tier,
            &self.role_registry,
        )
        .await?;

        tracing::info!(
            member = %member,
            address = %address,
            balance = %balance,
            tier = %tier,
            removed = changes.removed.len(),
            added = changes.added.is_some(),
            "Reconciled member tier"
        );

        Ok(TierReport {
            member,
            address: address.clone(),
            balance,
            tier,
            changes,
        })
    }

    /// Query the balance, retrying retryable failures with linear backoff
    async fn fetch_balance(&self, address: &EvmAddress) -> Result<TokenBalance, BalanceQueryError> {
        let mut attempt = 0u32;
        loop {
            match self.balances.balance_of(address, &self.token).await {
                Ok(balance) => return Ok(balance),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.retry_backoff_ms.saturating_mul(u64::from(attempt));
                    tracing::warn!(
                        address = %address,
                        attempt,
                        delay_ms = delay,
                        "Balance query failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn with_deadline<T>(
        &self,
        pipeline: impl Future<Output = Result<T, DriverError>>,
    ) -> Result<T, DriverError> {
        let secs = self.config.pipeline_timeout_secs;
        tokio::time::timeout(Duration::from_secs(secs), pipeline)
            .await
            .map_err(|_| DriverError::Timeout { secs })?
    }
}
