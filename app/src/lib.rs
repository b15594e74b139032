//! Tiergate service library
//!
//! Wires configuration, the node client, the address book and the guild
//! into a reconciliation driver, then serves the API and the daily batch.

pub mod scheduler;

use std::sync::Arc;

use anyhow::Context;
use evm_node_client::{BalanceOracle, NodeClient};
use tiergate_api::AppState;
use tiergate_core::AppConfig;
use tiergate_engine::{JsonFileAddressBook, MemoryGuild, TierDriver, TierLadder};
use tokio::sync::watch;

use scheduler::DailySchedule;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "TIERGATE_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "tiergate.json";

/// Load, override and validate the configuration
pub fn load_config() -> anyhow::Result<AppConfig> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = AppConfig::load(&path).with_context(|| format!("loading {}", path))?;
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

/// Build the shared state from a validated configuration
pub async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let ladder = TierLadder::new(config.tiers.clone())?;
    let token = config.token_contract()?;

    let node = NodeClient::new(config.node.clone())?;
    let oracle =
        BalanceOracle::new(node.clone()).with_metadata_cache(config.token.cache_metadata);

    let address_book = JsonFileAddressBook::open(&config.address_book_path).await?;

    let guild = match &config.guild_path {
        Some(path) => MemoryGuild::load(path).await?,
        None => {
            tracing::warn!("No guild_path configured, starting with an empty guild");
            MemoryGuild::new()
        }
    };

    tracing::info!(
        token = %token,
        node = %config.node.url,
        tiers = ladder.tiers().len(),
        "Reconciliation driver ready"
    );

    let driver = TierDriver::new(
        Arc::new(oracle),
        Arc::new(guild),
        Arc::new(address_book),
        ladder,
        token,
        config.reconcile.clone(),
    );

    Ok(AppState::new(Arc::new(driver), Some(node)))
}

/// Run the service until Ctrl-C
pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,tiergate=debug,tiergate_engine=debug")
            }),
        )
        .init();

    tracing::info!("Starting Tiergate");

    let config = load_config()?;
    let state = build_state(&config).await?;
    let schedule = DailySchedule::from_config(&config.schedule)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(scheduler::run(
        state.clone(),
        schedule,
        config.schedule.run_on_startup,
        shutdown_rx,
    ));

    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
        tracing::info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    };

    tiergate_api::start_server(state, config.api_port, shutdown).await?;
    scheduler.await?;

    tracing::info!("Tiergate stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tiergate_core::{LadderError, MemberId, TierConfig};
    use tiergate_engine::AddressBook;

    const TOKEN: &str = "0x19ac2659599fd01c853de846919544276ad26f50";

    fn temp_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("tiergate-app-{}-{}.json", name, std::process::id()))
            .display()
            .to_string()
    }

    #[tokio::test]
    async fn test_build_state_from_files() {
        let guild_path = temp_path("guild");
        tokio::fs::write(
            &guild_path,
            r#"{"members": [{"id": 1, "username": "alice", "roles": ["Bronze"]}]}"#,
        )
        .await
        .unwrap();

        let book_path = temp_path("book");
        tokio::fs::write(
            &book_path,
            r#"{"1": "0x8ba1f109551bd432803012645ac136ddd64dba72"}"#,
        )
        .await
        .unwrap();

        let mut config = AppConfig::default();
        config.token.contract = TOKEN.to_string();
        config.guild_path = Some(guild_path.clone());
        config.address_book_path = book_path.clone();

        let state = build_state(&config).await.unwrap();
        let driver = state.driver();
        assert_eq!(driver.token().as_str(), TOKEN);
        assert_eq!(driver.ladder().tiers().len(), 5);
        assert!(driver.address_book().get(MemberId(1)).await.unwrap().is_some());
        assert!(state.node_client().is_some());

        let _ = tokio::fs::remove_file(&guild_path).await;
        let _ = tokio::fs::remove_file(&book_path).await;
    }

    #[tokio::test]
    async fn test_build_state_rejects_bad_ladder() {
        let mut config = AppConfig::default();
        config.token.contract = TOKEN.to_string();
        config.address_book_path = temp_path("unused-book");
        config.tiers = vec![TierConfig::new("Only", Some(10))];

        let err = build_state(&config).await.err().unwrap();
        assert_eq!(
            err.downcast_ref::<LadderError>(),
            Some(&LadderError::MissingUnbounded)
        );
    }
}
