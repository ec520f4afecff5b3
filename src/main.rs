//! Aave V3 Liquidation Bot
//!
//! Tracks pool borrowers from Borrow/Supply/Repay/Withdraw events and
//! periodic health factor rechecks, and liquidates undercollateralized
//! accounts through a flash-loan receiver contract.
//! Without `FLASHLOAN_RECEIVER` and `PRIVATE_KEY` the bot runs in dry-run mode.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use liquidator_chain::{
    AaveV3Config, AaveV3Protocol, EventListener, EventStream, FlashLoanReceiver,
    LiquidationSubmitter, PoolEvent, ProviderManager, TransactionSender, MULTICALL3_ADDRESS,
};
use liquidator_core::{BotConfig, JsonFileStore, Scanner};

/// Environment variable names.
mod env {
    pub const RPC_HTTP_URL: &str = "RPC_HTTP_URL";
    pub const RPC_WS_URL: &str = "RPC_WS_URL";
    pub const POOL_ADDRESSES_PROVIDER: &str = "POOL_ADDRESSES_PROVIDER";
    pub const UI_POOL_DATA_PROVIDER_V3: &str = "UI_POOL_DATA_PROVIDER_V3";
    pub const MULTICALL3: &str = "MULTICALL3";
    pub const FLASHLOAN_RECEIVER: &str = "FLASHLOAN_RECEIVER";
    pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
}

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,liquidator_core=debug,liquidator_chain=debug")),
        )
        .init();

    let bot_config = BotConfig::from_env()?;
    bot_config.log_config();

    info!("Starting Aave V3 Liquidation Bot");

    let deployment = Deployment::from_env()?;

    let provider = Arc::new(ProviderManager::new(&deployment.http_url, &deployment.ws_url).await?);
    let chain_id = provider.chain_id().await?;
    info!(chain_id = chain_id, "Provider initialized");

    let protocol = Arc::new(
        AaveV3Protocol::connect(
            AaveV3Config {
                pool_addresses_provider: deployment.pool_addresses_provider,
                ui_pool_data_provider: deployment.ui_pool_data_provider,
                multicall: deployment.multicall,
                ..Default::default()
            },
            provider.clone(),
        )
        .await?,
    );
    info!(pool = %protocol.pool_address(), oracle = %protocol.oracle_address(), "Pool resolved");

    let submitter = build_submitter(&deployment)?;

    let store = Arc::new(JsonFileStore::new(
        &bot_config.storage.borrowers_path,
        &bot_config.storage.block_path,
    ));
    let scanner = Scanner::new(bot_config, protocol.clone(), store, submitter)?;

    info!("Bootstrapping...");
    let startup = scanner.bootstrap().await?;
    info!(
        head = startup.head,
        merged = startup.backfill.merged,
        reserves = startup.reserves.updated,
        "Startup complete"
    );

    let listener = EventListener::new(provider.ws_url(), protocol.pool_address());
    loop {
        match subscribe(&listener).await {
            Ok((events, blocks)) => {
                scanner.run(events, blocks).await;
                warn!("Subscriptions ended, reconnecting in 5s...");
            }
            Err(e) => {
                error!(error = %e, "Subscription failed, reconnecting in 5s...");
            }
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn subscribe(listener: &EventListener) -> Result<(EventStream<PoolEvent>, EventStream<u64>)> {
    let events = listener.subscribe_pool_events().await?;
    let blocks = listener.subscribe_new_heads().await?;
    Ok((events, blocks))
}

/// Live submitter when both the receiver and a key are configured.
fn build_submitter(deployment: &Deployment) -> Result<Option<Arc<dyn LiquidationSubmitter>>> {
    let (Some(receiver), Some(private_key)) = (deployment.flashloan_receiver, &deployment.private_key) else {
        warn!("FLASHLOAN_RECEIVER or PRIVATE_KEY not set, running in dry-run mode");
        return Ok(None);
    };

    let sender = Arc::new(TransactionSender::new(private_key, &deployment.http_url)?);
    info!(address = %sender.address, receiver = %receiver, "Transaction sender initialized");
    let submitter: Arc<dyn LiquidationSubmitter> = Arc::new(FlashLoanReceiver::new(receiver, sender));
    Ok(Some(submitter))
}

/// Deployment addresses and endpoints loaded from environment.
struct Deployment {
    http_url: String,
    ws_url: String,
    pool_addresses_provider: Address,
    ui_pool_data_provider: Address,
    multicall: Address,
    flashloan_receiver: Option<Address>,
    private_key: Option<String>,
}

impl Deployment {
    fn from_env() -> Result<Self> {
        let get_env = |name: &str| -> Result<String> {
            std::env::var(name).with_context(|| format!("Missing env var: {name}"))
        };
        let parse_address = |name: &str, value: String| -> Result<Address> {
            value
                .trim()
                .parse()
                .with_context(|| format!("Invalid address for {name}: {value}"))
        };
        let optional = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let multicall = match optional(env::MULTICALL3) {
            Some(value) => parse_address(env::MULTICALL3, value)?,
            None => MULTICALL3_ADDRESS,
        };
        let flashloan_receiver = optional(env::FLASHLOAN_RECEIVER)
            .map(|value| parse_address(env::FLASHLOAN_RECEIVER, value))
            .transpose()?;

        Ok(Self {
            http_url: get_env(env::RPC_HTTP_URL)?,
            ws_url: get_env(env::RPC_WS_URL)?,
            pool_addresses_provider: parse_address(
                env::POOL_ADDRESSES_PROVIDER,
                get_env(env::POOL_ADDRESSES_PROVIDER)?,
            )?,
            ui_pool_data_provider: parse_address(
                env::UI_POOL_DATA_PROVIDER_V3,
                get_env(env::UI_POOL_DATA_PROVIDER_V3)?,
            )?,
            multicall,
            flashloan_receiver,
            private_key: optional(env::PRIVATE_KEY),
        })
    }
}
