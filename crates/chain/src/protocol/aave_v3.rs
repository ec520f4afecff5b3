//! AAVE V3 protocol implementation.
//!
//! This module provides the [`PoolReader`] implementation for AAVE V3 and
//! compatible forks. Batched reads go through Multicall3 so a single reverting
//! sub-call does not sink the batch.

use super::{BorrowLog, PoolReader, ReserveConfiguration, UserReserve, UserReserveBalance};
use crate::contracts::{
    aave_v3_signatures, IAaveOracle, IPool, IPoolAddressesProvider, IPoolDataProvider,
    IUiPoolDataProviderV3, MulticallBatch, MULTICALL3_ADDRESS,
};
use crate::provider::ProviderManager;
use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use alloy::rpc::types::Filter;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default block span per `eth_getLogs` request.
const DEFAULT_LOG_PAGE_SIZE: u64 = 10_000;

/// Configuration for AAVE V3 protocol.
#[derive(Debug, Clone)]
pub struct AaveV3Config {
    /// PoolAddressesProvider (entry point for pool, data provider and oracle)
    pub pool_addresses_provider: Address,
    /// UiPoolDataProviderV3 used for user reserve snapshots
    pub ui_pool_data_provider: Address,
    /// Multicall3 contract
    pub multicall: Address,
    /// Max block span per log query
    pub log_page_size: u64,
}

impl Default for AaveV3Config {
    fn default() -> Self {
        Self {
            pool_addresses_provider: Address::ZERO,
            ui_pool_data_provider: Address::ZERO,
            multicall: MULTICALL3_ADDRESS,
            log_page_size: DEFAULT_LOG_PAGE_SIZE,
        }
    }
}

/// Contract addresses resolved from the addresses provider.
#[derive(Debug, Clone, Copy)]
struct ResolvedAddresses {
    pool: Address,
    data_provider: Address,
    oracle: Address,
}

/// AAVE V3 protocol implementation.
#[derive(Debug)]
pub struct AaveV3Protocol {
    config: AaveV3Config,
    provider: Arc<ProviderManager>,
    addresses: ResolvedAddresses,
}

impl AaveV3Protocol {
    /// Resolve the pool, data provider and oracle through the addresses provider.
    pub async fn connect(config: AaveV3Config, provider: Arc<ProviderManager>) -> Result<Self> {
        let http = provider.http()?;
        let addresses_provider = IPoolAddressesProvider::new(config.pool_addresses_provider, &http);

        let pool = addresses_provider.getPool().call().await?._0;
        let data_provider = addresses_provider.getPoolDataProvider().call().await?._0;
        let oracle = addresses_provider.getPriceOracle().call().await?._0;

        info!(
            pool = %pool,
            data_provider = %data_provider,
            oracle = %oracle,
            multicall = %config.multicall,
            "AAVE V3 contracts resolved"
        );

        Ok(Self {
            config,
            provider,
            addresses: ResolvedAddresses { pool, data_provider, oracle },
        })
    }

    /// Pool contract address.
    pub fn pool_address(&self) -> Address {
        self.addresses.pool
    }

    /// Price oracle address.
    pub fn oracle_address(&self) -> Address {
        self.addresses.oracle
    }
}

#[async_trait]
impl PoolReader for AaveV3Protocol {
    async fn block_number(&self) -> Result<u64> {
        self.provider.block_number().await
    }

    async fn health_factor(&self, user: Address) -> Result<U256> {
        let http = self.provider.http()?;
        let pool = IPool::new(self.addresses.pool, &http);
        let data = pool.getUserAccountData(user).call().await?;
        Ok(data.healthFactor)
    }

    async fn health_factors(&self, users: &[Address]) -> Result<Vec<Option<U256>>> {
        let mut batch = MulticallBatch::new();
        for user in users {
            batch.push(self.addresses.pool, IPool::getUserAccountDataCall { user: *user });
        }

        let http = self.provider.http()?;
        let results = batch.execute(&http, self.config.multicall).await?;
        Ok(results.into_iter().map(|r| r.map(|data| data.healthFactor)).collect())
    }

    async fn borrow_logs(&self, from_block: u64, to_block: u64) -> Result<Vec<BorrowLog>> {
        let http = self.provider.http()?;
        let page = self.config.log_page_size.max(1);
        let mut logs = Vec::new();

        let mut start = from_block;
        while start <= to_block {
            let end = start.saturating_add(page - 1).min(to_block);
            let filter = Filter::new()
                .address(self.addresses.pool)
                .event_signature(aave_v3_signatures::BORROW)
                .from_block(start)
                .to_block(end);

            let page_logs = http.get_logs(&filter).await?;
            debug!(from = start, to = end, logs = page_logs.len(), "Fetched Borrow logs");

            for log in page_logs {
                match log.log_decode::<IPool::Borrow>() {
                    Ok(decoded) => logs.push(BorrowLog {
                        on_behalf_of: decoded.inner.data.onBehalfOf,
                        block_number: log.block_number.unwrap_or(end),
                    }),
                    Err(e) => warn!(error = %e, "Skipping malformed Borrow log"),
                }
            }

            if end == u64::MAX {
                break;
            }
            start = end + 1;
        }

        Ok(logs)
    }

    async fn reserve_list(&self) -> Result<Vec<Address>> {
        let http = self.provider.http()?;
        let data_provider = IPoolDataProvider::new(self.addresses.data_provider, &http);
        let tokens = data_provider.getAllReservesTokens().call().await?._0;
        Ok(tokens.into_iter().map(|t| t.tokenAddress).collect())
    }

    async fn reserve_configurations(
        &self,
        assets: &[Address],
    ) -> Result<Vec<Option<ReserveConfiguration>>> {
        let mut batch = MulticallBatch::new();
        for asset in assets {
            batch.push(
                self.addresses.data_provider,
                IPoolDataProvider::getReserveConfigurationDataCall { asset: *asset },
            );
        }

        let http = self.provider.http()?;
        let results = batch.execute(&http, self.config.multicall).await?;

        Ok(assets
            .iter()
            .zip(results)
            .map(|(asset, result)| {
                let data = result?;
                Some(ReserveConfiguration {
                    asset: *asset,
                    decimals: data.decimals.try_into().ok()?,
                    liquidation_bonus: data.liquidationBonus.try_into().ok()?,
                })
            })
            .collect())
    }

    async fn asset_prices(&self, assets: &[Address]) -> Result<Vec<U256>> {
        let http = self.provider.http()?;
        let oracle = IAaveOracle::new(self.addresses.oracle, &http);
        let prices = oracle.getAssetsPrices(assets.to_vec()).call().await?._0;
        Ok(prices)
    }

    async fn user_reserves(&self, users: &[Address]) -> Result<Vec<Option<Vec<UserReserve>>>> {
        let mut batch = MulticallBatch::new();
        for user in users {
            batch.push(
                self.config.ui_pool_data_provider,
                IUiPoolDataProviderV3::getUserReservesDataCall {
                    provider: self.config.pool_addresses_provider,
                    user: *user,
                },
            );
        }

        let http = self.provider.http()?;
        let results = batch.execute(&http, self.config.multicall).await?;

        Ok(results
            .into_iter()
            .map(|result| {
                result.map(|data| {
                    data._0
                        .into_iter()
                        .map(|r| UserReserve {
                            asset: r.underlyingAsset,
                            scaled_atoken_balance: r.scaledATokenBalance,
                            usage_as_collateral_enabled: r.usageAsCollateralEnabledOnUser,
                            scaled_variable_debt: r.scaledVariableDebt,
                        })
                        .collect()
                })
            })
            .collect())
    }

    async fn user_reserve_balances(
        &self,
        user: Address,
        assets: &[Address],
    ) -> Result<Vec<Option<UserReserveBalance>>> {
        let mut batch = MulticallBatch::new();
        for asset in assets {
            batch.push(
                self.addresses.data_provider,
                IPoolDataProvider::getUserReserveDataCall { asset: *asset, user },
            );
        }

        let http = self.provider.http()?;
        let results = batch.execute(&http, self.config.multicall).await?;

        Ok(results
            .into_iter()
            .map(|result| {
                result.map(|data| UserReserveBalance {
                    atoken_balance: data.currentATokenBalance,
                    variable_debt: data.currentVariableDebt,
                })
            })
            .collect())
    }
}
