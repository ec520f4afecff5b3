//! Reserve configuration cache.
//!
//! Decimals and liquidation bonus per reserve, refreshed from the pool's data
//! provider. Stale values between refreshes are tolerated.

use alloy::primitives::Address;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use liquidator_chain::PoolReader;
use tracing::{debug, info, warn};

/// Cached configuration of one reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveConfig {
    /// Token decimals
    pub decimals: u8,
    /// Liquidation bonus (basis points)
    pub liquidation_bonus: u16,
    /// Block of the refresh that wrote this entry
    pub last_update_block: u64,
}

/// Outcome of a refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub listed: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Concurrent reserve config map.
#[derive(Debug, Default)]
pub struct ReserveConfigStore {
    configs: DashMap<Address, ReserveConfig>,
}

impl ReserveConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, asset: &Address) -> Option<ReserveConfig> {
        self.configs.get(asset).map(|c| *c)
    }

    pub fn insert(&self, asset: Address, config: ReserveConfig) {
        self.configs.insert(asset, config);
    }

    /// All known reserves, sorted.
    pub fn assets(&self) -> Vec<Address> {
        let mut assets: Vec<Address> = self.configs.iter().map(|e| *e.key()).collect();
        assets.sort_unstable();
        assets
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Re-read every listed reserve. Reserves whose read fails keep their
    /// previous entry; reserves no longer listed are dropped.
    pub async fn refresh(
        &self,
        reader: &dyn PoolReader,
        batch_size: usize,
        concurrency: usize,
        block: u64,
    ) -> anyhow::Result<RefreshStats> {
        let listed = reader.reserve_list().await?;
        let mut stats = RefreshStats { listed: listed.len(), ..Default::default() };

        let mut batches = stream::iter(listed.chunks(batch_size.max(1)))
            .map(|chunk| async move { (chunk, reader.reserve_configurations(chunk).await) })
            .buffered(concurrency.max(1));

        while let Some((chunk, result)) = batches.next().await {
            for (asset, config) in chunk.iter().zip(result?) {
                match config {
                    Some(c) => {
                        self.insert(
                            *asset,
                            ReserveConfig {
                                decimals: c.decimals,
                                liquidation_bonus: c.liquidation_bonus,
                                last_update_block: block,
                            },
                        );
                        stats.updated += 1;
                    }
                    None => {
                        warn!(asset = %asset, "Reserve configuration read failed, skipping");
                        stats.failed += 1;
                    }
                }
            }
        }

        self.configs.retain(|asset, _| listed.contains(asset));

        info!(
            listed = stats.listed,
            updated = stats.updated,
            failed = stats.failed,
            block = block,
            "Reserve configurations refreshed"
        );
        debug!(reserves = ?self.assets(), "Known reserves");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePool;
    use liquidator_chain::ReserveConfiguration;

    #[tokio::test]
    async fn test_refresh_skips_failed_reads() {
        let pool = FakePool::new();
        let usdc = Address::repeat_byte(0x01);
        let weth = Address::repeat_byte(0x02);
        let broken = Address::repeat_byte(0x03);
        pool.add_reserve(ReserveConfiguration { asset: usdc, decimals: 6, liquidation_bonus: 10500 });
        pool.add_reserve(ReserveConfiguration { asset: weth, decimals: 18, liquidation_bonus: 10500 });
        pool.list_reserve_without_config(broken);

        let store = ReserveConfigStore::new();
        let stats = store.refresh(&pool, 2, 2, 100).await.unwrap();

        assert_eq!(stats, RefreshStats { listed: 3, updated: 2, failed: 1 });
        assert_eq!(store.get(&usdc).unwrap().decimals, 6);
        assert_eq!(store.get(&weth).unwrap().last_update_block, 100);
        assert!(store.get(&broken).is_none());
        assert_eq!(store.assets(), vec![usdc, weth]);
    }

    #[tokio::test]
    async fn test_refresh_drops_delisted() {
        let pool = FakePool::new();
        let usdc = Address::repeat_byte(0x01);
        pool.add_reserve(ReserveConfiguration { asset: usdc, decimals: 6, liquidation_bonus: 10500 });

        let store = ReserveConfigStore::new();
        store.insert(
            Address::repeat_byte(0x09),
            ReserveConfig { decimals: 18, liquidation_bonus: 10800, last_update_block: 1 },
        );
        store.refresh(&pool, 50, 1, 5).await.unwrap();

        assert_eq!(store.assets(), vec![usdc]);
    }
}
