//! Liquidatable borrower selection and position loading.

use alloy::primitives::{Address, U256};
use futures::stream::{self, StreamExt};
use liquidator_chain::{PoolReader, UserReserve};
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::EngineError;
use crate::ledger::{BorrowerLedger, BorrowerRecord};
use crate::position::{BorrowerState, CollateralData, DebtData, PositionSnapshot, PriceSnapshot};
use crate::reserves::ReserveConfigStore;

/// Borrowers whose health factor is strictly below `threshold`, in ledger order.
pub fn identify_liquidatable(records: &[(Address, BorrowerRecord)], threshold: U256) -> Vec<Address> {
    records
        .iter()
        .filter(|(_, record)| record.health_factor < threshold)
        .map(|(borrower, _)| *borrower)
        .collect()
}

/// Split a reserves snapshot into collateral and debt assets.
/// A reserve can land on both sides.
pub fn classify_reserves(
    borrower: Address,
    reserves: &[UserReserve],
    health_factor: U256,
    max_liquidation_threshold: U256,
) -> PositionSnapshot {
    let mut collateral = SmallVec::new();
    let mut debt = SmallVec::new();

    for reserve in reserves {
        if reserve.usage_as_collateral_enabled && !reserve.scaled_atoken_balance.is_zero() {
            collateral.push(reserve.asset);
        }
        if !reserve.scaled_variable_debt.is_zero() {
            debt.push(reserve.asset);
        }
    }

    PositionSnapshot {
        borrower,
        collateral,
        debt,
        can_be_max_liquidated: health_factor < max_liquidation_threshold,
    }
}

pub struct CandidateSelector {
    ledger: Arc<BorrowerLedger>,
    reader: Arc<dyn PoolReader>,
    reserves: Arc<ReserveConfigStore>,
    liquidation_threshold: U256,
    max_liquidation_threshold: U256,
    batch_size: usize,
    concurrency: usize,
}

impl CandidateSelector {
    pub fn new(
        ledger: Arc<BorrowerLedger>,
        reader: Arc<dyn PoolReader>,
        reserves: Arc<ReserveConfigStore>,
        liquidation_threshold: U256,
        max_liquidation_threshold: U256,
        batch_size: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            ledger,
            reader,
            reserves,
            liquidation_threshold,
            max_liquidation_threshold,
            batch_size: batch_size.max(1),
            concurrency: concurrency.max(1),
        }
    }

    pub fn identify(&self) -> Vec<Address> {
        identify_liquidatable(&self.ledger.all(), self.liquidation_threshold)
    }

    /// Reserves snapshots of `borrowers`. Failed reads and borrowers that
    /// left the ledger meanwhile are skipped for this pass.
    #[instrument(skip_all, fields(borrowers = borrowers.len()))]
    pub async fn snapshots(&self, borrowers: &[Address]) -> Result<Vec<PositionSnapshot>, EngineError> {
        let reader = &self.reader;
        let mut batches = stream::iter(borrowers.chunks(self.batch_size))
            .map(|chunk| async move { (chunk, reader.user_reserves(chunk).await) })
            .buffered(self.concurrency);

        let mut snapshots = Vec::with_capacity(borrowers.len());
        while let Some((chunk, result)) = batches.next().await {
            for (borrower, reserves) in chunk.iter().zip(result?) {
                let Some(reserves) = reserves else {
                    debug!(borrower = %borrower, "Reserves read failed, skipping");
                    continue;
                };
                let Some(record) = self.ledger.get(borrower) else {
                    continue;
                };
                snapshots.push(classify_reserves(
                    *borrower,
                    &reserves,
                    record.health_factor,
                    self.max_liquidation_threshold,
                ));
            }
        }
        Ok(snapshots)
    }

    /// Price and size every asset of `snapshot`. Assets lacking a config,
    /// a price or a balance are left out.
    pub async fn borrower_state(
        &self,
        snapshot: &PositionSnapshot,
        prices: &PriceSnapshot,
    ) -> Result<BorrowerState, EngineError> {
        let assets = snapshot.assets();
        let balances = self.reader.user_reserve_balances(snapshot.borrower, &assets).await?;
        let balance_of = |asset: &Address| {
            assets
                .iter()
                .position(|a| a == asset)
                .and_then(|i| balances.get(i).copied().flatten())
        };

        let mut state = BorrowerState {
            borrower: snapshot.borrower,
            collateral: SmallVec::new(),
            debt: SmallVec::new(),
            can_be_max_liquidated: snapshot.can_be_max_liquidated,
        };

        for asset in &snapshot.collateral {
            let (Some(config), Some(price), Some(balance)) =
                (self.reserves.get(asset), prices.get(asset), balance_of(asset))
            else {
                warn!(borrower = %snapshot.borrower, asset = %asset, "Incomplete collateral data, skipping asset");
                continue;
            };
            if balance.atoken_balance.is_zero() {
                continue;
            }
            state.collateral.push((
                *asset,
                CollateralData {
                    decimals: config.decimals,
                    liquidation_bonus: config.liquidation_bonus,
                    price,
                    balance: balance.atoken_balance,
                },
            ));
        }

        for asset in &snapshot.debt {
            let (Some(config), Some(price), Some(balance)) =
                (self.reserves.get(asset), prices.get(asset), balance_of(asset))
            else {
                warn!(borrower = %snapshot.borrower, asset = %asset, "Incomplete debt data, skipping asset");
                continue;
            };
            if balance.variable_debt.is_zero() {
                continue;
            }
            state.debt.push((
                *asset,
                DebtData { decimals: config.decimals, price, amount: balance.variable_debt },
            ));
        }

        Ok(state)
    }

    /// States for all `snapshots`, in input order.
    pub async fn borrower_states(
        &self,
        snapshots: &[PositionSnapshot],
        prices: &PriceSnapshot,
    ) -> Result<Vec<BorrowerState>, EngineError> {
        stream::iter(snapshots)
            .map(|snapshot| self.borrower_state(snapshot, prices))
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricer::LiquidationPricer;
    use crate::reserves::ReserveConfig;
    use crate::testing::{fixtures, FakePool, MemoryStore};
    use crate::u256_math::{bps_mul, bps_to_wad, WAD};
    use liquidator_chain::UserReserveBalance;

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    fn reserve(asset: Address, collateral: u64, enabled: bool, debt: u64) -> UserReserve {
        UserReserve {
            asset,
            scaled_atoken_balance: U256::from(collateral),
            usage_as_collateral_enabled: enabled,
            scaled_variable_debt: U256::from(debt),
        }
    }

    #[test]
    fn test_threshold_partition() {
        let records = vec![
            (addr(1), BorrowerRecord { health_factor: bps_to_wad(9000), last_checked_block: 1 }),
            (addr(2), BorrowerRecord { health_factor: bps_to_wad(15000), last_checked_block: 1 }),
            (addr(3), BorrowerRecord { health_factor: WAD, last_checked_block: 1 }),
            (addr(4), BorrowerRecord { health_factor: WAD - U256::from(1), last_checked_block: 1 }),
        ];
        assert_eq!(identify_liquidatable(&records, WAD), vec![addr(1), addr(4)]);
    }

    #[test]
    fn test_classify_reserves() {
        let reserves = vec![
            reserve(addr(1), 100, true, 0),
            reserve(addr(2), 100, false, 50), // not usable as collateral
            reserve(addr(3), 100, true, 10),  // both sides
            reserve(addr(4), 0, true, 0),
        ];
        let snapshot = classify_reserves(addr(9), &reserves, bps_to_wad(9000), bps_to_wad(9500));

        assert_eq!(snapshot.collateral.as_slice(), &[addr(1), addr(3)]);
        assert_eq!(snapshot.debt.as_slice(), &[addr(2), addr(3)]);
        assert!(snapshot.can_be_max_liquidated);
    }

    #[test]
    fn test_max_liquidation_gating() {
        let max = bps_to_wad(9500);
        let deep = classify_reserves(addr(1), &[], bps_to_wad(9000), max);
        let shallow = classify_reserves(addr(2), &[], bps_to_wad(9700), max);
        assert!(deep.can_be_max_liquidated);
        assert!(!shallow.can_be_max_liquidated);

        // Shallow borrowers only get the close factor
        let pricer = LiquidationPricer::new(fixtures::WETH, U256::from(fixtures::WETH_PRICE), 5000, 10000);
        let debt = fixtures::weth_debt();
        assert_eq!(
            pricer.debt_to_cover(&debt, shallow.can_be_max_liquidated),
            bps_mul(debt.amount, 5000)
        );
        assert_eq!(pricer.debt_to_cover(&debt, shallow.can_be_max_liquidated), debt.amount / U256::from(2));
    }

    fn selector(pool: Arc<FakePool>, reserves: Arc<ReserveConfigStore>) -> (CandidateSelector, Arc<BorrowerLedger>) {
        let ledger = Arc::new(BorrowerLedger::load(Arc::new(MemoryStore::default())).unwrap());
        let selector = CandidateSelector::new(
            ledger.clone(),
            pool,
            reserves,
            WAD,
            bps_to_wad(9500),
            2,
            2,
        );
        (selector, ledger)
    }

    #[tokio::test]
    async fn test_snapshots_skip_failed_reads() {
        let pool = Arc::new(FakePool::new());
        let (selector, ledger) = selector(pool.clone(), Arc::new(ReserveConfigStore::new()));
        for b in 1..=3 {
            ledger.upsert(addr(b), bps_to_wad(9000), 1).await.unwrap();
        }
        pool.set_user_reserves(addr(1), vec![reserve(addr(0xA), 1, true, 0)]);
        pool.set_user_reserves(addr(3), vec![reserve(addr(0xB), 0, false, 1)]);

        let borrowers = selector.identify();
        let snapshots = selector.snapshots(&borrowers).await.unwrap();

        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].borrower, addr(1));
        assert_eq!(snapshots[1].debt.as_slice(), &[addr(0xB)]);
    }

    #[tokio::test]
    async fn test_borrower_state_from_fixtures() {
        let pool = Arc::new(FakePool::new());
        let reserves = Arc::new(ReserveConfigStore::new());
        for (asset, decimals) in [(fixtures::USDT, 6), (fixtures::USDC, 6), (fixtures::WETH, 18)] {
            reserves.insert(asset, ReserveConfig { decimals, liquidation_bonus: 10500, last_update_block: 1 });
        }
        let set_balance = |asset, atoken: u64, debt: u64| {
            pool.set_balance(
                fixtures::BORROWER,
                asset,
                UserReserveBalance { atoken_balance: U256::from(atoken), variable_debt: U256::from(debt) },
            )
        };
        set_balance(fixtures::USDT, fixtures::USDT_BALANCE, 0);
        set_balance(fixtures::USDC, fixtures::USDC_BALANCE, 0);
        set_balance(fixtures::WETH, 0, fixtures::WETH_DEBT);

        let assets = [fixtures::USDT, fixtures::USDC, fixtures::WETH];
        let prices = PriceSnapshot::new(
            &assets,
            &[
                U256::from(fixtures::USDT_PRICE),
                U256::from(fixtures::USDC_PRICE),
                U256::from(fixtures::WETH_PRICE),
            ],
        );
        let snapshot = PositionSnapshot {
            borrower: fixtures::BORROWER,
            collateral: SmallVec::from_slice(&[fixtures::USDT, fixtures::USDC]),
            debt: SmallVec::from_slice(&[fixtures::WETH]),
            can_be_max_liquidated: true,
        };

        let (selector, _) = selector(pool, reserves);
        let states = selector.borrower_states(&[snapshot], &prices).await.unwrap();
        assert_eq!(states, vec![fixtures::borrower_state()]);
    }

    #[tokio::test]
    async fn test_borrower_state_drops_incomplete_assets() {
        let pool = Arc::new(FakePool::new());
        let reserves = Arc::new(ReserveConfigStore::new());
        reserves.insert(fixtures::USDT, ReserveConfig { decimals: 6, liquidation_bonus: 10500, last_update_block: 1 });
        // USDC has no config; WETH has a config but no price
        reserves.insert(fixtures::WETH, ReserveConfig { decimals: 18, liquidation_bonus: 10500, last_update_block: 1 });
        for asset in [fixtures::USDT, fixtures::USDC, fixtures::WETH] {
            pool.set_balance(
                fixtures::BORROWER,
                asset,
                UserReserveBalance { atoken_balance: U256::from(1000), variable_debt: U256::from(1000) },
            );
        }

        let prices = PriceSnapshot::new(
            &[fixtures::USDT, fixtures::USDC],
            &[U256::from(fixtures::USDT_PRICE), U256::from(fixtures::USDC_PRICE)],
        );
        let snapshot = PositionSnapshot {
            borrower: fixtures::BORROWER,
            collateral: SmallVec::from_slice(&[fixtures::USDT, fixtures::USDC]),
            debt: SmallVec::from_slice(&[fixtures::WETH]),
            can_be_max_liquidated: false,
        };

        let (selector, _) = selector(pool, reserves);
        let state = selector.borrower_state(&snapshot, &prices).await.unwrap();
        assert_eq!(state.collateral.len(), 1);
        assert_eq!(state.collateral[0].0, fixtures::USDT);
        assert!(state.debt.is_empty());
    }
}
