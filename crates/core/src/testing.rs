//! In-memory fakes for the chain and storage seams.

use alloy::primitives::{Address, B256, U256};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use liquidator_chain::{
    BorrowLog, LiquidationCallParams, LiquidationSubmitter, PoolReader, ReserveConfiguration, UserReserve,
    UserReserveBalance,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::StoreError;
use crate::ledger::BorrowerRecord;
use crate::store::BorrowerStore;

/// Store kept in memory; saves can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    borrowers: Mutex<BTreeMap<Address, BorrowerRecord>>,
    cursor: Mutex<Option<u64>>,
    fail: AtomicBool,
    saves: AtomicUsize,
    save_delay: Mutex<Duration>,
}

impl MemoryStore {
    pub fn borrowers(&self) -> BTreeMap<Address, BorrowerRecord> {
        self.borrowers.lock().clone()
    }

    pub fn cursor(&self) -> Option<u64> {
        *self.cursor.lock()
    }

    /// Number of successful ledger saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Make every ledger save block its thread, like a slow disk.
    pub fn delay_saves(&self, delay: Duration) {
        *self.save_delay.lock() = delay;
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: PathBuf::from("memory"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        Ok(())
    }
}

impl BorrowerStore for MemoryStore {
    fn load_borrowers(&self) -> Result<BTreeMap<Address, BorrowerRecord>, StoreError> {
        Ok(self.borrowers())
    }

    fn save_borrowers(&self, borrowers: &BTreeMap<Address, BorrowerRecord>) -> Result<(), StoreError> {
        let delay = *self.save_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.check()?;
        *self.borrowers.lock() = borrowers.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load_block_cursor(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.cursor())
    }

    fn save_block_cursor(&self, block: u64) -> Result<(), StoreError> {
        self.check()?;
        *self.cursor.lock() = Some(block);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PoolState {
    block: u64,
    health_factors: HashMap<Address, U256>,
    borrow_logs: Vec<BorrowLog>,
    reserves: Vec<Address>,
    configs: HashMap<Address, ReserveConfiguration>,
    prices: HashMap<Address, U256>,
    user_reserves: HashMap<Address, Vec<UserReserve>>,
    balances: HashMap<(Address, Address), UserReserveBalance>,
    health_factor_batches: Vec<usize>,
    fail_reads: bool,
}

/// Scriptable pool. Unknown items come back as `None` slots in batches.
#[derive(Debug, Default)]
pub struct FakePool {
    state: Mutex<PoolState>,
}

impl FakePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_block(&self, block: u64) {
        self.state.lock().block = block;
    }

    pub fn set_health_factor(&self, user: Address, health_factor: U256) {
        self.state.lock().health_factors.insert(user, health_factor);
    }

    pub fn add_borrow_log(&self, on_behalf_of: Address, block_number: u64) {
        self.state.lock().borrow_logs.push(BorrowLog { on_behalf_of, block_number });
    }

    pub fn add_reserve(&self, config: ReserveConfiguration) {
        let mut state = self.state.lock();
        state.reserves.push(config.asset);
        state.configs.insert(config.asset, config);
    }

    /// List a reserve whose configuration read fails.
    pub fn list_reserve_without_config(&self, asset: Address) {
        self.state.lock().reserves.push(asset);
    }

    pub fn set_price(&self, asset: Address, price: U256) {
        self.state.lock().prices.insert(asset, price);
    }

    pub fn set_user_reserves(&self, user: Address, reserves: Vec<UserReserve>) {
        self.state.lock().user_reserves.insert(user, reserves);
    }

    pub fn set_balance(&self, user: Address, asset: Address, balance: UserReserveBalance) {
        self.state.lock().balances.insert((user, asset), balance);
    }

    /// Make every read fail as a whole.
    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    /// Sizes of the batched health factor reads, in call order.
    pub fn health_factor_batches(&self) -> Vec<usize> {
        self.state.lock().health_factor_batches.clone()
    }

    fn guard(&self) -> Result<parking_lot::MutexGuard<'_, PoolState>> {
        let state = self.state.lock();
        if state.fail_reads {
            bail!("rpc unavailable");
        }
        Ok(state)
    }
}

#[async_trait]
impl PoolReader for FakePool {
    async fn block_number(&self) -> Result<u64> {
        Ok(self.guard()?.block)
    }

    async fn health_factor(&self, user: Address) -> Result<U256> {
        self.guard()?
            .health_factors
            .get(&user)
            .copied()
            .ok_or_else(|| anyhow!("getUserAccountData reverted for {user}"))
    }

    async fn health_factors(&self, users: &[Address]) -> Result<Vec<Option<U256>>> {
        let mut state = self.guard()?;
        state.health_factor_batches.push(users.len());
        Ok(users.iter().map(|u| state.health_factors.get(u).copied()).collect())
    }

    async fn borrow_logs(&self, from_block: u64, to_block: u64) -> Result<Vec<BorrowLog>> {
        Ok(self
            .guard()?
            .borrow_logs
            .iter()
            .filter(|log| log.block_number >= from_block && log.block_number <= to_block)
            .copied()
            .collect())
    }

    async fn reserve_list(&self) -> Result<Vec<Address>> {
        Ok(self.guard()?.reserves.clone())
    }

    async fn reserve_configurations(&self, assets: &[Address]) -> Result<Vec<Option<ReserveConfiguration>>> {
        let state = self.guard()?;
        Ok(assets.iter().map(|a| state.configs.get(a).copied()).collect())
    }

    async fn asset_prices(&self, assets: &[Address]) -> Result<Vec<U256>> {
        let state = self.guard()?;
        Ok(assets
            .iter()
            .map(|a| state.prices.get(a).copied().unwrap_or(U256::ZERO))
            .collect())
    }

    async fn user_reserves(&self, users: &[Address]) -> Result<Vec<Option<Vec<UserReserve>>>> {
        let state = self.guard()?;
        Ok(users.iter().map(|u| state.user_reserves.get(u).cloned()).collect())
    }

    async fn user_reserve_balances(
        &self,
        user: Address,
        assets: &[Address],
    ) -> Result<Vec<Option<UserReserveBalance>>> {
        let state = self.guard()?;
        Ok(assets.iter().map(|a| state.balances.get(&(user, *a)).copied()).collect())
    }
}

/// Submitter that records every call.
#[derive(Debug, Default)]
pub struct RecordingSubmitter {
    submitted: Mutex<Vec<LiquidationCallParams>>,
    failing: Mutex<HashSet<Address>>,
}

impl RecordingSubmitter {
    /// Make submissions for `user` revert.
    pub fn fail_for(&self, user: Address) {
        self.failing.lock().insert(user);
    }

    pub fn submitted(&self) -> Vec<LiquidationCallParams> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl LiquidationSubmitter for RecordingSubmitter {
    async fn submit(&self, params: &LiquidationCallParams) -> Result<B256> {
        let mut submitted = self.submitted.lock();
        submitted.push(params.clone());
        if self.failing.lock().contains(&params.user) {
            bail!("execution reverted");
        }
        Ok(B256::with_last_byte(submitted.len() as u8))
    }
}

/// Arbitrum mainnet position used across tests.
pub mod fixtures {
    use alloy::primitives::{address, Address, U256};
    use smallvec::smallvec;

    use crate::position::{BorrowerState, CollateralData, DebtData};

    pub const BORROWER: Address = address!("782dF99676f014b6fD6000626073c78DbA205D2E");
    pub const USDT: Address = address!("Fd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9");
    pub const USDC: Address = address!("af88d065e77c8cC2239327C5EDb3A432268e5831");
    pub const WETH: Address = address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1");

    pub const WETH_PRICE: u64 = 321_443_000_000;
    pub const USDT_PRICE: u64 = 99_986_000;
    pub const USDC_PRICE: u64 = 99_996_893;

    pub const USDT_BALANCE: u64 = 976_395_252;
    pub const USDC_BALANCE: u64 = 50_727_847;
    pub const WETH_DEBT: u64 = 240_009_265_489_591_162;

    pub fn usdt_collateral() -> CollateralData {
        CollateralData {
            decimals: 6,
            liquidation_bonus: 10500,
            price: U256::from(USDT_PRICE),
            balance: U256::from(USDT_BALANCE),
        }
    }

    pub fn usdc_collateral() -> CollateralData {
        CollateralData {
            decimals: 6,
            liquidation_bonus: 10500,
            price: U256::from(USDC_PRICE),
            balance: U256::from(USDC_BALANCE),
        }
    }

    pub fn weth_debt() -> DebtData {
        DebtData {
            decimals: 18,
            price: U256::from(WETH_PRICE),
            amount: U256::from(WETH_DEBT),
        }
    }

    pub fn borrower_state() -> BorrowerState {
        BorrowerState {
            borrower: BORROWER,
            collateral: smallvec![(USDT, usdt_collateral()), (USDC, usdc_collateral())],
            debt: smallvec![(WETH, weth_debt())],
            can_be_max_liquidated: true,
        }
    }
}
