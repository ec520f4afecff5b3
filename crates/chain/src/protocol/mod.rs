//! Protocol abstraction layer.
//!
//! The engine talks to the lending pool only through the traits defined here:
//!
//! - [`PoolReader`]: single and batched reads (health factors, reserves, prices, positions)
//! - [`LiquidationSubmitter`]: submission of a single liquidation action
//!
//! Batched reads return one slot per requested item, in request order. A `None`
//! slot means that item's sub-call failed and should be skipped, not that the
//! whole batch failed.
//!
//! # Example
//!
//! ```rust,ignore
//! use liquidator_chain::protocol::PoolReader;
//!
//! let protocol = AaveV3Protocol::connect(config).await?;
//! let factors = protocol.health_factors(&borrowers).await?;
//! for (borrower, hf) in borrowers.iter().zip(factors) {
//!     // hf is None when the sub-call reverted
//! }
//! ```

mod aave_v3;
mod events;

pub use aave_v3::{AaveV3Config, AaveV3Protocol};
pub use events::{PoolEvent, PoolEventKind, ProtocolEventSignatures};

use alloy::primitives::{Address, B256, U256};
use anyhow::Result;
use async_trait::async_trait;

/// Static configuration of a reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveConfiguration {
    /// Reserve asset address
    pub asset: Address,
    /// Token decimals
    pub decimals: u8,
    /// Liquidation bonus (basis points, e.g., 10500 = 5% bonus)
    pub liquidation_bonus: u16,
}

/// One entry of a user's reserves snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserReserve {
    pub asset: Address,
    pub scaled_atoken_balance: U256,
    pub usage_as_collateral_enabled: bool,
    pub scaled_variable_debt: U256,
}

/// Current (unscaled) balances of a user in one reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserReserveBalance {
    /// aToken balance (collateral side)
    pub atoken_balance: U256,
    /// Variable debt token balance
    pub variable_debt: U256,
}

/// A Borrow log seen in a historical range query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorrowLog {
    /// Beneficiary of the borrow (`onBehalfOf`)
    pub on_behalf_of: Address,
    pub block_number: u64,
}

/// Parameters for a liquidation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationCallParams {
    /// User to liquidate
    pub user: Address,
    /// Collateral asset to seize
    pub collateral_asset: Address,
    /// Debt asset to repay
    pub debt_asset: Address,
    /// Amount of debt to cover
    pub debt_to_cover: U256,
}

/// Read access to a lending pool.
#[async_trait]
pub trait PoolReader: Send + Sync {
    /// Latest block number.
    async fn block_number(&self) -> Result<u64>;

    /// Health factor of a single account (18-decimal fixed point).
    async fn health_factor(&self, user: Address) -> Result<U256>;

    /// Health factors of many accounts in one batch.
    async fn health_factors(&self, users: &[Address]) -> Result<Vec<Option<U256>>>;

    /// Borrow logs in the closed block range `[from_block, to_block]`.
    async fn borrow_logs(&self, from_block: u64, to_block: u64) -> Result<Vec<BorrowLog>>;

    /// All reserve assets listed on the pool.
    async fn reserve_list(&self) -> Result<Vec<Address>>;

    /// Configuration of many reserves in one batch.
    async fn reserve_configurations(
        &self,
        assets: &[Address],
    ) -> Result<Vec<Option<ReserveConfiguration>>>;

    /// Oracle prices for `assets`, in request order.
    async fn asset_prices(&self, assets: &[Address]) -> Result<Vec<U256>>;

    /// Reserves snapshot of many users in one batch.
    async fn user_reserves(&self, users: &[Address]) -> Result<Vec<Option<Vec<UserReserve>>>>;

    /// Current balances of one user across `assets` in one batch.
    async fn user_reserve_balances(
        &self,
        user: Address,
        assets: &[Address],
    ) -> Result<Vec<Option<UserReserveBalance>>>;
}

/// Capability to submit a liquidation on-chain.
#[async_trait]
pub trait LiquidationSubmitter: Send + Sync {
    /// Submit the liquidation and wait for it to be mined.
    /// Returns the transaction hash; reverts and RPC errors are `Err`.
    async fn submit(&self, params: &LiquidationCallParams) -> Result<B256>;
}
