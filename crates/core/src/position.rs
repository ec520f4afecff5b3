//! Per-pass position data structures.
//!
//! Nothing here outlives a liquidation pass.

use alloy::primitives::{Address, U256};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Collateral position data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollateralData {
    /// Token decimals
    pub decimals: u8,
    /// Liquidation bonus (basis points, e.g., 10500 = 5% bonus)
    pub liquidation_bonus: u16,
    /// Oracle price (8 decimals)
    pub price: U256,
    /// Current aToken balance (token decimals)
    pub balance: U256,
}

/// Debt position data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebtData {
    /// Token decimals
    pub decimals: u8,
    /// Oracle price (8 decimals)
    pub price: U256,
    /// Current variable debt (token decimals)
    pub amount: U256,
}

/// Collateral and debt asset sets of a liquidatable borrower.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionSnapshot {
    pub borrower: Address,
    /// Reserves used as collateral with a non-zero balance
    pub collateral: SmallVec<[Address; 4]>,
    /// Reserves with non-zero variable debt
    pub debt: SmallVec<[Address; 4]>,
    /// Whether the whole debt may be covered in one liquidation
    pub can_be_max_liquidated: bool,
}

impl PositionSnapshot {
    /// Collateral assets followed by debt assets not already listed.
    pub fn assets(&self) -> Vec<Address> {
        let mut assets: Vec<Address> = self.collateral.to_vec();
        for asset in &self.debt {
            if !assets.contains(asset) {
                assets.push(*asset);
            }
        }
        assets
    }
}

/// Fully priced position of a borrower, ready for pair selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowerState {
    pub borrower: Address,
    pub collateral: SmallVec<[(Address, CollateralData); 4]>,
    pub debt: SmallVec<[(Address, DebtData); 4]>,
    pub can_be_max_liquidated: bool,
}

/// Oracle prices read once per pass.
#[derive(Debug, Clone, Default)]
pub struct PriceSnapshot {
    prices: HashMap<Address, U256>,
}

impl PriceSnapshot {
    /// Pair `assets` with `prices` positionally.
    pub fn new(assets: &[Address], prices: &[U256]) -> Self {
        Self {
            prices: assets.iter().copied().zip(prices.iter().copied()).collect(),
        }
    }

    /// Price of `asset`; a zero price counts as missing.
    pub fn get(&self, asset: &Address) -> Option<U256> {
        self.prices.get(asset).copied().filter(|p| !p.is_zero())
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}
