//! Liquidation amount arithmetic.
//!
//! The debt to cover is capped by the close factor and the seized collateral
//! carries the liquidation bonus. When the borrower lacks enough collateral,
//! the seized amount is capped at the balance and the debt to cover is
//! recomputed from it. Integer math only; rounding is part of the result.

use alloy::primitives::{Address, U256};

use crate::position::{CollateralData, DebtData};
use crate::u256_math::{bps_mul, mul_div, percent_div, percent_mul, pow10, WAD};

/// Amounts for one (collateral, debt) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationAmounts {
    /// Debt asset amount to repay
    pub debt_to_cover: U256,
    /// Collateral asset amount seized, bonus included
    pub collateral_to_liquidate: U256,
    /// `collateral_to_liquidate` in native asset units
    pub value_native: U256,
}

/// Collateral matching `debt_to_cover` at oracle prices, bonus excluded:
/// `debt_price * debt_to_cover * 10^cdec / (collateral_price * 10^ddec)`.
pub fn base_collateral_amount(collateral: &CollateralData, debt: &DebtData, debt_to_cover: U256) -> U256 {
    mul_div(
        debt.price * debt_to_cover,
        pow10(collateral.decimals),
        collateral.price * pow10(debt.decimals),
    )
}

/// Prices liquidation pairs for one pass.
#[derive(Debug, Clone, Copy)]
pub struct LiquidationPricer {
    native_asset: Address,
    native_price: U256,
    close_factor_bps: u16,
    max_close_factor_bps: u16,
}

impl LiquidationPricer {
    pub fn new(
        native_asset: Address,
        native_price: U256,
        close_factor_bps: u16,
        max_close_factor_bps: u16,
    ) -> Self {
        Self { native_asset, native_price, close_factor_bps, max_close_factor_bps }
    }

    /// Debt coverable in one liquidation.
    pub fn debt_to_cover(&self, debt: &DebtData, can_be_max_liquidated: bool) -> U256 {
        let factor = if can_be_max_liquidated { self.max_close_factor_bps } else { self.close_factor_bps };
        bps_mul(debt.amount, factor)
    }

    /// Full amount computation for a pair.
    pub fn amounts(
        &self,
        collateral_asset: Address,
        collateral: &CollateralData,
        debt: &DebtData,
        can_be_max_liquidated: bool,
    ) -> LiquidationAmounts {
        let mut debt_to_cover = self.debt_to_cover(debt, can_be_max_liquidated);
        let bonus = U256::from(collateral.liquidation_bonus);

        let base_collateral = base_collateral_amount(collateral, debt, debt_to_cover);
        let mut collateral_to_liquidate = percent_mul(base_collateral, bonus);

        if collateral_to_liquidate > collateral.balance {
            collateral_to_liquidate = collateral.balance;
            debt_to_cover = mul_div(
                collateral.price * collateral_to_liquidate,
                pow10(debt.decimals),
                percent_div(debt.price * pow10(collateral.decimals), bonus),
            );
        }

        LiquidationAmounts {
            debt_to_cover,
            collateral_to_liquidate,
            value_native: self.to_native(collateral_asset, collateral, collateral_to_liquidate),
        }
    }

    /// Convert a collateral amount into native asset units.
    pub fn to_native(&self, collateral_asset: Address, collateral: &CollateralData, amount: U256) -> U256 {
        if collateral_asset == self.native_asset {
            return amount;
        }
        mul_div(
            amount * collateral.price,
            WAD,
            self.native_price * pow10(collateral.decimals),
        )
    }
}
