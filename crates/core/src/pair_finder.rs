//! Optimal (collateral, debt) pair selection.

use alloy::primitives::{Address, U256};
use tracing::{debug, trace};

use crate::position::BorrowerState;
use crate::pricer::LiquidationPricer;

/// The chosen liquidation for one borrower.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationCandidate {
    pub borrower: Address,
    pub collateral_asset: Address,
    pub debt_asset: Address,
    /// Collateral seized, in collateral asset units
    pub collateral_to_liquidate: U256,
    /// Debt repaid, in debt asset units
    pub debt_to_cover: U256,
    /// Seized collateral in native asset units, used for ranking
    pub value_native: U256,
}

/// Score every (collateral, debt) pair and keep the most valuable one.
///
/// Iterates collateral-major; only a strictly greater value replaces the
/// current best, so ties keep the first pair and zero-value pairs never win.
pub fn find_optimal_pair(state: &BorrowerState, pricer: &LiquidationPricer) -> Option<LiquidationCandidate> {
    let mut best: Option<LiquidationCandidate> = None;
    let mut best_value = U256::ZERO;

    for (collateral_asset, collateral) in &state.collateral {
        for (debt_asset, debt) in &state.debt {
            let amounts = pricer.amounts(*collateral_asset, collateral, debt, state.can_be_max_liquidated);
            trace!(
                borrower = %state.borrower,
                collateral = %collateral_asset,
                debt = %debt_asset,
                value = %amounts.value_native,
                "Scored pair"
            );

            if amounts.value_native > best_value {
                best_value = amounts.value_native;
                best = Some(LiquidationCandidate {
                    borrower: state.borrower,
                    collateral_asset: *collateral_asset,
                    debt_asset: *debt_asset,
                    collateral_to_liquidate: amounts.collateral_to_liquidate,
                    debt_to_cover: amounts.debt_to_cover,
                    value_native: amounts.value_native,
                });
            }
        }
    }

    best
}

/// Best pair per borrower, in input order. Borrowers without a pair are dropped.
pub fn find_optimal_pairs(states: &[BorrowerState], pricer: &LiquidationPricer) -> Vec<LiquidationCandidate> {
    states
        .iter()
        .filter_map(|state| {
            let candidate = find_optimal_pair(state, pricer);
            if candidate.is_none() {
                debug!(
                    borrower = %state.borrower,
                    collateral = state.collateral.len(),
                    debt = state.debt.len(),
                    "No liquidatable pair"
                );
            }
            candidate
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{CollateralData, DebtData};
    use crate::testing::fixtures;
    use crate::u256_math::WAD;
    use smallvec::smallvec;

    fn pricer() -> LiquidationPricer {
        LiquidationPricer::new(fixtures::WETH, U256::from(fixtures::WETH_PRICE), 5000, 10000)
    }

    #[test]
    fn test_optimal_pair_beats_every_other_pair() {
        let state = fixtures::borrower_state();
        let pricer = pricer();
        let best = find_optimal_pair(&state, &pricer).unwrap();

        for (collateral_asset, collateral) in &state.collateral {
            for (_, debt) in &state.debt {
                let value = pricer
                    .amounts(*collateral_asset, collateral, debt, state.can_be_max_liquidated)
                    .value_native;
                assert!(best.value_native >= value);
            }
        }

        // The USDT position is the larger collateral
        assert_eq!(best.collateral_asset, fixtures::USDT);
        assert_eq!(best.debt_asset, fixtures::WETH);
        assert_eq!(best.borrower, fixtures::BORROWER);
    }

    #[test]
    fn test_ties_keep_first_pair() {
        let a = Address::repeat_byte(0xA1);
        let b = Address::repeat_byte(0xB2);
        let collateral = fixtures::usdc_collateral();
        let state = BorrowerState {
            borrower: fixtures::BORROWER,
            collateral: smallvec![(a, collateral), (b, collateral)],
            debt: smallvec![(fixtures::WETH, fixtures::weth_debt())],
            can_be_max_liquidated: true,
        };

        let best = find_optimal_pair(&state, &pricer()).unwrap();
        assert_eq!(best.collateral_asset, a);
    }

    #[test]
    fn test_best_pair_across_collateral_and_debt_assets() {
        let c = |balance: u64| CollateralData {
            decimals: 18,
            liquidation_bonus: 10000,
            price: U256::from(100_000_000u64),
            balance: U256::from(balance) * WAD,
        };
        let d = |amount: u64| DebtData {
            decimals: 18,
            price: U256::from(100_000_000u64),
            amount: U256::from(amount) * WAD,
        };
        let asset = Address::repeat_byte;
        let mut state = BorrowerState {
            borrower: fixtures::BORROWER,
            collateral: smallvec![(asset(0xC1), c(100)), (asset(0xC2), c(1000)), (asset(0xC3), c(50))],
            debt: smallvec![(asset(0xD1), d(10)), (asset(0xD2), d(500)), (asset(0xD3), d(20))],
            can_be_max_liquidated: true,
        };
        // Native asset priced like the reserves, so value equals the seized amount
        let pricer = LiquidationPricer::new(asset(0xEE), U256::from(100_000_000u64), 5000, 10000);

        let best = find_optimal_pair(&state, &pricer).unwrap();
        assert_eq!((best.collateral_asset, best.debt_asset), (asset(0xC2), asset(0xD2)));
        assert_eq!(best.value_native, U256::from(500u64) * WAD);
        assert_eq!(best.debt_to_cover, U256::from(500u64) * WAD);

        // An equal debt visited later does not replace the best pair
        state.debt.push((asset(0xD4), d(500)));
        let best = find_optimal_pair(&state, &pricer).unwrap();
        assert_eq!(best.debt_asset, asset(0xD2));
    }

    #[test]
    fn test_empty_sides_yield_no_candidate() {
        let mut no_debt = fixtures::borrower_state();
        no_debt.debt.clear();
        let mut no_collateral = fixtures::borrower_state();
        no_collateral.collateral.clear();

        let pricer = pricer();
        assert!(find_optimal_pair(&no_debt, &pricer).is_none());
        assert!(find_optimal_pair(&no_collateral, &pricer).is_none());

        let pairs = find_optimal_pairs(&[no_debt, fixtures::borrower_state(), no_collateral], &pricer);
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn test_zero_value_pairs_never_chosen() {
        let mut state = fixtures::borrower_state();
        for (_, collateral) in state.collateral.iter_mut() {
            collateral.balance = U256::ZERO;
        }
        assert!(find_optimal_pair(&state, &pricer()).is_none());
    }
}
