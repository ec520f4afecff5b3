//! Fixed-point U256 arithmetic for liquidation amounts.
//!
//! Everything here is integer math at the token's native scale. Rounding
//! follows the pool's own `PercentageMath`: `percent_mul` / `percent_div`
//! round half up, plain basis-point scaling truncates.

use alloy::primitives::U256;

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Basis points denominator (10000 = 100%)
pub const BPS_DENOMINATOR: U256 = U256::from_limbs([10_000u64, 0, 0, 0]);

/// Half of [`BPS_DENOMINATOR`], used for half-up rounding
pub const HALF_BPS: U256 = U256::from_limbs([5_000u64, 0, 0, 0]);

/// 10^exp as U256.
#[inline]
pub fn pow10(exp: u8) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// `(HALF_BPS + value * bps) / 10000`, rounded half up.
#[inline]
pub fn percent_mul(value: U256, bps: U256) -> U256 {
    (HALF_BPS + value * bps) / BPS_DENOMINATOR
}

/// `(bps / 2 + value * 10000) / bps`, rounded half up. Zero when `bps` is zero.
#[inline]
pub fn percent_div(value: U256, bps: U256) -> U256 {
    if bps.is_zero() {
        return U256::ZERO;
    }
    (bps / U256::from(2u64) + value * BPS_DENOMINATOR) / bps
}

/// `value * bps / 10000`, truncating.
#[inline]
pub fn bps_mul(value: U256, bps: u16) -> U256 {
    value * U256::from(bps) / BPS_DENOMINATOR
}

/// `a * b / denominator`, truncating. Zero when `denominator` is zero.
#[inline]
pub fn mul_div(a: U256, b: U256, denominator: U256) -> U256 {
    if denominator.is_zero() {
        return U256::ZERO;
    }
    a * b / denominator
}

/// Convert a basis-point ratio into an 18-decimal fixed-point value.
///
/// Example: `bps_to_wad(9500)` = 0.95e18
#[inline]
pub const fn bps_to_wad(bps: u16) -> U256 {
    U256::from_limbs([bps as u64 * 100_000_000_000_000u64, 0, 0, 0])
}
