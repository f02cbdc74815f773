//! Constant-product pricing.
//!
//! All functions are pure and use checked `U256` arithmetic; `None` means
//! the inputs overflowed or divided by zero.

use alloy::primitives::U256;

/// Fraction of the input kept after the pool fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeRate {
    numerator: u64,
    denominator: u64,
}

impl FeeRate {
    /// 0.3% fee, the Uniswap V2 convention.
    pub const UNISWAP_V2: Self = Self {
        numerator: 997,
        denominator: 1000,
    };

    /// Build a rate keeping `numerator / denominator` of the input.
    /// Requires `0 < numerator <= denominator`.
    pub fn new(numerator: u64, denominator: u64) -> Option<Self> {
        if numerator == 0 || numerator > denominator {
            return None;
        }
        Some(Self {
            numerator,
            denominator,
        })
    }

    pub fn numerator(&self) -> u64 {
        self.numerator
    }

    pub fn denominator(&self) -> u64 {
        self.denominator
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        Self::UNISWAP_V2
    }
}

/// Output for an exact input:
/// `floor(in * num * reserve_out / (reserve_in * den + in * num))`.
#[inline(always)]
pub fn get_amount_out(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
    fee: FeeRate,
) -> Option<U256> {
    let amount_in_with_fee = amount_in.checked_mul(U256::from(fee.numerator))?;
    let numerator = amount_in_with_fee.checked_mul(reserve_out)?;
    let denominator = reserve_in
        .checked_mul(U256::from(fee.denominator))?
        .checked_add(amount_in_with_fee)?;
    numerator.checked_div(denominator)
}

/// Minimum input that yields at least `amount_out`, rounded up.
/// `None` when `amount_out` cannot be drawn from `reserve_out`.
#[inline(always)]
pub fn get_amount_in(
    amount_out: U256,
    reserve_in: U256,
    reserve_out: U256,
    fee: FeeRate,
) -> Option<U256> {
    if amount_out >= reserve_out || reserve_in.is_zero() {
        return None;
    }
    let numerator = reserve_in
        .checked_mul(amount_out)?
        .checked_mul(U256::from(fee.denominator))?;
    let denominator = (reserve_out - amount_out).checked_mul(U256::from(fee.numerator))?;
    (numerator / denominator).checked_add(U256::from(1))
}
