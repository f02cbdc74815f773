//! In-memory reference implementations of the collaborator traits.
//!
//! - [`LendingMarket`]: single-debt-asset market with two collateral classes
//! - [`FlashPool`]: ERC-3156-style lender charging a basis-point fee
//! - [`ConstantProductPair`]: Uniswap-V2-style pair with a post-swap K check
//!
//! All state lives in the [`World`](crate::World); the structs only carry
//! immutable parameters, so they can be shared as `Arc<dyn Trait>`.

mod flash_pool;
mod lending_market;
mod pair;

pub use flash_pool::FlashPool;
pub use lending_market::LendingMarket;
pub use pair::ConstantProductPair;

use alloy::primitives::U256;

/// Basis points denominator (10000 = 100%)
pub const BPS_DENOMINATOR: u64 = 10_000;

/// `amount * bps / 10000`, rounded down. `None` on overflow.
#[inline]
pub fn bps_of(amount: U256, bps: u16) -> Option<U256> {
    amount
        .checked_mul(U256::from(bps))
        .map(|v| v / U256::from(BPS_DENOMINATOR))
}
