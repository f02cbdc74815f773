//! Collaborator interfaces consumed by the unwinder.
//!
//! Each trait mirrors the on-chain surface of one external protocol. The
//! ledger is passed explicitly: reads take `&World`, anything that can move
//! funds takes `&mut World` plus the address of the calling contract.
//!
//! # Call flow
//!
//! ```text
//! Unwinder ──issue──► FlashLender ──on_funds_received──► Unwinder (FlashBorrower)
//!                          ▲                                  │ repay / reclaim ──► LendingProtocol
//!                          │                                  │ swap ─────────────► AmmPool ×2
//!                          └──────── pulls amount + fee ◄─────┘
//! ```
//!
//! The callback is a synchronous re-entry on the same call stack, so the
//! whole flow runs inside one [`World::atomic`] unit.

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use std::fmt::Debug;

use crate::error::ChainError;
use crate::world::World;

/// Acknowledgement a borrower must return from its callback
/// (`keccak256("ERC3156FlashBorrower.onFlashLoan")`).
pub fn callback_success() -> B256 {
    keccak256("ERC3156FlashBorrower.onFlashLoan")
}

/// Receiver of a flash loan.
pub trait FlashBorrower {
    /// Address funds are sent to and pulled back from.
    fn address(&self) -> Address;

    /// Called by the lender after `amount` of `token` has been transferred.
    ///
    /// `caller` is the lender, `initiator` is whoever the lender reports as
    /// having requested the loan. Must return [`callback_success`] for the
    /// loan to settle.
    #[allow(clippy::too_many_arguments)]
    fn on_funds_received(
        &self,
        world: &mut World,
        caller: Address,
        initiator: Address,
        token: Address,
        amount: U256,
        fee: U256,
        context: &Bytes,
    ) -> Result<B256, ChainError>;
}

/// Flash lender (ERC-3156 style).
pub trait FlashLender: Send + Sync + Debug {
    /// Lender contract address.
    fn address(&self) -> Address;

    /// Maximum amount of `asset` that can currently be borrowed.
    fn max_loan(&self, world: &World, asset: Address) -> U256;

    /// Fee charged for borrowing `amount` of `asset`.
    fn fee_for(&self, world: &World, asset: Address, amount: U256) -> Result<U256, ChainError>;

    /// Lend `amount` of `asset` to `receiver`, invoke its callback with
    /// `context`, then collect `amount + fee`.
    ///
    /// Errors raised by the callback come back as [`ChainError::Callback`].
    fn issue(
        &self,
        world: &mut World,
        caller: Address,
        receiver: &dyn FlashBorrower,
        asset: Address,
        amount: U256,
        context: Bytes,
    ) -> Result<bool, ChainError>;
}

/// The two collateral classes a lending position can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollateralAssets {
    /// Volatile collateral, converted back into the debt asset
    pub primary: Address,
    /// Secondary collateral, returned to the owner as-is
    pub secondary: Address,
}

/// Lending protocol holding the position being unwound.
pub trait LendingProtocol: Send + Sync + Debug {
    /// Market contract address.
    fn address(&self) -> Address;

    /// Asset debt is denominated in.
    fn debt_asset(&self) -> Address;

    /// Collateral classes accepted by the market.
    fn collateral_assets(&self) -> CollateralAssets;

    /// Outstanding debt of `account`.
    fn total_debt_of(&self, world: &World, account: Address) -> U256;

    /// Collateral of `asset` pledged by `account`.
    fn collateral_of(&self, world: &World, account: Address, asset: Address) -> U256;

    /// Repay `amount` of `caller`'s debt, pulling `asset` from `caller`
    /// through its allowance.
    fn repay(
        &self,
        world: &mut World,
        caller: Address,
        asset: Address,
        amount: U256,
    ) -> Result<(), ChainError>;

    /// Return every pledged collateral class to `caller`.
    fn reclaim_all_collateral(&self, world: &mut World, caller: Address) -> Result<(), ChainError>;
}

/// Two-asset pooled-liquidity exchange.
pub trait AmmPool: Send + Sync + Debug {
    /// Pool contract address.
    fn address(&self) -> Address;

    /// The pool's two assets, in the pool's own order.
    fn assets(&self) -> (Address, Address);

    /// Live reserves, in the same order as [`AmmPool::assets`].
    fn reserves(&self, world: &World) -> (U256, U256);

    /// Send `out_a` / `out_b` to `recipient`. Input must already have been
    /// transferred to the pool.
    fn swap(
        &self,
        world: &mut World,
        caller: Address,
        out_a: U256,
        out_b: U256,
        recipient: Address,
    ) -> Result<(), ChainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::b256;

    #[test]
    fn test_callback_success_value() {
        assert_eq!(
            callback_success(),
            b256!("439148f0bbc682ca079e46d6e2c2f0c1e3b820f1a291b069d8882abf8cf18dd9")
        );
    }
}
