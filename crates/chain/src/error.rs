//! Revert reasons surfaced by the ledger and the in-memory collaborators.

use alloy::primitives::{Address, U256};
use thiserror::Error;

/// Boxed error carried back out of a borrower callback.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failed call against the ledger or one of the protocols living on it.
///
/// Any `ChainError` returned from inside [`World::atomic`](crate::World::atomic)
/// discards every write made by that unit.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("insufficient balance of {token} for {holder}: have {available}, need {required}")]
    InsufficientBalance {
        token: Address,
        holder: Address,
        available: U256,
        required: U256,
    },

    #[error("insufficient allowance of {token} from {owner} to {spender}: have {available}, need {required}")]
    InsufficientAllowance {
        token: Address,
        owner: Address,
        spender: Address,
        available: U256,
        required: U256,
    },

    #[error("insufficient liquidity of {asset}: have {available}, requested {requested}")]
    InsufficientLiquidity {
        asset: Address,
        available: U256,
        requested: U256,
    },

    #[error("unsupported asset {0}")]
    UnsupportedAsset(Address),

    #[error("arithmetic overflow")]
    Overflow,

    #[error("constant-product invariant violated")]
    KInvariant,

    #[error("execution reverted: {0}")]
    Reverted(String),

    /// Error raised by a flash borrower inside its callback, propagated
    /// unchanged through the lender.
    #[error("borrower callback failed: {0}")]
    Callback(#[source] CallbackError),
}

impl ChainError {
    /// Shorthand for a plain revert with a reason string.
    pub fn revert(reason: impl Into<String>) -> Self {
        Self::Reverted(reason.into())
    }
}
