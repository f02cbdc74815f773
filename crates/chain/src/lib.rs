//! Execution substrate for the position unwinder.
//!
//! This crate provides:
//! - A journaled in-memory ledger with all-or-nothing units ([`World`])
//! - A shared handle serialising units across threads ([`Chain`])
//! - ERC20-style token operations ([`token`])
//! - Collaborator traits for flash lenders, lending protocols and AMM pools
//! - In-memory reference collaborators ([`protocol`])
//! - Genesis loading from TOML ([`Genesis`])

mod contracts;
mod error;
mod genesis;
pub mod parse;
pub mod protocol;
pub mod token;
mod world;

pub use contracts::{
    callback_success, AmmPool, CollateralAssets, FlashBorrower, FlashLender, LendingProtocol,
};
pub use error::{CallbackError, ChainError};
pub use genesis::{
    BalanceSpec, Deployed, Genesis, LenderSpec, LiquiditySpec, MarketSpec, PoolSpec, PositionSpec,
};
pub use protocol::{ConstantProductPair, FlashPool, LendingMarket};
pub use world::{Chain, Checkpoint, StateKey, World};
