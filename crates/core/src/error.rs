//! Error taxonomy of the unwinder.
//!
//! Every error is fatal to the current atomic unit: the ledger rolls back
//! and the error is surfaced to the caller as the failure reason. Nothing
//! is retried internally.

use alloy::primitives::{Address, U256};
use thiserror::Error;
use unwinder_chain::ChainError;

/// Failure while quoting or executing a swap.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("asset {asset} is not traded by pool {pool}")]
    PoolAssetMismatch { pool: Address, asset: Address },

    #[error("pool {pool} has empty reserves")]
    EmptyReserves { pool: Address },

    #[error("swapping {amount_in} through pool {pool} rounds to zero output")]
    ZeroOutput { pool: Address, amount_in: U256 },

    #[error("arithmetic overflow in swap math")]
    ArithmeticOverflow,

    #[error("pool {pool} rejected swap: {source}")]
    Pool {
        pool: Address,
        #[source]
        source: ChainError,
    },
}

/// Failure of an unwinder entry point.
#[derive(Debug, Error)]
pub enum UnwindError {
    // Authorization
    #[error("wallet owner already initialized")]
    AlreadyInitialized,

    #[error("caller {caller} is not the wallet owner")]
    Unauthorized { caller: Address },

    #[error("caller {caller} is not the configured flash lender")]
    UnauthorizedLender { caller: Address },

    // Request validation
    #[error("requested loan {requested} exceeds lender limit {max}")]
    LoanTooLarge { requested: U256, max: U256 },

    #[error("flash lender rejected the loan request: {0}")]
    LoanRequestRejected(#[source] ChainError),

    #[error("callback context mismatch: {0}")]
    CallbackContextMismatch(String),

    #[error("unsupported loan asset {0}")]
    UnsupportedAsset(Address),

    #[error("nothing to unwind: borrow amount is zero")]
    NothingToUnwind,

    // Execution
    #[error("debt repayment failed: {0}")]
    RepaymentFailed(#[source] ChainError),

    #[error("collateral reclamation failed: {0}")]
    ReclaimFailed(#[source] ChainError),

    #[error("collateral conversion failed: {0}")]
    ConversionFailed(#[from] RouteError),

    #[error("loan settlement failed: {0}")]
    SettlementFailed(#[source] ChainError),

    // Policy
    #[error("insufficient profit: final balance {final_balance}, owed {amount_owed}, min profit {min_profit}")]
    InsufficientProfit {
        final_balance: U256,
        amount_owed: U256,
        min_profit: U256,
    },

    // Construction
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Broad class of an [`UnwindError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Caller or origin mismatch
    Authorization,
    /// Malformed or inconsistent invocation
    RequestValidation,
    /// An external collaborator refused a required step
    Execution,
    /// AMM preconditions unmet
    Routing,
    /// Outcome failed the minimum-surplus bar
    Policy,
    /// Construction-time binding error
    Configuration,
}

impl UnwindError {
    /// Classify the error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::AlreadyInitialized
            | Self::Unauthorized { .. }
            | Self::UnauthorizedLender { .. } => ErrorClass::Authorization,
            Self::LoanTooLarge { .. }
            | Self::LoanRequestRejected(_)
            | Self::CallbackContextMismatch(_)
            | Self::UnsupportedAsset(_)
            | Self::NothingToUnwind => ErrorClass::RequestValidation,
            Self::RepaymentFailed(_) | Self::ReclaimFailed(_) | Self::SettlementFailed(_) => {
                ErrorClass::Execution
            }
            Self::ConversionFailed(RouteError::Pool { .. }) => ErrorClass::Execution,
            Self::ConversionFailed(_) => ErrorClass::Routing,
            Self::InsufficientProfit { .. } => ErrorClass::Policy,
            Self::Config(_) => ErrorClass::Configuration,
        }
    }

    /// The routing error behind a failed conversion, if any.
    pub fn route_error(&self) -> Option<&RouteError> {
        match self {
            Self::ConversionFailed(err) => Some(err),
            _ => None,
        }
    }
}
