//! Position unwinder core logic.
//!
//! This crate provides the flash-loan unwind of a lending position:
//! - Owner binding and lender-origin guards
//! - Constant-product pricing and two-hop swap routing
//! - Minimum-surplus profitability check
//! - Lending protocol adapter (repay, reclaim)
//! - Loan request context codec
//! - The orchestrator driving the atomic sequence
//! - Deployment configuration loading

pub mod amm;
mod auth;
pub mod config;
mod context;
mod error;
mod lending;
mod orchestrator;
pub mod profit;

pub use amm::{FeeRate, SwapQuote, SwapRouter};
pub use auth::{AuthorizationGate, InitiatorPolicy};
pub use config::{DeploymentConfig, DeploymentLoader, ProtocolBindings, ResolvedDeployment};
pub use context::LoanRequestContext;
pub use error::{ErrorClass, RouteError, UnwindError};
pub use lending::{LendingAdapter, ReclaimedCollateral};
pub use orchestrator::{Collaborators, ExecutionPhase, Step, UnwindReport, Unwinder};
pub use profit::ProfitVerdict;
