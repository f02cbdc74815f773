//! Owner binding and call-origin checks.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::UnwindError;

/// Which `initiator` values the loan callback accepts.
///
/// Lenders differ in what they report: some pass the account that called
/// their issue entry point (the wallet itself), others forward the original
/// external caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitiatorPolicy {
    /// Only the owner recorded in the loan context
    Owner,
    /// Only the wallet's own address
    Wallet,
    /// Either of the above
    #[default]
    Either,
}

impl InitiatorPolicy {
    /// Whether `initiator` is acceptable given the context owner and wallet.
    pub fn accepts(self, initiator: Address, owner: Address, wallet: Address) -> bool {
        match self {
            Self::Owner => initiator == owner,
            Self::Wallet => initiator == wallet,
            Self::Either => initiator == owner || initiator == wallet,
        }
    }
}

/// Identity binding and origin guards for the unwinder's entry points.
#[derive(Debug)]
pub struct AuthorizationGate {
    owner: OnceLock<Address>,
    lender: Address,
}

impl AuthorizationGate {
    /// Create a gate that trusts callbacks from `lender`.
    pub fn new(lender: Address) -> Self {
        Self {
            owner: OnceLock::new(),
            lender,
        }
    }

    /// Bind the owner. Succeeds at most once.
    pub fn initialize(&self, owner: Address) -> Result<(), UnwindError> {
        self.owner
            .set(owner)
            .map_err(|_| UnwindError::AlreadyInitialized)
    }

    /// The bound owner, if any.
    pub fn owner(&self) -> Option<Address> {
        self.owner.get().copied()
    }

    /// The lender whose callbacks are trusted.
    pub fn lender(&self) -> Address {
        self.lender
    }

    /// Require `caller` to be the bound owner. Fails while unbound.
    pub fn ensure_owner(&self, caller: Address) -> Result<Address, UnwindError> {
        match self.owner() {
            Some(owner) if owner == caller => Ok(owner),
            _ => Err(UnwindError::Unauthorized { caller }),
        }
    }

    /// Require `caller` to be the configured lender.
    pub fn ensure_lender(&self, caller: Address) -> Result<(), UnwindError> {
        if caller == self.lender {
            Ok(())
        } else {
            Err(UnwindError::UnauthorizedLender { caller })
        }
    }
}
