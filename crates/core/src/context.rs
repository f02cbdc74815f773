//! Opaque callback payload carried through the flash lender.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolType;

use crate::error::UnwindError;

sol! {
    /// ABI layout of the loan request context.
    #[derive(Debug)]
    struct LoanRequestData {
        address initiatorOwner;
        uint256 borrowAmount;
        uint256 minProfit;
    }
}

/// Per-invocation parameters handed from `start` to the loan callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanRequestContext {
    /// Owner that triggered the unwind
    pub initiator_owner: Address,
    /// Amount requested from the lender
    pub borrow_amount: U256,
    /// Required surplus after settling the loan
    pub min_profit: U256,
}

impl LoanRequestContext {
    pub fn new(initiator_owner: Address, borrow_amount: U256, min_profit: U256) -> Self {
        Self {
            initiator_owner,
            borrow_amount,
            min_profit,
        }
    }

    /// ABI-encode into callback bytes.
    pub fn encode(&self) -> Bytes {
        let data = LoanRequestData {
            initiatorOwner: self.initiator_owner,
            borrowAmount: self.borrow_amount,
            minProfit: self.min_profit,
        };
        Bytes::from(LoanRequestData::abi_encode(&data))
    }

    /// Decode callback bytes. Malformed input is a context mismatch.
    pub fn decode(data: &[u8]) -> Result<Self, UnwindError> {
        let data = LoanRequestData::abi_decode(data, true).map_err(|e| {
            UnwindError::CallbackContextMismatch(format!("undecodable context: {e}"))
        })?;
        Ok(Self {
            initiator_owner: data.initiatorOwner,
            borrow_amount: data.borrowAmount,
            min_profit: data.minProfit,
        })
    }
}
