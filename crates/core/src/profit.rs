//! Minimum-surplus check applied before a loan is settled.

use alloy::primitives::U256;

use crate::error::UnwindError;

/// Outcome of [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfitVerdict {
    pub final_balance: U256,
    pub amount_owed: U256,
    pub min_profit: U256,
    /// `final_balance >= amount_owed + min_profit`
    pub ok: bool,
    /// `final_balance - amount_owed` when `ok`, zero otherwise
    pub surplus: U256,
}

/// Compare the post-conversion balance against what must be repaid plus
/// the required profit. An overflowing bar can never be met.
pub fn evaluate(final_balance: U256, amount_owed: U256, min_profit: U256) -> ProfitVerdict {
    let ok = amount_owed
        .checked_add(min_profit)
        .is_some_and(|required| final_balance >= required);
    let surplus = if ok {
        final_balance - amount_owed
    } else {
        U256::ZERO
    };

    ProfitVerdict {
        final_balance,
        amount_owed,
        min_profit,
        ok,
        surplus,
    }
}

impl ProfitVerdict {
    /// The surplus, or [`UnwindError::InsufficientProfit`].
    pub fn into_result(self) -> Result<U256, UnwindError> {
        if self.ok {
            Ok(self.surplus)
        } else {
            Err(UnwindError::InsufficientProfit {
                final_balance: self.final_balance,
                amount_owed: self.amount_owed,
                min_profit: self.min_profit,
            })
        }
    }
}
