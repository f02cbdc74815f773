//! ERC-3156-style flash lender.

use alloy::primitives::{Address, Bytes, U256};
use tracing::{debug, warn};

use super::bps_of;
use crate::contracts::{callback_success, FlashBorrower, FlashLender};
use crate::error::ChainError;
use crate::token;
use crate::world::World;

/// Flash lender lending out its own token balances.
///
/// Reports the contract that called [`FlashLender::issue`] as the loan
/// initiator and collects repayment by pulling `amount + fee` from the
/// receiver's allowance after the callback returns.
#[derive(Debug, Clone)]
pub struct FlashPool {
    address: Address,
    fee_bps: u16,
}

impl FlashPool {
    /// Create a lender charging `fee_bps` basis points per loan.
    pub fn new(address: Address, fee_bps: u16) -> Self {
        Self { address, fee_bps }
    }

    /// Mint lendable liquidity into the pool.
    pub fn deposit(
        &self,
        world: &mut World,
        asset: Address,
        amount: U256,
    ) -> Result<(), ChainError> {
        token::mint(world, asset, self.address, amount)
    }
}

impl FlashLender for FlashPool {
    fn address(&self) -> Address {
        self.address
    }

    fn max_loan(&self, world: &World, asset: Address) -> U256 {
        token::balance_of(world, asset, self.address)
    }

    fn fee_for(&self, _world: &World, _asset: Address, amount: U256) -> Result<U256, ChainError> {
        bps_of(amount, self.fee_bps).ok_or(ChainError::Overflow)
    }

    fn issue(
        &self,
        world: &mut World,
        caller: Address,
        receiver: &dyn FlashBorrower,
        asset: Address,
        amount: U256,
        context: Bytes,
    ) -> Result<bool, ChainError> {
        let available = self.max_loan(world, asset);
        if amount > available {
            return Err(ChainError::InsufficientLiquidity {
                asset,
                available,
                requested: amount,
            });
        }

        let fee = self.fee_for(world, asset, amount)?;
        let owed = amount.checked_add(fee).ok_or(ChainError::Overflow)?;
        let borrower = receiver.address();

        world.atomic(|world| {
            token::transfer(world, asset, self.address, borrower, amount)?;

            debug!(lender = %self.address, %borrower, %asset, %amount, %fee, "Flash loan issued");

            let ack = receiver.on_funds_received(
                world,
                self.address,
                caller,
                asset,
                amount,
                fee,
                &context,
            )?;
            if ack != callback_success() {
                warn!(
                    lender = %self.address,
                    %borrower,
                    "Borrower returned invalid acknowledgement"
                );
                return Err(ChainError::revert("flash borrower callback failed"));
            }

            token::transfer_from(world, asset, self.address, borrower, self.address, owed)?;

            debug!(lender = %self.address, %borrower, %owed, "Flash loan settled");
            Ok(true)
        })
    }
}
