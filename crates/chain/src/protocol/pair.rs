//! Constant-product pair with Uniswap-V2 swap semantics.

use alloy::primitives::{Address, U256};
use tracing::debug;

use crate::contracts::AmmPool;
use crate::error::ChainError;
use crate::token;
use crate::world::{StateKey, World};

/// Fee numerator applied to the input side when checking K (0.3%).
const FEE_KEEP: u64 = 997;
/// Fee denominator.
const FEE_SCALE: u64 = 1000;

/// Two-asset constant-product pool.
///
/// Swaps are optimistic: the trader transfers input first, then calls
/// [`AmmPool::swap`] for the outputs. The pair derives the input from its
/// balance increase and rejects the swap unless
/// `(bal_a*1000 - in_a*3) * (bal_b*1000 - in_b*3) >= r_a * r_b * 1000²`.
#[derive(Debug, Clone)]
pub struct ConstantProductPair {
    address: Address,
    asset_a: Address,
    asset_b: Address,
}

impl ConstantProductPair {
    /// Create a pair handle trading `asset_a` against `asset_b`.
    pub fn new(address: Address, asset_a: Address, asset_b: Address) -> Self {
        Self {
            address,
            asset_a,
            asset_b,
        }
    }

    /// Mint initial liquidity into the pair and record it as reserves.
    pub fn seed(
        &self,
        world: &mut World,
        amount_a: U256,
        amount_b: U256,
    ) -> Result<(), ChainError> {
        world.atomic(|world| {
            token::mint(world, self.asset_a, self.address, amount_a)?;
            token::mint(world, self.asset_b, self.address, amount_b)?;
            self.sync(world);
            Ok(())
        })
    }

    /// Force reserves to match the pair's token balances.
    pub fn sync(&self, world: &mut World) {
        let balance_a = token::balance_of(world, self.asset_a, self.address);
        let balance_b = token::balance_of(world, self.asset_b, self.address);
        self.store_reserves(world, balance_a, balance_b);
    }

    fn store_reserves(&self, world: &mut World, reserve_a: U256, reserve_b: U256) {
        world.set(StateKey::Reserve { pool: self.address, slot: 0 }, reserve_a);
        world.set(StateKey::Reserve { pool: self.address, slot: 1 }, reserve_b);
    }

    /// Fee-adjusted balance: `balance * 1000 - amount_in * 3`.
    fn adjusted(balance: U256, amount_in: U256) -> Result<U256, ChainError> {
        let scaled = balance
            .checked_mul(U256::from(FEE_SCALE))
            .ok_or(ChainError::Overflow)?;
        let fee = amount_in
            .checked_mul(U256::from(FEE_SCALE - FEE_KEEP))
            .ok_or(ChainError::Overflow)?;
        scaled.checked_sub(fee).ok_or(ChainError::Overflow)
    }
}

impl AmmPool for ConstantProductPair {
    fn address(&self) -> Address {
        self.address
    }

    fn assets(&self) -> (Address, Address) {
        (self.asset_a, self.asset_b)
    }

    fn reserves(&self, world: &World) -> (U256, U256) {
        (
            world.get(StateKey::Reserve { pool: self.address, slot: 0 }),
            world.get(StateKey::Reserve { pool: self.address, slot: 1 }),
        )
    }

    fn swap(
        &self,
        world: &mut World,
        caller: Address,
        out_a: U256,
        out_b: U256,
        recipient: Address,
    ) -> Result<(), ChainError> {
        if out_a.is_zero() && out_b.is_zero() {
            return Err(ChainError::revert("insufficient output amount"));
        }

        let (reserve_a, reserve_b) = self.reserves(world);
        if out_a >= reserve_a || out_b >= reserve_b {
            let (asset, available, requested) = if out_a >= reserve_a {
                (self.asset_a, reserve_a, out_a)
            } else {
                (self.asset_b, reserve_b, out_b)
            };
            return Err(ChainError::InsufficientLiquidity {
                asset,
                available,
                requested,
            });
        }
        if recipient == self.asset_a || recipient == self.asset_b {
            return Err(ChainError::revert("invalid swap recipient"));
        }

        world.atomic(|world| {
            token::transfer(world, self.asset_a, self.address, recipient, out_a)?;
            token::transfer(world, self.asset_b, self.address, recipient, out_b)?;

            let balance_a = token::balance_of(world, self.asset_a, self.address);
            let balance_b = token::balance_of(world, self.asset_b, self.address);

            let in_a = balance_a.saturating_sub(reserve_a - out_a);
            let in_b = balance_b.saturating_sub(reserve_b - out_b);
            if in_a.is_zero() && in_b.is_zero() {
                return Err(ChainError::revert("insufficient input amount"));
            }

            let k_after = Self::adjusted(balance_a, in_a)?
                .checked_mul(Self::adjusted(balance_b, in_b)?)
                .ok_or(ChainError::Overflow)?;
            let k_before = reserve_a
                .checked_mul(reserve_b)
                .and_then(|k| k.checked_mul(U256::from(FEE_SCALE * FEE_SCALE)))
                .ok_or(ChainError::Overflow)?;
            if k_after < k_before {
                return Err(ChainError::KInvariant);
            }

            self.store_reserves(world, balance_a, balance_b);

            debug!(
                pool = %self.address,
                %caller,
                %in_a,
                %in_b,
                %out_a,
                %out_b,
                "Pair swap"
            );
            Ok(())
        })
    }
}
