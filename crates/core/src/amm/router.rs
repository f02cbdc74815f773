//! Swap routing over constant-product pools.
//!
//! Pool state is read live on every call. Which of a pool's two slots is
//! input and which is output is always resolved by comparing asset
//! addresses, never by position.

use alloy::primitives::{Address, U256};
use tracing::debug;
use unwinder_chain::{token, AmmPool, World};

use super::math::{get_amount_out, FeeRate};
use crate::error::RouteError;

/// Priced swap against current reserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapQuote {
    pub amount_in: U256,
    pub reserve_in: U256,
    pub reserve_out: U256,
    pub amount_out: U256,
    /// Asset delivered by the swap
    pub asset_out: Address,
}

/// Prices and executes single swaps and two-hop routes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwapRouter {
    fee: FeeRate,
}

impl SwapRouter {
    pub fn new(fee: FeeRate) -> Self {
        Self { fee }
    }

    pub fn fee(&self) -> FeeRate {
        self.fee
    }

    /// Price `amount_in` of `asset_in` against `pool`'s live reserves.
    pub fn quote(
        &self,
        world: &World,
        pool: &dyn AmmPool,
        asset_in: Address,
        amount_in: U256,
    ) -> Result<SwapQuote, RouteError> {
        let (asset_a, asset_b) = pool.assets();
        let (reserve_a, reserve_b) = pool.reserves(world);

        let (reserve_in, reserve_out, asset_out) = if asset_in == asset_a {
            (reserve_a, reserve_b, asset_b)
        } else if asset_in == asset_b {
            (reserve_b, reserve_a, asset_a)
        } else {
            return Err(RouteError::PoolAssetMismatch {
                pool: pool.address(),
                asset: asset_in,
            });
        };

        if reserve_in.is_zero() || reserve_out.is_zero() {
            return Err(RouteError::EmptyReserves {
                pool: pool.address(),
            });
        }

        let amount_out = get_amount_out(amount_in, reserve_in, reserve_out, self.fee)
            .ok_or(RouteError::ArithmeticOverflow)?;
        if amount_out.is_zero() {
            return Err(RouteError::ZeroOutput {
                pool: pool.address(),
                amount_in,
            });
        }

        debug!(
            pool = %pool.address(),
            %asset_in,
            %asset_out,
            %amount_in,
            %reserve_in,
            %reserve_out,
            %amount_out,
            "Swap quoted"
        );

        Ok(SwapQuote {
            amount_in,
            reserve_in,
            reserve_out,
            amount_out,
            asset_out,
        })
    }

    /// Swap `amount_in` of `asset_in` held by `trader` through `pool`,
    /// delivering the output back to `trader`. Returns the amount received.
    pub fn execute(
        &self,
        world: &mut World,
        trader: Address,
        pool: &dyn AmmPool,
        asset_in: Address,
        amount_in: U256,
    ) -> Result<U256, RouteError> {
        let quote = self.quote(world, pool, asset_in, amount_in)?;
        let pool_address = pool.address();
        let (asset_a, _) = pool.assets();
        let (out_a, out_b) = if quote.asset_out == asset_a {
            (quote.amount_out, U256::ZERO)
        } else {
            (U256::ZERO, quote.amount_out)
        };

        world
            .atomic(|world| {
                token::transfer(world, asset_in, trader, pool_address, amount_in)?;
                pool.swap(world, trader, out_a, out_b, trader)
            })
            .map_err(|source| RouteError::Pool {
                pool: pool_address,
                source,
            })?;

        Ok(quote.amount_out)
    }

    /// Convert `amount_in` of `asset_in` into `target` through `first` then
    /// `second`.
    ///
    /// The intermediate asset is whichever of `second`'s assets is not
    /// `target`. A zero input, or a zero intermediate amount, yields zero
    /// without touching the second pool.
    #[allow(clippy::too_many_arguments)]
    pub fn route_two_hop(
        &self,
        world: &mut World,
        trader: Address,
        first: &dyn AmmPool,
        second: &dyn AmmPool,
        asset_in: Address,
        target: Address,
        amount_in: U256,
    ) -> Result<U256, RouteError> {
        let intermediate = other_asset(second, target).ok_or(RouteError::PoolAssetMismatch {
            pool: second.address(),
            asset: target,
        })?;
        if other_asset(first, asset_in) != Some(intermediate) {
            return Err(RouteError::PoolAssetMismatch {
                pool: first.address(),
                asset: intermediate,
            });
        }

        if amount_in.is_zero() {
            return Ok(U256::ZERO);
        }

        let mid = self.execute(world, trader, first, asset_in, amount_in)?;
        if mid.is_zero() {
            return Ok(U256::ZERO);
        }
        let out = self.execute(world, trader, second, intermediate, mid)?;

        debug!(%asset_in, %intermediate, %target, %amount_in, %mid, %out, "Two-hop route executed");
        Ok(out)
    }
}

/// The asset `pool` trades against `asset`, if it trades `asset` at all.
fn other_asset(pool: &dyn AmmPool, asset: Address) -> Option<Address> {
    let (asset_a, asset_b) = pool.assets();
    if asset == asset_a {
        Some(asset_b)
    } else if asset == asset_b {
        Some(asset_a)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use unwinder_chain::{ChainError, ConstantProductPair};

    const ETH: Address = Address::repeat_byte(0x12);
    const MID: Address = Address::repeat_byte(0x14);
    const USD: Address = Address::repeat_byte(0x11);
    const TRADER: Address = Address::repeat_byte(0x01);
    const POOL_A: Address = Address::repeat_byte(0x50);
    const POOL_B: Address = Address::repeat_byte(0x51);

    /// Pool wrapper counting swap calls.
    #[derive(Debug)]
    struct CountingPool {
        inner: ConstantProductPair,
        swaps: AtomicUsize,
    }

    impl CountingPool {
        fn new(inner: ConstantProductPair) -> Self {
            Self {
                inner,
                swaps: AtomicUsize::new(0),
            }
        }

        fn swaps(&self) -> usize {
            self.swaps.load(Ordering::SeqCst)
        }
    }

    impl AmmPool for CountingPool {
        fn address(&self) -> Address {
            self.inner.address()
        }

        fn assets(&self) -> (Address, Address) {
            self.inner.assets()
        }

        fn reserves(&self, world: &World) -> (U256, U256) {
            self.inner.reserves(world)
        }

        fn swap(
            &self,
            world: &mut World,
            caller: Address,
            out_a: U256,
            out_b: U256,
            recipient: Address,
        ) -> Result<(), ChainError> {
            self.swaps.fetch_add(1, Ordering::SeqCst);
            self.inner.swap(world, caller, out_a, out_b, recipient)
        }
    }

    /// Collateral pool (ETH, MID) and a debt pool stored as (USD, MID) so the
    /// second hop exercises the reversed orientation.
    fn setup() -> (World, ConstantProductPair, CountingPool) {
        let mut world = World::new();
        let first = ConstantProductPair::new(POOL_A, ETH, MID);
        first
            .seed(&mut world, U256::from(1_000_000), U256::from(2_000_000))
            .unwrap();
        let second = ConstantProductPair::new(POOL_B, USD, MID);
        second
            .seed(&mut world, U256::from(10_000_000), U256::from(10_000_000))
            .unwrap();
        token::mint(&mut world, ETH, TRADER, U256::from(529)).unwrap();
        (world, first, CountingPool::new(second))
    }

    #[test]
    fn test_quote_both_orientations() {
        let (world, first, second) = setup();
        let router = SwapRouter::default();

        let quote = router.quote(&world, &first, ETH, U256::from(529)).unwrap();
        assert_eq!(quote.amount_out, U256::from(1054));
        assert_eq!(quote.asset_out, MID);
        assert_eq!(quote.reserve_in, U256::from(1_000_000));

        let quote = router.quote(&world, &second, MID, U256::from(1054)).unwrap();
        assert_eq!(quote.amount_out, U256::from(1050));
        assert_eq!(quote.asset_out, USD);
    }

    #[test]
    fn test_quote_asset_mismatch() {
        let (world, first, _) = setup();
        let err = SwapRouter::default()
            .quote(&world, &first, USD, U256::from(10))
            .unwrap_err();
        assert!(matches!(
            err,
            RouteError::PoolAssetMismatch { pool, asset } if pool == POOL_A && asset == USD
        ));
    }

    #[test]
    fn test_quote_dust_is_zero_output() {
        let (world, first, _) = setup();
        let err = SwapRouter::default()
            .quote(&world, &first, MID, U256::from(1))
            .unwrap_err();
        assert!(matches!(err, RouteError::ZeroOutput { .. }));
    }

    #[test]
    fn test_empty_reserves_before_transfer() {
        let mut world = World::new();
        let pool = ConstantProductPair::new(POOL_A, ETH, MID);
        pool.seed(&mut world, U256::ZERO, U256::from(2_000_000)).unwrap();
        token::mint(&mut world, ETH, TRADER, U256::from(529)).unwrap();
        let before = world.state().clone();

        let err = SwapRouter::default()
            .execute(&mut world, TRADER, &pool, ETH, U256::from(529))
            .unwrap_err();

        assert!(matches!(err, RouteError::EmptyReserves { pool } if pool == POOL_A));
        assert_eq!(world.state(), &before);
    }

    #[test]
    fn test_execute_reversed_slots() {
        let (mut world, _, second) = setup();
        token::mint(&mut world, MID, TRADER, U256::from(1054)).unwrap();

        let out = SwapRouter::default()
            .execute(&mut world, TRADER, &second, MID, U256::from(1054))
            .unwrap();

        assert_eq!(out, U256::from(1050));
        assert_eq!(token::balance_of(&world, USD, TRADER), U256::from(1050));
        assert_eq!(token::balance_of(&world, MID, TRADER), U256::ZERO);
        assert_eq!(
            second.reserves(&world),
            (U256::from(9_998_950), U256::from(10_001_054))
        );
    }

    #[test]
    fn test_route_two_hop() {
        let (mut world, first, second) = setup();

        let out = SwapRouter::default()
            .route_two_hop(&mut world, TRADER, &first, &second, ETH, USD, U256::from(529))
            .unwrap();

        assert_eq!(out, U256::from(1050));
        assert_eq!(token::balance_of(&world, USD, TRADER), U256::from(1050));
        assert_eq!(token::balance_of(&world, ETH, TRADER), U256::ZERO);
        assert_eq!(second.swaps(), 1);
    }

    #[test]
    fn test_route_zero_input_skips_second_hop() {
        let (mut world, first, second) = setup();
        let before = world.state().clone();

        let out = SwapRouter::default()
            .route_two_hop(&mut world, TRADER, &first, &second, ETH, USD, U256::ZERO)
            .unwrap();

        assert_eq!(out, U256::ZERO);
        assert_eq!(second.swaps(), 0);
        assert_eq!(world.state(), &before);
    }

    #[test]
    fn test_route_target_not_in_second_pool() {
        let (mut world, first, second) = setup();
        let err = SwapRouter::default()
            .route_two_hop(&mut world, TRADER, &first, &second, ETH, ETH, U256::from(529))
            .unwrap_err();
        assert!(matches!(err, RouteError::PoolAssetMismatch { pool, .. } if pool == POOL_B));
    }

    #[test]
    fn test_route_first_pool_wrong_intermediate() {
        let mut world = World::new();
        let first = ConstantProductPair::new(POOL_A, ETH, USD);
        first
            .seed(&mut world, U256::from(1_000_000), U256::from(2_000_000))
            .unwrap();
        let second = ConstantProductPair::new(POOL_B, MID, USD);
        second
            .seed(&mut world, U256::from(1_000_000), U256::from(1_000_000))
            .unwrap();
        token::mint(&mut world, ETH, TRADER, U256::from(529)).unwrap();

        let err = SwapRouter::default()
            .route_two_hop(&mut world, TRADER, &first, &second, ETH, USD, U256::from(529))
            .unwrap_err();
        assert!(matches!(
            err,
            RouteError::PoolAssetMismatch { pool, asset } if pool == POOL_A && asset == MID
        ));
    }

    #[test]
    fn test_second_hop_failure_rolls_back_in_outer_unit() {
        let (mut world, first, _) = setup();
        let drained = ConstantProductPair::new(POOL_B, USD, MID);
        let before = world.state().clone();

        let err = world
            .atomic(|world| {
                SwapRouter::default().route_two_hop(
                    world,
                    TRADER,
                    &first,
                    &drained,
                    ETH,
                    USD,
                    U256::from(529),
                )
            })
            .unwrap_err();

        assert!(matches!(err, RouteError::EmptyReserves { pool } if pool == POOL_B));
        assert_eq!(world.state(), &before);
    }
}
