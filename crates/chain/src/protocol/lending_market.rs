//! Lending market with one debt asset and two collateral classes.

use alloy::primitives::{Address, U256};
use tracing::debug;

use crate::contracts::{CollateralAssets, LendingProtocol};
use crate::error::ChainError;
use crate::token;
use crate::world::{StateKey, World};

/// Lending market holding borrower positions.
///
/// Repayment larger than the outstanding debt is rejected, and collateral
/// can only be reclaimed once the debt is fully repaid.
#[derive(Debug, Clone)]
pub struct LendingMarket {
    address: Address,
    debt_asset: Address,
    collateral: CollateralAssets,
}

impl LendingMarket {
    /// Create a market handle.
    pub fn new(address: Address, debt_asset: Address, collateral: CollateralAssets) -> Self {
        Self {
            address,
            debt_asset,
            collateral,
        }
    }

    /// Seed a position: record `debt` and pledge the given collateral,
    /// minting the collateral into the market's custody.
    pub fn open_position(
        &self,
        world: &mut World,
        account: Address,
        debt: U256,
        primary: U256,
        secondary: U256,
    ) -> Result<(), ChainError> {
        world.atomic(|world| {
            world.set(self.debt_key(account), debt);
            for (asset, amount) in [
                (self.collateral.primary, primary),
                (self.collateral.secondary, secondary),
            ] {
                let pledged = world
                    .get(self.collateral_key(account, asset))
                    .checked_add(amount)
                    .ok_or(ChainError::Overflow)?;
                world.set(self.collateral_key(account, asset), pledged);
                token::mint(world, asset, self.address, amount)?;
            }
            Ok(())
        })
    }

    fn debt_key(&self, account: Address) -> StateKey {
        StateKey::Debt {
            market: self.address,
            account,
        }
    }

    fn collateral_key(&self, account: Address, asset: Address) -> StateKey {
        StateKey::Collateral {
            market: self.address,
            account,
            asset,
        }
    }
}

impl LendingProtocol for LendingMarket {
    fn address(&self) -> Address {
        self.address
    }

    fn debt_asset(&self) -> Address {
        self.debt_asset
    }

    fn collateral_assets(&self) -> CollateralAssets {
        self.collateral
    }

    fn total_debt_of(&self, world: &World, account: Address) -> U256 {
        world.get(self.debt_key(account))
    }

    fn collateral_of(&self, world: &World, account: Address, asset: Address) -> U256 {
        world.get(self.collateral_key(account, asset))
    }

    fn repay(
        &self,
        world: &mut World,
        caller: Address,
        asset: Address,
        amount: U256,
    ) -> Result<(), ChainError> {
        if asset != self.debt_asset {
            return Err(ChainError::UnsupportedAsset(asset));
        }
        if amount.is_zero() {
            return Err(ChainError::revert("repay amount is zero"));
        }

        let debt = self.total_debt_of(world, caller);
        if amount > debt {
            return Err(ChainError::revert(format!(
                "repay amount {amount} exceeds debt {debt}"
            )));
        }

        world.atomic(|world| {
            token::transfer_from(world, asset, self.address, caller, self.address, amount)?;
            world.set(self.debt_key(caller), debt - amount);
            Ok(())
        })?;

        debug!(market = %self.address, account = %caller, repaid = %amount, "Debt repaid");
        Ok(())
    }

    fn reclaim_all_collateral(&self, world: &mut World, caller: Address) -> Result<(), ChainError> {
        let debt = self.total_debt_of(world, caller);
        if !debt.is_zero() {
            return Err(ChainError::revert(format!(
                "cannot reclaim collateral with {debt} debt outstanding"
            )));
        }

        world.atomic(|world| {
            for asset in [self.collateral.primary, self.collateral.secondary] {
                let pledged = world.get(self.collateral_key(caller, asset));
                if pledged.is_zero() {
                    continue;
                }
                world.set(self.collateral_key(caller, asset), U256::ZERO);
                token::transfer(world, asset, self.address, caller, pledged)?;

                debug!(
                    market = %self.address,
                    account = %caller,
                    %asset,
                    amount = %pledged,
                    "Collateral reclaimed"
                );
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKET: Address = Address::repeat_byte(0x40);
    const USD: Address = Address::repeat_byte(0x11);
    const ETH: Address = Address::repeat_byte(0x12);
    const BTC: Address = Address::repeat_byte(0x13);
    const WALLET: Address = Address::repeat_byte(0x01);

    fn market() -> LendingMarket {
        LendingMarket::new(
            MARKET,
            USD,
            CollateralAssets {
                primary: ETH,
                secondary: BTC,
            },
        )
    }

    fn seeded() -> (World, LendingMarket) {
        let mut world = World::new();
        let market = market();
        market
            .open_position(&mut world, WALLET, U256::from(1000), U256::from(5), U256::from(2))
            .unwrap();
        (world, market)
    }

    #[test]
    fn test_open_position() {
        let (world, market) = seeded();
        assert_eq!(market.total_debt_of(&world, WALLET), U256::from(1000));
        assert_eq!(market.collateral_of(&world, WALLET, ETH), U256::from(5));
        assert_eq!(token::balance_of(&world, ETH, MARKET), U256::from(5));
    }

    #[test]
    fn test_repay_pulls_through_allowance() {
        let (mut world, market) = seeded();
        token::mint(&mut world, USD, WALLET, U256::from(400)).unwrap();
        token::approve(&mut world, USD, WALLET, MARKET, U256::from(400));

        market.repay(&mut world, WALLET, USD, U256::from(400)).unwrap();

        assert_eq!(market.total_debt_of(&world, WALLET), U256::from(600));
        assert_eq!(token::balance_of(&world, USD, WALLET), U256::ZERO);
    }

    #[test]
    fn test_repay_without_allowance_leaves_debt() {
        let (mut world, market) = seeded();
        token::mint(&mut world, USD, WALLET, U256::from(400)).unwrap();

        let err = market.repay(&mut world, WALLET, USD, U256::from(400)).unwrap_err();
        assert!(matches!(err, ChainError::InsufficientAllowance { .. }));
        assert_eq!(market.total_debt_of(&world, WALLET), U256::from(1000));
    }

    #[test]
    fn test_over_repayment_rejected() {
        let (mut world, market) = seeded();
        token::mint(&mut world, USD, WALLET, U256::from(2000)).unwrap();
        token::approve(&mut world, USD, WALLET, MARKET, U256::from(2000));

        let err = market.repay(&mut world, WALLET, USD, U256::from(1001)).unwrap_err();
        assert!(matches!(err, ChainError::Reverted(_)));
    }

    #[test]
    fn test_repay_wrong_asset() {
        let (mut world, market) = seeded();
        let err = market.repay(&mut world, WALLET, ETH, U256::from(1)).unwrap_err();
        assert!(matches!(err, ChainError::UnsupportedAsset(a) if a == ETH));
    }

    #[test]
    fn test_reclaim_requires_zero_debt() {
        let (mut world, market) = seeded();
        let err = market.reclaim_all_collateral(&mut world, WALLET).unwrap_err();
        assert!(matches!(err, ChainError::Reverted(_)));
        assert_eq!(market.collateral_of(&world, WALLET, ETH), U256::from(5));
    }

    #[test]
    fn test_reclaim_returns_both_classes() {
        let (mut world, market) = seeded();
        token::mint(&mut world, USD, WALLET, U256::from(1000)).unwrap();
        token::approve(&mut world, USD, WALLET, MARKET, U256::from(1000));
        market.repay(&mut world, WALLET, USD, U256::from(1000)).unwrap();

        market.reclaim_all_collateral(&mut world, WALLET).unwrap();

        assert_eq!(token::balance_of(&world, ETH, WALLET), U256::from(5));
        assert_eq!(token::balance_of(&world, BTC, WALLET), U256::from(2));
        assert_eq!(market.collateral_of(&world, WALLET, ETH), U256::ZERO);
    }
}
