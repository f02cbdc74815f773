//! Typed access to the lending protocol on behalf of one account.

use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tracing::debug;
use unwinder_chain::{token, CollateralAssets, LendingProtocol, World};

use crate::error::UnwindError;

/// Collateral moved back to the account by [`LendingAdapter::reclaim_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReclaimedCollateral {
    pub primary: U256,
    pub secondary: U256,
}

/// Lending protocol client bound to the account whose position is unwound.
#[derive(Debug, Clone)]
pub struct LendingAdapter {
    protocol: Arc<dyn LendingProtocol>,
    account: Address,
}

impl LendingAdapter {
    pub fn new(protocol: Arc<dyn LendingProtocol>, account: Address) -> Self {
        Self { protocol, account }
    }

    pub fn debt_asset(&self) -> Address {
        self.protocol.debt_asset()
    }

    pub fn collateral_assets(&self) -> CollateralAssets {
        self.protocol.collateral_assets()
    }

    pub fn outstanding_debt(&self, world: &World) -> U256 {
        self.protocol.total_debt_of(world, self.account)
    }

    pub fn collateral(&self, world: &World) -> ReclaimedCollateral {
        let assets = self.collateral_assets();
        ReclaimedCollateral {
            primary: self.protocol.collateral_of(world, self.account, assets.primary),
            secondary: self.protocol.collateral_of(world, self.account, assets.secondary),
        }
    }

    /// Approve the protocol for `amount` of the debt asset and repay it.
    pub fn repay(&self, world: &mut World, amount: U256) -> Result<(), UnwindError> {
        let asset = self.debt_asset();
        world
            .atomic(|world| {
                token::approve(world, asset, self.account, self.protocol.address(), amount);
                self.protocol.repay(world, self.account, asset, amount)
            })
            .map_err(UnwindError::RepaymentFailed)?;

        debug!(account = %self.account, %asset, %amount, "Debt repaid");
        Ok(())
    }

    /// Pull every collateral class back to the account.
    pub fn reclaim_all(&self, world: &mut World) -> Result<ReclaimedCollateral, UnwindError> {
        let assets = self.collateral_assets();
        let before = self.held(world, assets);

        self.protocol
            .reclaim_all_collateral(world, self.account)
            .map_err(UnwindError::ReclaimFailed)?;

        let after = self.held(world, assets);
        let reclaimed = ReclaimedCollateral {
            primary: after.primary.saturating_sub(before.primary),
            secondary: after.secondary.saturating_sub(before.secondary),
        };

        debug!(
            account = %self.account,
            primary = %reclaimed.primary,
            secondary = %reclaimed.secondary,
            "Collateral reclaimed"
        );
        Ok(reclaimed)
    }

    fn held(&self, world: &World, assets: CollateralAssets) -> ReclaimedCollateral {
        ReclaimedCollateral {
            primary: token::balance_of(world, assets.primary, self.account),
            secondary: token::balance_of(world, assets.secondary, self.account),
        }
    }
}
