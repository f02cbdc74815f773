//! Flash-loan driven position unwinding.
//!
//! ```text
//! start ─► FlashLender::issue ─► on_funds_received
//!                                   1. repay debt with the loan
//!                                   2. reclaim all collateral
//!                                   3. route primary collateral ─► debt asset (two hops)
//!                                   4. profitability check
//!                                   5. approve lender for amount + fee, forward surplus
//!          ◄─ lender pulls amount + fee ◄┘
//! ```
//!
//! The whole sequence runs inside one [`World::atomic`] unit: any failure
//! restores every balance, debt and collateral slot to its value before
//! `start`.

use alloy::primitives::{Address, Bytes, B256, U256};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use unwinder_chain::{
    callback_success, token, AmmPool, ChainError, FlashBorrower, FlashLender, LendingProtocol,
    World,
};

use crate::amm::SwapRouter;
use crate::auth::{AuthorizationGate, InitiatorPolicy};
use crate::config::ProtocolBindings;
use crate::context::LoanRequestContext;
use crate::error::UnwindError;
use crate::lending::LendingAdapter;
use crate::profit;

/// Collaborator handles the unwinder is wired to.
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub lender: Arc<dyn FlashLender>,
    pub lending: Arc<dyn LendingProtocol>,
    /// Primary collateral ↔ intermediate asset
    pub collateral_pool: Arc<dyn AmmPool>,
    /// Intermediate asset ↔ debt asset
    pub debt_pool: Arc<dyn AmmPool>,
}

/// One step of the callback sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    RepayDebt,
    ReclaimCollateral,
    ConvertCollateral,
    CheckProfit,
    Settle,
}

impl Step {
    /// 1-based position in the sequence.
    pub fn index(self) -> u8 {
        match self {
            Self::RepayDebt => 1,
            Self::ReclaimCollateral => 2,
            Self::ConvertCollateral => 3,
            Self::CheckProfit => 4,
            Self::Settle => 5,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::RepayDebt => "repay_debt",
            Self::ReclaimCollateral => "reclaim_collateral",
            Self::ConvertCollateral => "convert_collateral",
            Self::CheckProfit => "check_profit",
            Self::Settle => "settle",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.index(), self.name())
    }
}

/// Lifecycle of a single `start` call. Only ever reported, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    Idle,
    LoanRequested,
    Executing(Step),
    Success,
    Aborted,
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::LoanRequested => write!(f, "loan_requested"),
            Self::Executing(step) => write!(f, "executing({})", step),
            Self::Success => write!(f, "success"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Effects of a successful unwind, measured on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnwindReport {
    pub owner: Address,
    pub borrowed: U256,
    pub fee: U256,
    pub debt_repaid: U256,
    /// Primary collateral sold through the route
    pub collateral_swapped: U256,
    /// Debt asset forwarded to the owner
    pub surplus: U256,
    /// Secondary collateral forwarded to the owner
    pub secondary_forwarded: U256,
}

/// Ledger values diffed to build an [`UnwindReport`].
#[derive(Debug, Clone, Copy)]
struct Balances {
    debt: U256,
    owner_debt_asset: U256,
    owner_secondary: U256,
    wallet_primary: U256,
    pledged_primary: U256,
}

/// Smart wallet that unwinds its own lending position with a flash loan.
#[derive(Debug)]
pub struct Unwinder {
    address: Address,
    bindings: ProtocolBindings,
    gate: AuthorizationGate,
    lender: Arc<dyn FlashLender>,
    lending: LendingAdapter,
    collateral_pool: Arc<dyn AmmPool>,
    debt_pool: Arc<dyn AmmPool>,
    router: SwapRouter,
    initiator_policy: InitiatorPolicy,
}

impl Unwinder {
    /// Wire an unwinder at `address` to its collaborators. Every
    /// collaborator must sit at the address named in `bindings`.
    pub fn new(
        address: Address,
        bindings: ProtocolBindings,
        collaborators: Collaborators,
    ) -> Result<Self, UnwindError> {
        let checks = [
            ("flash_lender", bindings.flash_lender, collaborators.lender.address()),
            ("lending_market", bindings.lending_market, collaborators.lending.address()),
            ("collateral_pool", bindings.collateral_pool, collaborators.collateral_pool.address()),
            ("debt_pool", bindings.debt_pool, collaborators.debt_pool.address()),
        ];
        for (name, bound, actual) in checks {
            if bound != actual {
                return Err(UnwindError::Config(format!(
                    "{name} bound to {bound} but collaborator is at {actual}"
                )));
            }
        }

        Ok(Self {
            address,
            bindings,
            gate: AuthorizationGate::new(bindings.flash_lender),
            lender: collaborators.lender,
            lending: LendingAdapter::new(collaborators.lending, address),
            collateral_pool: collaborators.collateral_pool,
            debt_pool: collaborators.debt_pool,
            router: SwapRouter::default(),
            initiator_policy: InitiatorPolicy::default(),
        })
    }

    /// Set which callback initiators are accepted.
    pub fn with_initiator_policy(mut self, policy: InitiatorPolicy) -> Self {
        self.initiator_policy = policy;
        self
    }

    /// Use a router with a non-default fee.
    pub fn with_router(mut self, router: SwapRouter) -> Self {
        self.router = router;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn bindings(&self) -> &ProtocolBindings {
        &self.bindings
    }

    pub fn owner(&self) -> Option<Address> {
        self.gate.owner()
    }

    pub fn initiator_policy(&self) -> InitiatorPolicy {
        self.initiator_policy
    }

    /// Bind the owner. Callable once.
    pub fn initialize(&self, owner: Address) -> Result<(), UnwindError> {
        self.gate.initialize(owner)?;
        info!(wallet = %self.address, %owner, "Unwinder initialized");
        Ok(())
    }

    /// Borrow `borrow_amount` of the debt asset and unwind the position,
    /// requiring at least `min_profit` left over after repaying the loan.
    #[instrument(skip(self, world), fields(wallet = %self.address, %borrow_amount, %min_profit))]
    pub fn start(
        &self,
        world: &mut World,
        caller: Address,
        borrow_amount: U256,
        min_profit: U256,
    ) -> Result<UnwindReport, UnwindError> {
        debug!(phase = %ExecutionPhase::Idle, %caller, "Unwind requested");
        let owner = self.gate.ensure_owner(caller)?;
        if borrow_amount.is_zero() {
            return Err(UnwindError::NothingToUnwind);
        }

        let asset = self.lending.debt_asset();
        let max = self.lender.max_loan(world, asset);
        if borrow_amount > max {
            return Err(UnwindError::LoanTooLarge {
                requested: borrow_amount,
                max,
            });
        }
        let fee = self
            .lender
            .fee_for(world, asset, borrow_amount)
            .map_err(UnwindError::LoanRequestRejected)?;

        let context = LoanRequestContext::new(owner, borrow_amount, min_profit);
        let before = self.balances(world, owner);

        info!(
            phase = %ExecutionPhase::LoanRequested,
            lender = %self.lender.address(),
            %asset,
            %fee,
            "Requesting flash loan"
        );

        let outcome = world.atomic(|world| {
            let issued = self
                .lender
                .issue(world, self.address, self, asset, borrow_amount, context.encode())
                .map_err(Self::unbox_callback_error)?;
            if !issued {
                return Err(UnwindError::LoanRequestRejected(ChainError::revert(
                    "lender declined to issue the loan",
                )));
            }
            Ok(())
        });

        if let Err(e) = outcome {
            warn!(
                phase = %ExecutionPhase::Aborted,
                class = ?e.class(),
                error = %e,
                "Unwind aborted, ledger restored"
            );
            return Err(e);
        }

        let after = self.balances(world, owner);
        let report = UnwindReport {
            owner,
            borrowed: borrow_amount,
            fee,
            debt_repaid: before.debt.saturating_sub(after.debt),
            collateral_swapped: (before.wallet_primary + before.pledged_primary)
                .saturating_sub(after.wallet_primary + after.pledged_primary),
            surplus: after.owner_debt_asset.saturating_sub(before.owner_debt_asset),
            secondary_forwarded: after.owner_secondary.saturating_sub(before.owner_secondary),
        };

        info!(
            phase = %ExecutionPhase::Success,
            debt_repaid = %report.debt_repaid,
            collateral_swapped = %report.collateral_swapped,
            surplus = %report.surplus,
            secondary_forwarded = %report.secondary_forwarded,
            "Unwind complete"
        );
        Ok(report)
    }

    /// [`Unwinder::start`] borrowing exactly the wallet's outstanding debt.
    pub fn start_full(
        &self,
        world: &mut World,
        caller: Address,
        min_profit: U256,
    ) -> Result<UnwindReport, UnwindError> {
        self.gate.ensure_owner(caller)?;
        let debt = self.lending.outstanding_debt(world);
        if debt.is_zero() {
            return Err(UnwindError::NothingToUnwind);
        }
        self.start(world, caller, debt, min_profit)
    }

    /// Loan callback. Only the configured lender may call it, and only with
    /// terms matching the context it was handed by [`Unwinder::start`].
    /// Returns the ERC-3156 acknowledgement.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, world, context), fields(wallet = %self.address, %asset, %amount, %fee))]
    pub fn on_funds_received(
        &self,
        world: &mut World,
        caller: Address,
        initiator: Address,
        asset: Address,
        amount: U256,
        fee: U256,
        context: &[u8],
    ) -> Result<B256, UnwindError> {
        self.gate.ensure_lender(caller)?;

        let context = LoanRequestContext::decode(context)?;
        if self.gate.owner() != Some(context.initiator_owner) {
            return Err(UnwindError::CallbackContextMismatch(format!(
                "context owner {} is not the wallet owner",
                context.initiator_owner
            )));
        }
        if !self
            .initiator_policy
            .accepts(initiator, context.initiator_owner, self.address)
        {
            return Err(UnwindError::CallbackContextMismatch(format!(
                "initiator {initiator} rejected by {:?} policy",
                self.initiator_policy
            )));
        }
        if amount != context.borrow_amount {
            return Err(UnwindError::CallbackContextMismatch(format!(
                "received {amount} but requested {}",
                context.borrow_amount
            )));
        }
        if asset != self.lending.debt_asset() {
            return Err(UnwindError::UnsupportedAsset(asset));
        }

        world.atomic(|world| self.execute_unwind(world, &context, amount, fee))?;
        Ok(callback_success())
    }

    fn execute_unwind(
        &self,
        world: &mut World,
        context: &LoanRequestContext,
        amount: U256,
        fee: U256,
    ) -> Result<(), UnwindError> {
        let owner = context.initiator_owner;
        let debt_asset = self.lending.debt_asset();
        let collateral = self.lending.collateral_assets();

        self.lending.repay(world, amount)?;
        info!(phase = %ExecutionPhase::Executing(Step::RepayDebt), %amount, "Debt repaid");

        let reclaimed = self.lending.reclaim_all(world)?;
        info!(
            phase = %ExecutionPhase::Executing(Step::ReclaimCollateral),
            primary = %reclaimed.primary,
            secondary = %reclaimed.secondary,
            "Collateral reclaimed"
        );

        let held = token::balance_of(world, collateral.primary, self.address);
        if held.is_zero() {
            debug!(
                phase = %ExecutionPhase::Executing(Step::ConvertCollateral),
                "No collateral to convert"
            );
        } else {
            let received = self.router.route_two_hop(
                world,
                self.address,
                self.collateral_pool.as_ref(),
                self.debt_pool.as_ref(),
                collateral.primary,
                debt_asset,
                held,
            )?;
            info!(
                phase = %ExecutionPhase::Executing(Step::ConvertCollateral),
                sold = %held,
                %received,
                "Collateral converted"
            );
        }

        let final_balance = token::balance_of(world, debt_asset, self.address);
        let amount_owed = amount
            .checked_add(fee)
            .ok_or(UnwindError::SettlementFailed(ChainError::Overflow))?;
        let verdict = profit::evaluate(final_balance, amount_owed, context.min_profit);
        debug!(
            phase = %ExecutionPhase::Executing(Step::CheckProfit),
            %final_balance,
            %amount_owed,
            min_profit = %context.min_profit,
            ok = verdict.ok,
            "Profit evaluated"
        );
        let surplus = verdict.into_result()?;

        token::approve(world, debt_asset, self.address, self.lender.address(), amount_owed);
        token::transfer(world, debt_asset, self.address, owner, surplus)
            .map_err(UnwindError::SettlementFailed)?;

        let secondary = collateral.secondary;
        let mut forwarded = U256::ZERO;
        if secondary != debt_asset && secondary != collateral.primary {
            forwarded = token::balance_of(world, secondary, self.address);
            token::transfer(world, secondary, self.address, owner, forwarded)
                .map_err(UnwindError::SettlementFailed)?;
        }

        info!(
            phase = %ExecutionPhase::Executing(Step::Settle),
            %amount_owed,
            %surplus,
            secondary_forwarded = %forwarded,
            %owner,
            "Loan settlement approved"
        );
        Ok(())
    }

    /// Recover the unwinder's own error from a lender failure.
    fn unbox_callback_error(err: ChainError) -> UnwindError {
        match err {
            ChainError::Callback(inner) => match inner.downcast::<UnwindError>() {
                Ok(unwind) => *unwind,
                Err(other) => UnwindError::LoanRequestRejected(ChainError::Callback(other)),
            },
            other => UnwindError::LoanRequestRejected(other),
        }
    }

    fn balances(&self, world: &World, owner: Address) -> Balances {
        let debt_asset = self.lending.debt_asset();
        let collateral = self.lending.collateral_assets();
        Balances {
            debt: self.lending.outstanding_debt(world),
            owner_debt_asset: token::balance_of(world, debt_asset, owner),
            owner_secondary: token::balance_of(world, collateral.secondary, owner),
            wallet_primary: token::balance_of(world, collateral.primary, self.address),
            pledged_primary: self.lending.collateral(world).primary,
        }
    }
}

impl FlashBorrower for Unwinder {
    fn address(&self) -> Address {
        self.address
    }

    fn on_funds_received(
        &self,
        world: &mut World,
        caller: Address,
        initiator: Address,
        token: Address,
        amount: U256,
        fee: U256,
        context: &Bytes,
    ) -> Result<B256, ChainError> {
        Unwinder::on_funds_received(self, world, caller, initiator, token, amount, fee, context)
            .map_err(|e| ChainError::Callback(Box::new(e)))
    }
}
