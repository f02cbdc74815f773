//! Position unwinder
//!
//! Loads a deployment and its scenario, seeds an in-memory chain from the
//! scenario genesis and runs one atomic flash-loan unwind as the owner.
//!
//! Environment:
//! - `CONFIG_DIR` (default `./config`)
//! - `DEPLOYMENT` (default `local`)
//! - `RUST_LOG` overrides the log filter

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use unwinder_chain::{token, Chain, Genesis, LendingProtocol};
use unwinder_core::{Collaborators, DeploymentLoader, SwapRouter, Unwinder};

fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,unwinder_core=debug,unwinder_chain=debug")
            }),
        )
        .init();

    let loader = DeploymentLoader::from_env();
    let deployment = loader.load_from_env()?;
    info!(
        deployment = %deployment.name,
        scenario = %deployment.scenario,
        wallet = %deployment.unwinder,
        owner = %deployment.owner,
        policy = ?deployment.initiator_policy,
        "Deployment loaded"
    );

    let scenario = loader.scenario_path(&deployment);
    let deployed = Genesis::from_file(&scenario)?.build()?;

    let bindings = deployment.bindings;
    let pool = |address| {
        deployed
            .pool(address)
            .with_context(|| format!("Pool {} not found in scenario {:?}", address, scenario))
    };
    let collaborators = Collaborators {
        lender: deployed.lender.clone(),
        lending: deployed.market.clone(),
        collateral_pool: pool(bindings.collateral_pool)?,
        debt_pool: pool(bindings.debt_pool)?,
    };
    let debt_asset = deployed.market.debt_asset();

    let unwinder = Unwinder::new(deployment.unwinder, bindings, collaborators)
        .context("Failed to wire unwinder")?
        .with_initiator_policy(deployment.initiator_policy)
        .with_router(SwapRouter::new(deployment.fee));
    unwinder.initialize(deployment.owner)?;

    let chain = Chain::new(deployed.world);
    let owner = deployment.owner;

    let outcome = chain.transact(|world| match deployment.borrow_amount {
        Some(amount) => unwinder.start(world, owner, amount, deployment.min_profit),
        None => unwinder.start_full(world, owner, deployment.min_profit),
    });

    match outcome {
        Ok(report) => {
            info!(
                borrowed = %report.borrowed,
                fee = %report.fee,
                debt_repaid = %report.debt_repaid,
                collateral_swapped = %report.collateral_swapped,
                surplus = %report.surplus,
                secondary_forwarded = %report.secondary_forwarded,
                "Unwind succeeded"
            );
            let balance = chain.read(|world| token::balance_of(world, debt_asset, owner));
            info!(%owner, %debt_asset, %balance, "Owner balance");
            Ok(())
        }
        Err(e) => {
            warn!(class = ?e.class(), error = %e, "Unwind failed");
            Err(e.into())
        }
    }
}
