//! Ledger genesis loaded from TOML.
//!
//! Describes the starting state of an in-memory chain: tokens, free
//! balances, the flash lender and its liquidity, the lending market and its
//! positions, and constant-product pools with their reserves.
//!
//! ```toml
//! [tokens]
//! usd = "0x1111111111111111111111111111111111111111"
//! eth = "0x1212121212121212121212121212121212121212"
//!
//! [lender]
//! address = "0x3030303030303030303030303030303030303030"
//! fee_bps = 10
//! liquidity = [{ token = "usd", amount = "1_000_000" }]
//!
//! [[pools]]
//! address = "0x5050505050505050505050505050505050505050"
//! asset_a = "eth"
//! asset_b = "usd"
//! reserve_a = "1_000_000"
//! reserve_b = "2_000_000"
//! ```
//!
//! Token fields accept a symbol from `[tokens]` or a literal address.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::contracts::{AmmPool, CollateralAssets};
use crate::parse::{parse_address, parse_amount};
use crate::protocol::{ConstantProductPair, FlashPool, LendingMarket};
use crate::token;
use crate::world::World;

/// Genesis file contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genesis {
    /// Token symbols to addresses
    #[serde(default)]
    pub tokens: HashMap<String, String>,
    /// Free token balances
    #[serde(default)]
    pub balances: Vec<BalanceSpec>,
    /// Flash lender
    pub lender: LenderSpec,
    /// Lending market
    pub market: MarketSpec,
    /// Constant-product pools
    #[serde(default)]
    pub pools: Vec<PoolSpec>,
}

/// A free balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSpec {
    pub token: String,
    pub holder: String,
    pub amount: String,
}

/// Flash lender parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LenderSpec {
    pub address: String,
    /// Fee in basis points
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u16,
    /// Lendable liquidity per token
    #[serde(default)]
    pub liquidity: Vec<LiquiditySpec>,
}

fn default_fee_bps() -> u16 {
    9
}

/// Lendable liquidity of one token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquiditySpec {
    pub token: String,
    pub amount: String,
}

/// Lending market parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSpec {
    pub address: String,
    pub debt_asset: String,
    pub primary_collateral: String,
    pub secondary_collateral: String,
    #[serde(default)]
    pub positions: Vec<PositionSpec>,
}

/// An open borrower position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSpec {
    pub account: String,
    pub debt: String,
    #[serde(default = "zero")]
    pub primary: String,
    #[serde(default = "zero")]
    pub secondary: String,
}

fn zero() -> String {
    "0".to_string()
}

/// A constant-product pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSpec {
    pub address: String,
    pub asset_a: String,
    pub asset_b: String,
    pub reserve_a: String,
    pub reserve_b: String,
}

/// Ledger and collaborator handles produced from a genesis.
#[derive(Debug)]
pub struct Deployed {
    /// Seeded ledger
    pub world: World,
    /// Flash lender
    pub lender: Arc<FlashPool>,
    /// Lending market
    pub market: Arc<LendingMarket>,
    /// Pools, in file order
    pub pools: Vec<Arc<ConstantProductPair>>,
    /// Resolved token symbols
    pub tokens: HashMap<String, Address>,
}

impl Deployed {
    /// Find a pool by address.
    pub fn pool(&self, address: Address) -> Option<Arc<ConstantProductPair>> {
        self.pools.iter().find(|p| p.address() == address).cloned()
    }
}

impl Genesis {
    /// Load a genesis from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read genesis {:?}", path))?;
        Self::from_toml(&content).with_context(|| format!("Failed to parse genesis {:?}", path))
    }

    /// Parse a genesis from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Build the ledger and collaborator handles.
    pub fn build(&self) -> Result<Deployed> {
        let tokens = self
            .tokens
            .iter()
            .map(|(symbol, addr)| {
                parse_address(addr)
                    .with_context(|| format!("token '{}'", symbol))
                    .map(|a| (symbol.clone(), a))
            })
            .collect::<Result<HashMap<_, _>>>()?;
        let resolve = |s: &str| -> Result<Address> {
            match tokens.get(s) {
                Some(addr) => Ok(*addr),
                None => parse_address(s).with_context(|| format!("unknown token '{}'", s)),
            }
        };

        let mut world = World::new();

        for balance in &self.balances {
            token::mint(
                &mut world,
                resolve(&balance.token)?,
                parse_address(&balance.holder)?,
                parse_amount(&balance.amount)?,
            )?;
        }

        let lender = Arc::new(FlashPool::new(
            parse_address(&self.lender.address).context("lender address")?,
            self.lender.fee_bps,
        ));
        for liquidity in &self.lender.liquidity {
            lender.deposit(
                &mut world,
                resolve(&liquidity.token)?,
                parse_amount(&liquidity.amount)?,
            )?;
        }

        let market = Arc::new(LendingMarket::new(
            parse_address(&self.market.address).context("market address")?,
            resolve(&self.market.debt_asset)?,
            CollateralAssets {
                primary: resolve(&self.market.primary_collateral)?,
                secondary: resolve(&self.market.secondary_collateral)?,
            },
        ));
        for position in &self.market.positions {
            market.open_position(
                &mut world,
                parse_address(&position.account).context("position account")?,
                parse_amount(&position.debt)?,
                parse_amount(&position.primary)?,
                parse_amount(&position.secondary)?,
            )?;
        }

        let pools = self
            .pools
            .iter()
            .map(|spec| -> Result<Arc<ConstantProductPair>> {
                let pool = ConstantProductPair::new(
                    parse_address(&spec.address).context("pool address")?,
                    resolve(&spec.asset_a)?,
                    resolve(&spec.asset_b)?,
                );
                pool.seed(
                    &mut world,
                    parse_amount(&spec.reserve_a)?,
                    parse_amount(&spec.reserve_b)?,
                )?;
                Ok(Arc::new(pool))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            tokens = tokens.len(),
            positions = self.market.positions.len(),
            pools = pools.len(),
            slots = world.len(),
            "Genesis built"
        );

        Ok(Deployed {
            world,
            lender,
            market,
            pools,
            tokens,
        })
    }
}
