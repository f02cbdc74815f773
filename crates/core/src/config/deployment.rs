//! Deployment file: contract addresses and run parameters.

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use unwinder_chain::parse::{parse_address, parse_amount};

use crate::amm::FeeRate;
use crate::auth::InitiatorPolicy;

/// Full deployment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Deployment metadata
    pub deployment: DeploymentDetails,
    /// Contract addresses
    pub contracts: DeploymentContracts,
    /// Callback initiator policy
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Swap fee
    #[serde(default)]
    pub swap: SwapConfig,
    /// Unwind parameters
    #[serde(default)]
    pub unwind: UnwindConfig,
}

/// Deployment details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentDetails {
    /// Deployment name (e.g., "local")
    pub name: String,
    /// Scenario (genesis) file name without extension; defaults to the
    /// deployment name
    #[serde(default)]
    pub scenario: Option<String>,
}

/// Contract addresses. Values may be `${VAR}` references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentContracts {
    /// The unwinder wallet holding the position
    pub unwinder: String,
    /// Owner bound at initialization
    pub owner: String,
    pub flash_lender: String,
    pub lending_market: String,
    /// Pool trading the primary collateral against the intermediate asset
    pub collateral_pool: String,
    /// Pool trading the intermediate asset against the debt asset
    pub debt_pool: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub initiator: InitiatorPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfig {
    #[serde(default = "default_fee_numerator")]
    pub fee_numerator: u64,
    #[serde(default = "default_fee_denominator")]
    pub fee_denominator: u64,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            fee_numerator: default_fee_numerator(),
            fee_denominator: default_fee_denominator(),
        }
    }
}

fn default_fee_numerator() -> u64 {
    FeeRate::UNISWAP_V2.numerator()
}

fn default_fee_denominator() -> u64 {
    FeeRate::UNISWAP_V2.denominator()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnwindConfig {
    /// Required surplus, raw units
    #[serde(default = "default_min_profit")]
    pub min_profit: String,
    /// Loan size; the full outstanding debt when absent
    #[serde(default)]
    pub borrow_amount: Option<String>,
}

impl Default for UnwindConfig {
    fn default() -> Self {
        Self {
            min_profit: default_min_profit(),
            borrow_amount: None,
        }
    }
}

fn default_min_profit() -> String {
    "0".to_string()
}

/// Immutable addresses of the unwinder's collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolBindings {
    pub flash_lender: Address,
    pub lending_market: Address,
    pub collateral_pool: Address,
    pub debt_pool: Address,
}

/// Deployment with every address and amount parsed.
#[derive(Debug, Clone)]
pub struct ResolvedDeployment {
    pub name: String,
    pub scenario: String,
    pub unwinder: Address,
    pub owner: Address,
    pub bindings: ProtocolBindings,
    pub initiator_policy: InitiatorPolicy,
    pub fee: FeeRate,
    pub min_profit: U256,
    pub borrow_amount: Option<U256>,
}

impl DeploymentConfig {
    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read deployment config {:?}", path))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse deployment config {:?}", path))
    }

    /// Parse from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Parse addresses and amounts, expanding `${VAR}` references.
    pub fn resolve(&self) -> Result<ResolvedDeployment> {
        let contracts = &self.contracts;
        let bindings = ProtocolBindings {
            flash_lender: parse_address(&contracts.flash_lender).context("contracts.flash_lender")?,
            lending_market: parse_address(&contracts.lending_market)
                .context("contracts.lending_market")?,
            collateral_pool: parse_address(&contracts.collateral_pool)
                .context("contracts.collateral_pool")?,
            debt_pool: parse_address(&contracts.debt_pool).context("contracts.debt_pool")?,
        };

        let fee = FeeRate::new(self.swap.fee_numerator, self.swap.fee_denominator).ok_or_else(|| {
            anyhow::anyhow!(
                "Invalid swap fee {}/{}",
                self.swap.fee_numerator,
                self.swap.fee_denominator
            )
        })?;

        let borrow_amount = self
            .unwind
            .borrow_amount
            .as_deref()
            .map(parse_amount)
            .transpose()
            .context("unwind.borrow_amount")?;

        Ok(ResolvedDeployment {
            name: self.deployment.name.clone(),
            scenario: self
                .deployment
                .scenario
                .clone()
                .unwrap_or_else(|| self.deployment.name.clone()),
            unwinder: parse_address(&contracts.unwinder).context("contracts.unwinder")?,
            owner: parse_address(&contracts.owner).context("contracts.owner")?,
            bindings,
            initiator_policy: self.policy.initiator,
            fee,
            min_profit: parse_amount(&self.unwind.min_profit).context("unwind.min_profit")?,
            borrow_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPLOYMENT: &str = r#"
        [deployment]
        name = "local"

        [contracts]
        unwinder = "0x0101010101010101010101010101010101010101"
        owner = "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a"
        flash_lender = "0x3030303030303030303030303030303030303030"
        lending_market = "0x4040404040404040404040404040404040404040"
        collateral_pool = "0x5050505050505050505050505050505050505050"
        debt_pool = "0x5151515151515151515151515151515151515151"

        [policy]
        initiator = "owner"

        [unwind]
        min_profit = "10"
    "#;

    #[test]
    fn test_resolve_defaults() {
        let resolved = DeploymentConfig::from_toml(DEPLOYMENT)
            .unwrap()
            .resolve()
            .unwrap();

        assert_eq!(resolved.scenario, "local");
        assert_eq!(resolved.owner, Address::repeat_byte(0x0a));
        assert_eq!(resolved.bindings.debt_pool, Address::repeat_byte(0x51));
        assert_eq!(resolved.initiator_policy, InitiatorPolicy::Owner);
        assert_eq!(resolved.fee, FeeRate::UNISWAP_V2);
        assert_eq!(resolved.min_profit, U256::from(10));
        assert_eq!(resolved.borrow_amount, None);
    }

    #[test]
    fn test_env_reference() {
        std::env::set_var("UNWINDER_TEST_OWNER", "0x0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b");
        let config = DEPLOYMENT.replace(
            "owner = \"0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a\"",
            "owner = \"${UNWINDER_TEST_OWNER}\"",
        );

        let resolved = DeploymentConfig::from_toml(&config)
            .unwrap()
            .resolve()
            .unwrap();
        assert_eq!(resolved.owner, Address::repeat_byte(0x0b));

        std::env::remove_var("UNWINDER_TEST_OWNER");
    }

    #[test]
    fn test_invalid_fee() {
        let config =
            format!("{DEPLOYMENT}\n[swap]\nfee_numerator = 1001\nfee_denominator = 1000\n");
        let err = DeploymentConfig::from_toml(&config)
            .unwrap()
            .resolve()
            .unwrap_err();
        assert!(err.to_string().contains("Invalid swap fee"));
    }

    #[test]
    fn test_borrow_amount_override() {
        let config = DEPLOYMENT.replace(
            "min_profit = \"10\"",
            "min_profit = \"10\"\nborrow_amount = \"1_000\"",
        );
        let resolved = DeploymentConfig::from_toml(&config)
            .unwrap()
            .resolve()
            .unwrap();
        assert_eq!(resolved.borrow_amount, Some(U256::from(1000)));
    }
}
