//! Deployment configuration.
//!
//! This module provides:
//! - Deployment files (contract addresses, initiator policy, swap fee, run parameters)
//! - A loader resolving deployments and scenario files from the config directory

mod deployment;
mod loader;

pub use deployment::{
    DeploymentConfig, DeploymentContracts, DeploymentDetails, PolicyConfig, ProtocolBindings,
    ResolvedDeployment, SwapConfig, UnwindConfig,
};

pub use loader::{DeploymentLoader, DEFAULT_CONFIG_DIR, DEFAULT_DEPLOYMENT};
