//! Locates deployment and scenario files under the config directory.
//!
//! ```text
//! $CONFIG_DIR/
//! ├── deployments/<name>.toml   DeploymentConfig
//! └── scenarios/<name>.toml     ledger genesis
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use super::deployment::{DeploymentConfig, ResolvedDeployment};

/// Default config directory when `CONFIG_DIR` is unset.
pub const DEFAULT_CONFIG_DIR: &str = "./config";
/// Default deployment when `DEPLOYMENT` is unset.
pub const DEFAULT_DEPLOYMENT: &str = "local";

/// Loads deployments from a config directory.
#[derive(Debug, Clone)]
pub struct DeploymentLoader {
    config_dir: PathBuf,
}

impl DeploymentLoader {
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
        }
    }

    /// Loader rooted at `$CONFIG_DIR`.
    pub fn from_env() -> Self {
        let config_dir =
            std::env::var("CONFIG_DIR").unwrap_or_else(|_| DEFAULT_CONFIG_DIR.to_string());
        Self::new(config_dir)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Load and resolve a deployment by name.
    pub fn load(&self, deployment_name: &str) -> Result<ResolvedDeployment> {
        info!(deployment = deployment_name, "Loading deployment configuration");

        let path = self
            .config_dir
            .join("deployments")
            .join(format!("{}.toml", deployment_name));
        let config = DeploymentConfig::from_file(&path)?;
        if config.deployment.name != deployment_name {
            anyhow::bail!(
                "Deployment file {:?} declares name '{}'",
                path,
                config.deployment.name
            );
        }

        config
            .resolve()
            .with_context(|| format!("Failed to resolve deployment '{}'", deployment_name))
    }

    /// Load the deployment named by `$DEPLOYMENT`.
    pub fn load_from_env(&self) -> Result<ResolvedDeployment> {
        let name = std::env::var("DEPLOYMENT").unwrap_or_else(|_| DEFAULT_DEPLOYMENT.to_string());
        self.load(&name)
    }

    /// Path of a deployment's scenario file.
    pub fn scenario_path(&self, deployment: &ResolvedDeployment) -> PathBuf {
        self.config_dir
            .join("scenarios")
            .join(format!("{}.toml", deployment.scenario))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config")
    }

    #[test]
    fn test_load_local() {
        let loader = DeploymentLoader::new(config_dir());
        let deployment = loader.load("local").unwrap();

        assert_eq!(deployment.name, "local");
        assert!(loader.scenario_path(&deployment).exists());
    }

    #[test]
    fn test_missing_deployment() {
        let err = DeploymentLoader::new(config_dir())
            .load("does-not-exist")
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read deployment config"));
    }
}
