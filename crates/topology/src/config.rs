//! Topology configuration: the declarative, versionable input to a build.
//!
//! One [`TopologyConfig`] replaces what would otherwise be copy-pasted
//! per-variant topology definitions: provider lists and environment specs
//! are data, and can be serialized to/from TOML.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::providers::{ACTIVE_GATEWAY_PROVIDERS, NetworkId, ProviderRegistry, SUPPORTED_NETWORKS};
use crate::stage::{Environment, EnvironmentSpec, StageFlags};

/// The default name for the topology configuration file.
pub const TOPOLOGY_CONF_FILENAME: &str = "Stagehand.toml";

/// Gate configuration shared by every stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Verification commands, run in order after each stage deploys.
    pub commands: Vec<String>,
    /// Secret keys exported into the verification environment.
    #[serde(default)]
    pub required_secrets: BTreeSet<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            commands: vec![
                "npm ci".to_string(),
                "npm run build".to_string(),
                "npm run test:e2e".to_string(),
            ],
            required_secrets: BTreeSet::from([
                "NPM_TOKEN".to_string(),
                "ARCHIVE_NODE_RPC".to_string(),
            ]),
        }
    }
}

/// Complete declarative topology: providers, environments, gating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Pipeline name; stage ids derive from it.
    pub name: String,
    /// Networks whose RPC endpoints are required.
    pub networks: Vec<NetworkId>,
    /// Enabled gateway provider keys, in order.
    pub gateway_providers: Vec<String>,
    /// Deploy command handed to the process provisioner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_command: Option<String>,
    /// Webhook the notifier posts failure events to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Environments in promotion order.
    pub environments: Vec<EnvironmentSpec>,
    #[serde(default)]
    pub gate: GateConfig,
}

impl Default for TopologyConfig {
    /// The standard two-environment topology: beta before prod, same
    /// account and region, prod at materially higher concurrency.
    fn default() -> Self {
        Self {
            name: "routing-api".to_string(),
            networks: SUPPORTED_NETWORKS.to_vec(),
            gateway_providers: ACTIVE_GATEWAY_PROVIDERS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            environments: vec![
                EnvironmentSpec {
                    environment: Environment::Beta,
                    account_id: "000000000000".to_string(),
                    region: "us-east-2".to_string(),
                    provisioned_concurrency: 10,
                    throttling_override: None,
                    flags: StageFlags::default(),
                },
                EnvironmentSpec {
                    environment: Environment::Prod,
                    account_id: "000000000000".to_string(),
                    region: "us-east-2".to_string(),
                    provisioned_concurrency: 70,
                    throttling_override: None,
                    flags: StageFlags {
                        internal_api_key_ref: Some("INTERNAL_API_KEY".to_string()),
                        chatbot_channel_ref: Some(
                            "arn:aws:chatbot::000000000000:chat-configuration/slack-channel/eng-ops"
                                .to_string(),
                        ),
                        ..StageFlags::default()
                    },
                },
            ],
            gate: GateConfig::default(),
            deploy_command: None,
            webhook_url: None,
        }
    }
}

impl TopologyConfig {
    /// Provider registry for this topology.
    ///
    /// Sandbox mode relaxes required endpoints. It applies when explicitly
    /// requested, or when every environment in the topology is itself a
    /// sandbox (a local-only topology never hard-fails on a missing
    /// endpoint).
    pub fn provider_registry(&self, sandbox: bool) -> ProviderRegistry {
        let all_sandbox = !self.environments.is_empty()
            && self
                .environments
                .iter()
                .all(|e| e.environment.is_sandbox());
        ProviderRegistry::new(self.networks.clone(), self.gateway_providers.clone())
            .sandbox(sandbox || all_sandbox)
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize topology config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file or a directory containing
    /// one.
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file or directory not found: {}",
                path.display()
            ));
        }

        let config_path = if path.is_dir() {
            path.join(TOPOLOGY_CONF_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path)
            .context(format!("Failed to read config from {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TopologyError;
    use crate::secrets::StaticSecrets;
    use tempdir::TempDir;

    fn local_spec() -> EnvironmentSpec {
        EnvironmentSpec {
            environment: Environment::Local,
            account_id: "000000000000".to_string(),
            region: "us-east-2".to_string(),
            provisioned_concurrency: 0,
            throttling_override: None,
            flags: StageFlags::default(),
        }
    }

    #[test]
    fn default_topology_promotes_beta_before_prod() {
        let config = TopologyConfig::default();
        let environments: Vec<_> = config
            .environments
            .iter()
            .map(|e| e.environment)
            .collect();
        assert_eq!(environments, vec![Environment::Beta, Environment::Prod]);
        assert!(
            config.environments[0].provisioned_concurrency
                < config.environments[1].provisioned_concurrency
        );
    }

    #[test]
    fn toml_round_trip() {
        let dir = TempDir::new("stagehand-config").unwrap();
        let path = dir.path().join(TOPOLOGY_CONF_FILENAME);

        let config = TopologyConfig::default();
        config.save_to_file(&path).unwrap();

        let loaded = TopologyConfig::load_from_file(&path).unwrap();
        assert_eq!(config, loaded);

        // Loading by directory resolves the default filename.
        let by_dir = TopologyConfig::load_from_file(&dir.path().to_path_buf()).unwrap();
        assert_eq!(config, by_dir);
    }

    #[test]
    fn local_only_topology_resolves_as_sandbox() {
        let mut config = TopologyConfig::default();
        config.environments = vec![local_spec()];

        // No endpoints at all: keys still exist, nothing hard-fails.
        let map = config
            .provider_registry(false)
            .resolve(&StaticSecrets::new())
            .unwrap();
        for network in &config.networks {
            assert!(map.contains_key(&network.rpc_key()));
        }
    }

    #[test]
    fn mixed_topology_still_requires_endpoints() {
        let mut config = TopologyConfig::default();
        config.environments.push(local_spec());

        let err = config
            .provider_registry(false)
            .resolve(&StaticSecrets::new())
            .unwrap_err();
        assert!(matches!(err, TopologyError::MissingProvider { .. }));
    }

    #[test]
    fn missing_config_is_an_error() {
        let err =
            TopologyConfig::load_from_file(&PathBuf::from("/nonexistent/Stagehand.toml"))
                .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
