//! Stage descriptors: the fully resolved configuration snapshot for one
//! deployment unit in one environment.
//!
//! Field requirements are declared per environment in one schema
//! ([`Environment::required_fields`]) and validated once by the factory,
//! rather than checked ad hoc at call sites.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, TopologyError};
use crate::providers::ProviderMap;

/// Named deployment target.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Environment {
    Beta,
    Prod,
    /// Local development sandbox. Missing provider endpoints are tolerated
    /// here (see the provider registry's sandbox mode).
    Local,
}

/// A descriptor field an environment may declare mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    InternalApiKeyRef,
    ChatbotChannelRef,
}

impl RequiredField {
    pub fn name(&self) -> &'static str {
        match self {
            RequiredField::InternalApiKeyRef => "internal_api_key_ref",
            RequiredField::ChatbotChannelRef => "chatbot_channel_ref",
        }
    }
}

impl Environment {
    /// Fields that must be present before a stage can be built for this
    /// environment.
    pub fn required_fields(&self) -> &'static [RequiredField] {
        match self {
            Environment::Prod => &[
                RequiredField::InternalApiKeyRef,
                RequiredField::ChatbotChannelRef,
            ],
            Environment::Beta | Environment::Local => &[],
        }
    }

    /// Whether this environment is a non-production sandbox.
    pub fn is_sandbox(&self) -> bool {
        matches!(self, Environment::Local)
    }
}

/// Credentials for the pinning/storage service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageCredentials {
    pub api_key: String,
    pub api_secret: String,
}

/// Credentials for the external simulation service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalServiceCredentials {
    pub user: String,
    pub project: String,
    pub access_key: String,
    pub node_api_key: String,
}

/// Per-stage feature configuration and credential references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFlags {
    /// Gas price oracle endpoint.
    pub eth_gas_station_url: String,
    /// Chat channel the pipeline notifies on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chatbot_channel_ref: Option<String>,
    /// API key protecting internal routes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_api_key_ref: Option<String>,
    /// Role assumed for DNS record management.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route53_role_arn: Option<String>,
    /// Hosted DNS zone for the public endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosted_zone_ref: Option<String>,
    /// Shared application secret reference.
    #[serde(default)]
    pub secret_ref: String,
    /// Pinning/storage service credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_credentials: Option<StorageCredentials>,
    /// Simulation service credentials.
    #[serde(default)]
    pub external_service_credentials: ExternalServiceCredentials,
}

/// Declarative input for one environment's stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    pub environment: Environment,
    pub account_id: String,
    pub region: String,
    /// Provisioned concurrency target for the compute runtime.
    pub provisioned_concurrency: u32,
    /// Optional request throttling override (requests per five minutes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttling_override: Option<u64>,
    #[serde(default)]
    pub flags: StageFlags,
}

impl EnvironmentSpec {
    /// Stage name in the form `<environment>-<region>`, e.g. `beta-us-east-2`.
    pub fn stage_name(&self) -> String {
        format!("{}-{}", self.environment, self.region)
    }
}

/// Fully resolved configuration for one deployment unit in one environment.
///
/// Built once per environment, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDescriptor {
    pub environment: Environment,
    pub account_id: String,
    pub region: String,
    pub provisioned_concurrency: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttling_override: Option<u64>,
    pub flags: StageFlags,
    /// Resolved provider endpoints, copied in at build time.
    pub providers: ProviderMap,
}

impl StageDescriptor {
    /// Build a descriptor from an environment spec and a resolved provider
    /// map.
    ///
    /// Pure: no side effects beyond logging. Fails if a field the target
    /// environment declares mandatory is missing.
    pub fn build(spec: &EnvironmentSpec, providers: &ProviderMap) -> Result<Self> {
        for field in spec.environment.required_fields() {
            let present = match field {
                RequiredField::InternalApiKeyRef => spec.flags.internal_api_key_ref.is_some(),
                RequiredField::ChatbotChannelRef => spec.flags.chatbot_channel_ref.is_some(),
            };
            if !present {
                return Err(TopologyError::IncompleteConfiguration {
                    environment: spec.environment.to_string(),
                    field: field.name(),
                });
            }
        }

        tracing::debug!(
            environment = %spec.environment,
            region = %spec.region,
            concurrency = spec.provisioned_concurrency,
            providers = providers.len(),
            "stage descriptor built"
        );

        Ok(Self {
            environment: spec.environment,
            account_id: spec.account_id.clone(),
            region: spec.region.clone(),
            provisioned_concurrency: spec.provisioned_concurrency,
            throttling_override: spec.throttling_override,
            flags: spec.flags.clone(),
            providers: providers.clone(),
        })
    }

    /// Stage name in the form `<environment>-<region>`.
    pub fn stage_name(&self) -> String {
        format!("{}-{}", self.environment, self.region)
    }

    /// Deterministic SHA-256 over the serialized descriptor.
    ///
    /// Identical configuration always hashes identically; the JSON
    /// serialization keeps map keys sorted.
    pub fn config_hash(&self) -> String {
        let json = serde_json::to_string(self)
            .expect("stage descriptor serialization should never fail");

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        hex::encode(hasher.finalize())
    }
}
