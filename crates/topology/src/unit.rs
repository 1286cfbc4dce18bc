//! Deployment units and the provisioning collaborator.
//!
//! The topology core never provisions infrastructure itself: it hands a
//! [`StageDescriptor`] to a [`Provisioner`] and captures the single endpoint
//! output the collaborator reports. Provisioning failures are not retried
//! here; idempotency belongs to the external system.

use std::future::Future;
use std::process::Stdio;

use anyhow::Context;
use url::Url;

use crate::error::{Result, TopologyError};
use crate::stage::StageDescriptor;

/// Outcome reported by the deployment collaborator.
#[derive(Debug, Clone, Default)]
pub struct ProvisionOutcome {
    pub success: bool,
    /// Public endpoint of the provisioned unit, when successful.
    pub endpoint_output: Option<String>,
    pub error: Option<String>,
}

impl ProvisionOutcome {
    pub fn ok(endpoint: impl Into<String>) -> Self {
        Self {
            success: true,
            endpoint_output: Some(endpoint.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            endpoint_output: None,
            error: Some(error.into()),
        }
    }
}

/// External collaborator that turns a stage descriptor into running
/// infrastructure.
pub trait Provisioner: Send {
    /// The name of this provisioner for logging/identification.
    const NAME: &'static str;

    /// Provision the unit described by `descriptor`.
    ///
    /// Transport-level failures may surface as errors; a deployment the
    /// collaborator itself rejected comes back as an unsuccessful
    /// [`ProvisionOutcome`].
    fn provision(
        &mut self,
        descriptor: &StageDescriptor,
    ) -> impl Future<Output = anyhow::Result<ProvisionOutcome>> + Send;
}

/// A provisioned deployment unit.
///
/// Owns its descriptor; the endpoint is populated exactly once, after
/// provisioning completes, and read-only thereafter.
#[derive(Debug, Clone)]
pub struct DeploymentUnit {
    /// Stable identifier: `<stage-name>-<first 8 hash chars>`.
    pub id: String,
    pub descriptor: StageDescriptor,
    /// The unit's single observable output.
    pub endpoint: Url,
}

impl DeploymentUnit {
    /// Instantiate a unit by delegating to the deployment collaborator.
    pub async fn instantiate<P: Provisioner>(
        descriptor: StageDescriptor,
        provisioner: &mut P,
    ) -> Result<Self> {
        let stage = descriptor.stage_name();

        tracing::info!(
            %stage,
            provisioner = P::NAME,
            config_hash = %&descriptor.config_hash()[..8],
            "provisioning deployment unit"
        );

        let outcome = provisioner
            .provision(&descriptor)
            .await
            .map_err(|e| TopologyError::Provisioning {
                stage: stage.clone(),
                reason: format!("{e:#}"),
            })?;

        if !outcome.success {
            return Err(TopologyError::Provisioning {
                stage,
                reason: outcome
                    .error
                    .unwrap_or_else(|| "collaborator reported failure without detail".to_string()),
            });
        }

        let raw_endpoint =
            outcome
                .endpoint_output
                .ok_or_else(|| TopologyError::Provisioning {
                    stage: stage.clone(),
                    reason: "collaborator reported success without an endpoint output".to_string(),
                })?;

        let endpoint = Url::parse(&raw_endpoint).map_err(|e| TopologyError::Provisioning {
            stage: stage.clone(),
            reason: format!("invalid endpoint output '{raw_endpoint}': {e}"),
        })?;

        let id = format!("{}-{}", stage, &descriptor.config_hash()[..8]);

        tracing::info!(unit_id = %id, %endpoint, "deployment unit ready");

        Ok(Self {
            id,
            descriptor,
            endpoint,
        })
    }
}

/// Provisioner that shells out to a configured deploy command.
///
/// The stage descriptor is exported to the child process as
/// `STAGE_DESCRIPTOR` (JSON) plus a few convenience variables; the
/// collaborator prints the provisioned endpoint URL as the final line of
/// stdout.
#[derive(Debug, Clone)]
pub struct ProcessProvisioner {
    command: String,
}

impl ProcessProvisioner {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Provisioner for ProcessProvisioner {
    const NAME: &'static str = "process";

    async fn provision(&mut self, descriptor: &StageDescriptor) -> anyhow::Result<ProvisionOutcome> {
        let descriptor_json =
            serde_json::to_string(descriptor).context("Failed to serialize stage descriptor")?;

        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("STAGE_DESCRIPTOR", descriptor_json)
            .env("STAGE_NAME", descriptor.stage_name())
            .env("STAGE_ACCOUNT", &descriptor.account_id)
            .env("STAGE_REGION", &descriptor.region)
            .env(
                "PROVISIONED_CONCURRENCY",
                descriptor.provisioned_concurrency.to_string(),
            )
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output()
            .await
            .context(format!("Failed to spawn deploy command '{}'", self.command))?;

        if !output.status.success() {
            return Ok(ProvisionOutcome::failed(format!(
                "deploy command exited with {}",
                output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match stdout.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(endpoint) => Ok(ProvisionOutcome::ok(endpoint.trim())),
            None => Ok(ProvisionOutcome::failed(
                "deploy command produced no endpoint output",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderMap;
    use crate::stage::{Environment, EnvironmentSpec, StageFlags};

    struct FixedProvisioner(ProvisionOutcome);

    impl Provisioner for FixedProvisioner {
        const NAME: &'static str = "fixed";

        async fn provision(
            &mut self,
            _descriptor: &StageDescriptor,
        ) -> anyhow::Result<ProvisionOutcome> {
            Ok(self.0.clone())
        }
    }

    fn beta_descriptor() -> StageDescriptor {
        let spec = EnvironmentSpec {
            environment: Environment::Beta,
            account_id: "000000000000".to_string(),
            region: "us-east-2".to_string(),
            provisioned_concurrency: 10,
            throttling_override: None,
            flags: StageFlags::default(),
        };
        StageDescriptor::build(&spec, &ProviderMap::default()).unwrap()
    }

    #[tokio::test]
    async fn captures_endpoint_output() {
        let mut provisioner =
            FixedProvisioner(ProvisionOutcome::ok("https://beta.api.example.com/prod/"));

        let unit = DeploymentUnit::instantiate(beta_descriptor(), &mut provisioner)
            .await
            .unwrap();

        assert!(unit.id.starts_with("beta-us-east-2-"));
        assert_eq!(unit.endpoint.host_str(), Some("beta.api.example.com"));
    }

    #[tokio::test]
    async fn collaborator_failure_surfaces_as_provisioning_error() {
        let mut provisioner = FixedProvisioner(ProvisionOutcome::failed("quota exceeded"));

        let err = DeploymentUnit::instantiate(beta_descriptor(), &mut provisioner)
            .await
            .unwrap_err();

        match err {
            TopologyError::Provisioning { stage, reason } => {
                assert_eq!(stage, "beta-us-east-2");
                assert!(reason.contains("quota exceeded"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn success_without_endpoint_is_an_error() {
        let mut provisioner = FixedProvisioner(ProvisionOutcome {
            success: true,
            endpoint_output: None,
            error: None,
        });

        let err = DeploymentUnit::instantiate(beta_descriptor(), &mut provisioner)
            .await
            .unwrap_err();
        assert!(matches!(err, TopologyError::Provisioning { .. }));
    }
}
