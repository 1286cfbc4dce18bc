//! Topology builder and release pipeline.
//!
//! The builder expands an ordered list of environment specs into a
//! [`Pipeline`] of stages, one gate per stage. Descriptor validation is
//! fail-fast and happens entirely before provisioning, so configuration
//! errors can never leave a partially provisioned topology behind.
//! Execution is strictly sequential: stage N+1 is not provisioned until
//! stage N's gate has passed.

use std::collections::BTreeSet;

use rand::Rng;
use url::Url;

use crate::error::{Result, TopologyError};
use crate::gate::{GateExecutor, GateState, VerificationGate};
use crate::notify::{FailureEvent, NotificationChannel, Notifier};
use crate::probe;
use crate::providers::ProviderMap;
use crate::secrets::SecretSource;
use crate::stage::{EnvironmentSpec, StageDescriptor};
use crate::unit::{DeploymentUnit, Provisioner};

/// One stage of the release pipeline: a planned deployment unit plus its
/// bound verification gate.
#[derive(Debug)]
pub struct PipelineStage {
    pub name: String,
    /// Taken when the unit is instantiated.
    descriptor: Option<StageDescriptor>,
    /// Populated exactly once, after provisioning completes.
    pub unit: Option<DeploymentUnit>,
    pub gate: VerificationGate,
}

impl PipelineStage {
    pub fn descriptor(&self) -> Option<&StageDescriptor> {
        self.descriptor.as_ref()
    }
}

/// Terminal status of a stage after a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum StageStatus {
    Passed,
    ProvisioningFailed,
    GateFailed,
    /// An earlier stage halted the pipeline before this one ran.
    NotReached,
}

/// Per-stage result recorded in the execution report.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub stage: String,
    pub status: StageStatus,
    pub endpoint: Option<Url>,
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct ExecutionReport {
    pub pipeline_id: String,
    pub stages: Vec<StageOutcome>,
    /// The failure that halted the run, if any.
    pub failure: Option<TopologyError>,
}

impl ExecutionReport {
    /// Whether every stage provisioned and its gate passed.
    pub fn healthy(&self) -> bool {
        self.failure.is_none()
            && self
                .stages
                .iter()
                .all(|s| s.status == StageStatus::Passed)
    }
}

/// Ordered release pipeline over a set of environments.
///
/// Stage order is promotion order: a later stage is unreachable until every
/// earlier gate has passed.
#[derive(Debug)]
pub struct Pipeline {
    /// Unique id for this run, `<name>-<random hex>`.
    pub id: String,
    pub name: String,
    stages: Vec<PipelineStage>,
    probe_attempts: usize,
}

impl Pipeline {
    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    /// Execute the pipeline: provision, probe, and gate each stage in order.
    ///
    /// Halts on the first provisioning failure or failed gate, emitting one
    /// [`FailureEvent`] through the notifier. Never panics; the terminal
    /// error is carried in the report.
    pub async fn execute<P, E, S, C>(
        &mut self,
        provisioner: &mut P,
        gate_executor: &mut E,
        secrets: &S,
        notifier: &mut Notifier<C>,
    ) -> ExecutionReport
    where
        P: Provisioner,
        E: GateExecutor,
        S: SecretSource,
        C: NotificationChannel,
    {
        let mut outcomes: Vec<StageOutcome> = Vec::with_capacity(self.stages.len());
        let mut failure: Option<TopologyError> = None;

        for index in 0..self.stages.len() {
            if failure.is_some() {
                outcomes.push(StageOutcome {
                    stage: self.stages[index].name.clone(),
                    status: StageStatus::NotReached,
                    endpoint: None,
                });
                continue;
            }

            let name = self.stages[index].name.clone();
            tracing::info!(pipeline = %self.id, stage = %name, position = index, "entering stage");

            match self.run_stage(index, provisioner, gate_executor, secrets).await {
                Ok(endpoint) => {
                    outcomes.push(StageOutcome {
                        stage: name,
                        status: StageStatus::Passed,
                        endpoint: Some(endpoint),
                    });
                }
                Err(err) => {
                    let status = match err {
                        TopologyError::GateFailed { .. } => StageStatus::GateFailed,
                        _ => StageStatus::ProvisioningFailed,
                    };
                    let endpoint = self.stages[index].unit.as_ref().map(|u| u.endpoint.clone());
                    outcomes.push(StageOutcome {
                        stage: name.clone(),
                        status,
                        endpoint,
                    });

                    notifier
                        .on_failure(FailureEvent::new(&self.id, &name, err.to_string()))
                        .await;
                    failure = Some(err);
                }
            }
        }

        if failure.is_none() {
            tracing::info!(pipeline = %self.id, stages = self.stages.len(), "pipeline healthy");
        }

        ExecutionReport {
            pipeline_id: self.id.clone(),
            stages: outcomes,
            failure,
        }
    }

    /// Provision one stage, wait for its endpoint, and run its gate.
    async fn run_stage<P, E, S>(
        &mut self,
        index: usize,
        provisioner: &mut P,
        gate_executor: &mut E,
        secrets: &S,
    ) -> Result<Url>
    where
        P: Provisioner,
        E: GateExecutor,
        S: SecretSource,
    {
        let stage = &mut self.stages[index];
        let name = stage.name.clone();

        // A consumed descriptor means this stage already ran; its gate state
        // says how that ended.
        let Some(descriptor) = stage.descriptor.take() else {
            return Err(TopologyError::GateAlreadyTerminal {
                stage: name,
                state: stage.gate.state(),
            });
        };

        let unit = DeploymentUnit::instantiate(descriptor, provisioner).await?;
        let endpoint = unit.endpoint.clone();
        stage.unit = Some(unit);

        if self.probe_attempts > 0 {
            let client = probe::create_client().map_err(|e| TopologyError::Provisioning {
                stage: name.clone(),
                reason: format!("{e:#}"),
            })?;
            probe::wait_until_ready(&client, &endpoint, self.probe_attempts)
                .await
                .map_err(|e| TopologyError::Provisioning {
                    stage: name.clone(),
                    reason: format!("{e:#}"),
                })?;
        }

        let stage = &mut self.stages[index];
        stage.gate.run(gate_executor, endpoint.clone(), secrets).await?;
        debug_assert_eq!(stage.gate.state(), GateState::Passed);

        Ok(endpoint)
    }
}

/// Composes environment specs into an ordered, gated [`Pipeline`].
#[derive(Debug, Clone)]
pub struct TopologyBuilder {
    name: String,
    providers: ProviderMap,
    specs: Vec<EnvironmentSpec>,
    gate_commands: Vec<String>,
    gate_secrets: BTreeSet<String>,
    probe_attempts: usize,
}

impl TopologyBuilder {
    pub fn new(name: impl Into<String>, providers: ProviderMap) -> Self {
        Self {
            name: name.into(),
            providers,
            specs: Vec::new(),
            gate_commands: Vec::new(),
            gate_secrets: BTreeSet::new(),
            probe_attempts: probe::DEFAULT_PROBE_ATTEMPTS,
        }
    }

    /// Append one environment. Call order defines promotion order.
    pub fn stage(mut self, spec: EnvironmentSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Append several environments, preserving their order.
    pub fn stages(mut self, specs: impl IntoIterator<Item = EnvironmentSpec>) -> Self {
        self.specs.extend(specs);
        self
    }

    /// Commands every stage's verification gate must pass, in order.
    pub fn gate_commands(mut self, commands: impl IntoIterator<Item = String>) -> Self {
        self.gate_commands = commands.into_iter().collect();
        self
    }

    /// Secret keys resolved into each gate command's environment.
    pub fn gate_secrets(mut self, secrets: impl IntoIterator<Item = String>) -> Self {
        self.gate_secrets = secrets.into_iter().collect();
        self
    }

    /// Readiness probe attempts per stage; 0 disables the probe.
    pub fn probe_attempts(mut self, attempts: usize) -> Self {
        self.probe_attempts = attempts;
        self
    }

    /// Build the pipeline.
    ///
    /// Builds every stage descriptor in declared order and fails fast on
    /// the first incomplete environment: later environments are not
    /// attempted, and nothing has been provisioned yet.
    pub fn build(self) -> Result<Pipeline> {
        let id = format!("{}-{:08x}", self.name, rand::rng().random::<u32>());
        let mut stages = Vec::with_capacity(self.specs.len());

        for spec in &self.specs {
            let descriptor = StageDescriptor::build(spec, &self.providers)?;
            let name = descriptor.stage_name();
            let gate = VerificationGate::new(
                name.clone(),
                self.gate_commands.clone(),
                self.gate_secrets.clone(),
            );

            stages.push(PipelineStage {
                name,
                descriptor: Some(descriptor),
                unit: None,
                gate,
            });
        }

        tracing::info!(pipeline = %id, stages = stages.len(), "topology built");

        Ok(Pipeline {
            id,
            name: self.name,
            stages,
            probe_attempts: self.probe_attempts,
        })
    }
}
