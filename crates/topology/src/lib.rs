//! stagehand-topology - Multi-environment deployment topology builder.
//!
//! This crate expands one logical application definition into an ordered
//! release pipeline of environment-specific deployment units. Each stage
//! carries a fully resolved configuration snapshot and is followed by a
//! verification gate that must pass before the next environment is touched.
//! The compute service, infrastructure provisioning, secret storage, and
//! notification transport are all external collaborators behind traits.

mod config;
mod error;
mod gate;
mod notify;
mod pipeline;
pub mod probe;
mod providers;
mod secrets;
mod stage;
mod unit;

pub use config::{GateConfig, TOPOLOGY_CONF_FILENAME, TopologyConfig};
pub use error::{Result, TopologyError};
pub use gate::{GateContext, GateExecutor, GateState, ProcessGateExecutor, VerificationGate};
pub use notify::{FailureEvent, LogChannel, NotificationChannel, Notifier, WebhookChannel};
pub use pipeline::{
    ExecutionReport, Pipeline, PipelineStage, StageOutcome, StageStatus, TopologyBuilder,
};
pub use providers::{
    ACTIVE_GATEWAY_PROVIDERS, DISABLED_GATEWAY_PROVIDERS, NetworkId, ProviderMap,
    ProviderRegistry, SUPPORTED_NETWORKS,
};
pub use secrets::{EnvSecrets, SecretSource, StaticSecrets};
pub use stage::{
    Environment, EnvironmentSpec, ExternalServiceCredentials, RequiredField, StageDescriptor,
    StageFlags, StorageCredentials,
};
pub use unit::{DeploymentUnit, ProcessProvisioner, ProvisionOutcome, Provisioner};
