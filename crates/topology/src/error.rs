//! Error taxonomy for topology builds and pipeline execution.
//!
//! Configuration-layer errors ([`TopologyError::MissingProvider`],
//! [`TopologyError::IncompleteConfiguration`]) are raised before any
//! provisioning side effect occurs. Provisioning and gate errors belong to
//! pipeline execution and are surfaced through failure events rather than
//! crashing the orchestrator.

use thiserror::Error;

use crate::gate::GateState;

/// Errors raised by the topology core.
#[derive(Error, Debug)]
pub enum TopologyError {
    /// A required provider key resolved to nothing outside a sandbox context.
    #[error("required provider value missing or empty: {key}")]
    MissingProvider { key: String },

    /// An environment-mandatory descriptor field is absent.
    #[error("incomplete configuration for environment '{environment}': missing {field}")]
    IncompleteConfiguration {
        environment: String,
        field: &'static str,
    },

    /// The deployment collaborator reported failure for a stage.
    #[error("provisioning failed for stage '{stage}': {reason}")]
    Provisioning { stage: String, reason: String },

    /// A verification gate reached its `Failed` terminal state.
    #[error("verification gate failed for stage '{stage}': {reason}")]
    GateFailed { stage: String, reason: String },

    /// A gate in a terminal state was asked to run again.
    #[error("gate for stage '{stage}' is already terminal ({state})")]
    GateAlreadyTerminal { stage: String, state: GateState },
}

/// Result alias for topology operations.
pub type Result<T> = std::result::Result<T, TopologyError>;
