//! Post-deployment verification gates.
//!
//! A gate is bound to one deployment unit and runs a command sequence
//! against the unit's endpoint. State machine:
//! `Pending -> Running -> { Passed, Failed }`. Terminal states are final;
//! there are no retries at this layer. A failed gate blocks every later
//! stage in the pipeline.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::future::Future;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, TopologyError};
use crate::secrets::SecretSource;

/// Verification gate lifecycle state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
pub enum GateState {
    Pending,
    Running,
    Passed,
    Failed,
}

impl GateState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GateState::Passed | GateState::Failed)
    }
}

/// Execution context handed to the gate executor for each command.
#[derive(Debug, Clone)]
pub struct GateContext {
    /// The bound unit's public endpoint.
    pub endpoint: Url,
    /// Environment for the command: the endpoint export plus every
    /// resolved required secret.
    pub env: BTreeMap<String, String>,
}

/// External collaborator that executes a single verification command.
///
/// Returns whether the command completed with a zero-equivalent success
/// signal. Retry policy, if any, lives here, not in the gate.
pub trait GateExecutor: Send {
    fn run_command(
        &mut self,
        command: &str,
        ctx: &GateContext,
    ) -> impl Future<Output = anyhow::Result<bool>> + Send;
}

/// Verification gate bound to one deployment unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationGate {
    /// Stage name of the unit this gate verifies.
    pub bound_stage: String,
    /// Commands that must all succeed, in order.
    pub command_sequence: Vec<String>,
    /// Secret keys resolved into the command environment.
    pub required_secrets: BTreeSet<String>,
    state: GateState,
}

impl VerificationGate {
    pub fn new(
        bound_stage: impl Into<String>,
        command_sequence: Vec<String>,
        required_secrets: BTreeSet<String>,
    ) -> Self {
        Self {
            bound_stage: bound_stage.into(),
            command_sequence,
            required_secrets,
            state: GateState::Pending,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Run the gate's command sequence against the bound unit's endpoint.
    ///
    /// Requiring the endpoint by value enforces the ordering dependency: a
    /// gate cannot enter `Running` before its unit's output exists. Every
    /// command must succeed for `Passed`; the first failure (or executor
    /// error) is terminal `Failed`. Re-running a terminal gate is an error.
    pub async fn run<E: GateExecutor>(
        &mut self,
        executor: &mut E,
        endpoint: Url,
        secrets: &impl SecretSource,
    ) -> Result<()> {
        if self.state.is_terminal() {
            return Err(TopologyError::GateAlreadyTerminal {
                stage: self.bound_stage.clone(),
                state: self.state,
            });
        }

        self.state = GateState::Running;
        tracing::info!(
            stage = %self.bound_stage,
            commands = self.command_sequence.len(),
            "verification gate running"
        );

        let mut env = BTreeMap::new();
        env.insert("ROUTING_API_URL".to_string(), endpoint.to_string());
        for key in &self.required_secrets {
            // Missing verification secrets fail at command time, not here.
            if let Some(value) = secrets.lookup(key) {
                env.insert(key.clone(), value);
            } else {
                tracing::warn!(%key, "required gate secret not available");
            }
        }

        let ctx = GateContext { endpoint, env };

        let commands = self.command_sequence.clone();
        for command in &commands {
            let passed = match executor.run_command(command, &ctx).await {
                Ok(passed) => passed,
                Err(e) => {
                    tracing::warn!(stage = %self.bound_stage, %command, error = %format!("{e:#}"), "gate command errored");
                    false
                }
            };

            if !passed {
                self.state = GateState::Failed;
                tracing::error!(stage = %self.bound_stage, %command, "verification gate failed");
                return Err(TopologyError::GateFailed {
                    stage: self.bound_stage.clone(),
                    reason: format!("command '{command}' did not succeed"),
                });
            }
        }

        self.state = GateState::Passed;
        tracing::info!(stage = %self.bound_stage, "verification gate passed");
        Ok(())
    }
}

/// Gate executor that shells each command out through `sh -c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessGateExecutor;

impl GateExecutor for ProcessGateExecutor {
    async fn run_command(&mut self, command: &str, ctx: &GateContext) -> anyhow::Result<bool> {
        let status = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .envs(&ctx.env)
            .status()
            .await?;
        Ok(status.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::StaticSecrets;

    /// Executor that scripts per-command results and records what ran.
    struct ScriptedExecutor {
        results: Vec<bool>,
        ran: Vec<String>,
        seen_env: BTreeMap<String, String>,
    }

    impl ScriptedExecutor {
        fn new(results: Vec<bool>) -> Self {
            Self {
                results,
                ran: Vec::new(),
                seen_env: BTreeMap::new(),
            }
        }
    }

    impl GateExecutor for ScriptedExecutor {
        async fn run_command(&mut self, command: &str, ctx: &GateContext) -> anyhow::Result<bool> {
            let result = self.results[self.ran.len()];
            self.ran.push(command.to_string());
            self.seen_env = ctx.env.clone();
            Ok(result)
        }
    }

    fn gate() -> VerificationGate {
        VerificationGate::new(
            "beta-us-east-2",
            vec!["npm ci".to_string(), "npm run test:e2e".to_string()],
            BTreeSet::from(["NPM_TOKEN".to_string()]),
        )
    }

    fn endpoint() -> Url {
        Url::parse("https://beta.api.example.com/").unwrap()
    }

    #[tokio::test]
    async fn all_commands_passing_reaches_passed() {
        let mut gate = gate();
        let mut executor = ScriptedExecutor::new(vec![true, true]);
        let secrets = StaticSecrets::new().with("NPM_TOKEN", "token");

        gate.run(&mut executor, endpoint(), &secrets).await.unwrap();

        assert_eq!(gate.state(), GateState::Passed);
        assert_eq!(executor.ran, vec!["npm ci", "npm run test:e2e"]);
        assert_eq!(
            executor.seen_env.get("ROUTING_API_URL").map(String::as_str),
            Some("https://beta.api.example.com/")
        );
        assert_eq!(
            executor.seen_env.get("NPM_TOKEN").map(String::as_str),
            Some("token")
        );
    }

    #[tokio::test]
    async fn first_failing_command_halts_sequence() {
        let mut gate = gate();
        let mut executor = ScriptedExecutor::new(vec![false, true]);

        let err = gate
            .run(&mut executor, endpoint(), &StaticSecrets::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TopologyError::GateFailed { .. }));
        assert_eq!(gate.state(), GateState::Failed);
        assert_eq!(executor.ran, vec!["npm ci"], "second command never runs");
    }

    #[tokio::test]
    async fn terminal_gate_cannot_rerun() {
        let mut gate = gate();
        let mut executor = ScriptedExecutor::new(vec![true, true]);
        gate.run(&mut executor, endpoint(), &StaticSecrets::new())
            .await
            .unwrap();

        let err = gate
            .run(&mut executor, endpoint(), &StaticSecrets::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TopologyError::GateAlreadyTerminal { .. }));
        assert_eq!(gate.state(), GateState::Passed, "terminal state unchanged");
    }

    #[tokio::test]
    async fn executor_error_counts_as_failure() {
        struct ErroringExecutor;
        impl GateExecutor for ErroringExecutor {
            async fn run_command(
                &mut self,
                _command: &str,
                _ctx: &GateContext,
            ) -> anyhow::Result<bool> {
                anyhow::bail!("executor unavailable")
            }
        }

        let mut gate = gate();
        let err = gate
            .run(&mut ErroringExecutor, endpoint(), &StaticSecrets::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TopologyError::GateFailed { .. }));
        assert_eq!(gate.state(), GateState::Failed);
    }
}
