use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(
    author,
    version,
    about = "Expand one application definition into a gated multi-environment release pipeline"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "STAGEHAND_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to an existing Stagehand.toml topology file (or a directory
    /// containing one).
    ///
    /// When provided, the topology is loaded from this file and layered
    /// under any STAGEHAND_TOPOLOGY_* environment overrides.
    #[arg(long, alias = "conf", env = "STAGEHAND_CONFIG")]
    pub config: Option<String>,

    /// A custom name for the pipeline. Stage identifiers derive from it.
    #[arg(short, long, env = "STAGEHAND_NAME")]
    pub name: Option<String>,

    /// Treat this build as a non-production sandbox.
    ///
    /// Missing required provider endpoints are tolerated (and logged)
    /// instead of failing the build.
    #[arg(long, env = "STAGEHAND_SANDBOX")]
    pub sandbox: bool,

    /// Render the planned topology as a table and exit without
    /// provisioning anything.
    #[arg(long, env = "STAGEHAND_PLAN")]
    pub plan: bool,

    /// The deploy command run once per stage by the process provisioner.
    ///
    /// The command receives the stage descriptor via STAGE_DESCRIPTOR
    /// (JSON) and must print the provisioned endpoint URL as its final
    /// stdout line.
    #[arg(long, env = "STAGEHAND_DEPLOY_COMMAND")]
    pub deploy_command: Option<String>,

    /// Webhook URL failure events are posted to.
    ///
    /// If not provided, failures are logged only.
    #[arg(long, env = "STAGEHAND_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Number of readiness-probe attempts per stage endpoint (0 disables
    /// the probe).
    #[arg(long, env = "STAGEHAND_PROBE_ATTEMPTS")]
    pub probe_attempts: Option<usize>,

    /// Write the effective topology configuration to this path and exit.
    #[arg(long, env = "STAGEHAND_SAVE_CONFIG")]
    pub save_config: Option<String>,
}
