//! stagehand builds a gated, multi-environment release pipeline from one
//! declarative topology definition.

mod cli;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use url::Url;

use cli::Cli;
use stagehand_topology::{
    EnvSecrets, FailureEvent, LogChannel, NotificationChannel, Notifier, ProcessGateExecutor,
    ProcessProvisioner, TopologyBuilder, TopologyConfig, WebhookChannel,
};

/// Notification channel selected at startup.
enum Channel {
    Webhook(WebhookChannel),
    Log(LogChannel),
}

impl NotificationChannel for Channel {
    async fn dispatch(&self, event: &FailureEvent) -> Result<()> {
        match self {
            Channel::Webhook(webhook) => webhook.dispatch(event).await,
            Channel::Log(log) => log.dispatch(event).await,
        }
    }
}

/// Layer the topology configuration: embedded defaults, then the TOML file
/// (if any), then STAGEHAND_* environment overrides.
fn load_config(cli: &Cli) -> Result<TopologyConfig> {
    let mut figment = Figment::from(Serialized::defaults(TopologyConfig::default()));

    if let Some(config_path) = &cli.config {
        let path = PathBuf::from(config_path);
        let file = if path.is_dir() {
            path.join(stagehand_topology::TOPOLOGY_CONF_FILENAME)
        } else {
            path
        };
        if !file.exists() {
            anyhow::bail!("Configuration file not found: {}", file.display());
        }
        figment = figment.merge(Toml::file(file));
    }

    figment
        .merge(Env::prefixed("STAGEHAND_TOPOLOGY_"))
        .extract()
        .context("Failed to load topology configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let mut config = load_config(&cli)?;

    if let Some(name) = &cli.name {
        config.name = name.clone();
    }
    if let Some(deploy_command) = &cli.deploy_command {
        config.deploy_command = Some(deploy_command.clone());
    }
    if let Some(webhook_url) = &cli.webhook_url {
        config.webhook_url = Some(webhook_url.clone());
    }

    if let Some(save_path) = &cli.save_config {
        let path = PathBuf::from(save_path);
        config.save_to_file(&path)?;
        return Ok(());
    }

    // Resolve provider endpoints before anything else; a missing required
    // endpoint must abort the build with zero provisioning side effects.
    let providers = config
        .provider_registry(cli.sandbox)
        .resolve(&EnvSecrets)?;

    let mut builder = TopologyBuilder::new(&config.name, providers)
        .stages(config.environments.iter().cloned())
        .gate_commands(config.gate.commands.iter().cloned())
        .gate_secrets(config.gate.required_secrets.iter().cloned());

    if let Some(attempts) = cli.probe_attempts {
        builder = builder.probe_attempts(attempts);
    }

    let mut pipeline = builder.build()?;

    if cli.plan {
        println!("{}", render::plan_table(&config, &pipeline));
        return Ok(());
    }

    let deploy_command = config.deploy_command.clone().context(
        "No deploy command configured; set deploy_command in Stagehand.toml or pass --deploy-command",
    )?;

    let channel = match &config.webhook_url {
        Some(raw) => {
            let url = Url::parse(raw).context(format!("Invalid webhook URL: {raw}"))?;
            Channel::Webhook(WebhookChannel::new(url))
        }
        None => Channel::Log(LogChannel),
    };
    let mut notifier = Notifier::new(channel);

    let mut provisioner = ProcessProvisioner::new(deploy_command);
    let mut gate_executor = ProcessGateExecutor;

    tracing::info!(
        pipeline = %pipeline.id,
        stages = pipeline.stages().len(),
        "executing release pipeline"
    );

    let report = pipeline
        .execute(&mut provisioner, &mut gate_executor, &EnvSecrets, &mut notifier)
        .await;

    println!("{}", render::report_table(&report));

    if let Some(failure) = report.failure {
        return Err(failure).context("Pipeline run failed");
    }
    Ok(())
}
