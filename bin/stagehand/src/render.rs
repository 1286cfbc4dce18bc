//! Table rendering for plan and report output.

use comfy_table::{Cell, Table, presets::UTF8_FULL};

use stagehand_topology::{ExecutionReport, Pipeline, StageStatus, TopologyConfig};

/// Render the planned topology: one row per stage, in promotion order.
pub fn plan_table(config: &TopologyConfig, pipeline: &Pipeline) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "#",
        "Stage",
        "Account",
        "Region",
        "Concurrency",
        "Providers",
        "Gate commands",
    ]);

    for (index, stage) in pipeline.stages().iter().enumerate() {
        // Descriptors are always present pre-execution.
        let Some(descriptor) = stage.descriptor() else {
            continue;
        };
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(&stage.name),
            Cell::new(&descriptor.account_id),
            Cell::new(&descriptor.region),
            Cell::new(descriptor.provisioned_concurrency),
            Cell::new(descriptor.providers.len()),
            Cell::new(config.gate.commands.join(" && ")),
        ]);
    }

    table
}

/// Render the outcome of a pipeline run.
pub fn report_table(report: &ExecutionReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Stage", "Status", "Endpoint"]);

    for outcome in &report.stages {
        let endpoint = outcome
            .endpoint
            .as_ref()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "-".to_string());
        let status = match outcome.status {
            StageStatus::Passed => "passed",
            StageStatus::ProvisioningFailed => "provisioning failed",
            StageStatus::GateFailed => "gate failed",
            StageStatus::NotReached => "not reached",
        };
        table.add_row(vec![
            Cell::new(&outcome.stage),
            Cell::new(status),
            Cell::new(endpoint),
        ]);
    }

    table
}
