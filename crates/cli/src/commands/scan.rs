use cloudscope_core::config::LoadOptions;
use cloudscope_core::domain::resource::ResourceKind;
use cloudscope_core::domain::snapshot::{InventorySnapshot, KindOutcome};
use cloudscope_core::orchestrator::ScanOrchestrator;
use cloudscope_core::provider::ProviderSet;

use crate::commands::{
    aws_providers, build_runtime, load_config, CommandResult, EXIT_CLOUD_PROVIDER,
};

const COMMAND: &str = "scan";

pub fn run(options: &LoadOptions, json_output: bool) -> CommandResult {
    let config = match load_config(COMMAND, options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    runtime.block_on(async {
        let providers = aws_providers(&config).await;
        execute(&providers, json_output).await
    })
}

/// Partial snapshots succeed; only a scan where every kind failed exits non-zero.
pub async fn execute(providers: &ProviderSet, json_output: bool) -> CommandResult {
    let snapshot = ScanOrchestrator::new(providers).scan_all().await;
    let exit_code =
        if snapshot.failures().len() == ResourceKind::ALL.len() { EXIT_CLOUD_PROVIDER } else { 0 };

    if json_output {
        return CommandResult::json(COMMAND, &snapshot, exit_code);
    }
    CommandResult { exit_code, output: render_human(&snapshot) }
}

fn render_human(snapshot: &InventorySnapshot) -> String {
    let mut lines = vec![format!(
        "inventory captured at {}: {} resources",
        snapshot.captured_at.to_rfc3339(),
        snapshot.resource_count()
    )];
    lines.push(kind_line(ResourceKind::Compute, &snapshot.compute));
    lines.push(kind_line(ResourceKind::Storage, &snapshot.storage));
    lines.push(kind_line(ResourceKind::Database, &snapshot.database));
    lines.push(kind_line(ResourceKind::LoadBalancer, &snapshot.load_balancers));
    lines.join("\n")
}

fn kind_line<T>(kind: ResourceKind, outcome: &KindOutcome<T>) -> String {
    match outcome {
        KindOutcome::Scanned { items } => format!("- [ok] {kind}: {}", items.len()),
        KindOutcome::Failed { error } => format!("- [fail] {kind}: {error}"),
    }
}
