//! Synth command - Provision a topology with the simulated provider.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use stratus_core::{DeploymentReport, ProvisioningPlanner, ResourceRegistry};
use stratus_topology::{Environment, SimulatedProvider};
use tracing::{info, warn};

use super::{load_config, load_topology};

#[derive(Args)]
pub struct SynthArgs {
    /// Topology manifest (YAML)
    #[arg(short, long, env = "STRATUS_TOPOLOGY")]
    topology: Option<PathBuf>,

    /// Deploy only these stacks (repeatable)
    #[arg(short, long = "stack")]
    stacks: Vec<String>,

    /// Directory holding the export table and run logs
    #[arg(long, env = "STRATUS_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Override the topology's account
    #[arg(long)]
    account: Option<String>,

    /// Override the topology's region
    #[arg(long)]
    region: Option<String>,

    /// Keep exports and run logs in memory only
    #[arg(long)]
    no_persist: bool,
}

pub async fn execute(args: SynthArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = args.state_dir {
        config = config.with_state_dir(dir);
    }
    if args.no_persist {
        config.persist = false;
    }

    let mut topology = load_topology(args.topology.as_deref(), &args.stacks)?;
    if args.account.is_some() || args.region.is_some() {
        let current = topology.environment().clone();
        topology = topology.with_environment(Environment::new(
            args.account.unwrap_or(current.account),
            args.region.unwrap_or(current.region),
        ));
    }
    if config.run_label.is_none() {
        config = config.with_run_label(topology.name());
    }

    let provider = SimulatedProvider::new(topology.environment().clone());
    let catalog = topology.catalog(Arc::new(provider.clone()))?;
    let planner = ProvisioningPlanner::new(Arc::new(catalog), config.clone());

    // Ctrl-C stops the run before the next stack starts
    let cancel = planner.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current stack");
            cancel.cancel();
        }
    });

    println!(
        "🏗️  Synthesizing '{}' into {} ({} stacks)",
        topology.name(),
        topology.environment(),
        topology.stack_ids().len()
    );

    let mut registry = ResourceRegistry::new();
    let report = match planner.deploy(&mut registry).await {
        Ok(report) => report,
        Err(e) => {
            if let Some(report) = e.report() {
                print_report(report);
                if config.persist {
                    println!("   Run log: {}", report.log_path(&config.runs_dir()).display());
                }
            }
            return Err(e).context("Deployment failed");
        }
    };

    print_report(&report);
    for resource in registry.resources() {
        println!("   📦 {} ({})", resource.id(), resource.kind());
        for (name, value) in resource.attributes() {
            println!("        {} = {}", name, value);
        }
    }

    if config.persist {
        println!();
        println!("   Exports: {}", config.exports_path().display());
        println!("   Run log: {}", report.log_path(&config.runs_dir()).display());
    }
    info!("Simulated provider handled {} requests", provider.request_count());

    Ok(())
}

fn print_report(report: &DeploymentReport) {
    println!();
    for outcome in &report.completed {
        let exports = if outcome.exports.is_empty() {
            String::new()
        } else {
            format!(" exports: {}", outcome.exports.join(", "))
        };
        println!("   ✅ {} ({} resources){}", outcome.stack, outcome.resources.len(), exports);
    }
    if let Some(failed) = &report.failed_stack {
        println!("   ❌ {}: {}", failed, report.error.as_deref().unwrap_or("failed"));
    }
    for pending in &report.pending {
        println!("   ⏸️  {} (not started)", pending);
    }
    println!();
    println!("Run {}: {:?}", report.run_id, report.state);
}
