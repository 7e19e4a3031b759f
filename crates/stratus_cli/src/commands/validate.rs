//! Validate command - Validate a topology and resolve its plan.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use stratus_core::DependencyResolver;
use stratus_topology::SimulatedProvider;
use tracing::info;

use super::load_topology;

#[derive(Args)]
pub struct ValidateArgs {
    /// Topology manifest (YAML)
    #[arg(short, long, env = "STRATUS_TOPOLOGY")]
    topology: Option<PathBuf>,
}

pub async fn execute(args: ValidateArgs) -> Result<()> {
    let topology = load_topology(args.topology.as_deref(), &[])?;
    info!("Validating topology '{}'", topology.name());

    println!("📋 Manifest '{}' is valid ({} stacks)", topology.name(), topology.stack_ids().len());

    // Declarations only; nothing is provisioned
    let catalog = topology.catalog(Arc::new(SimulatedProvider::new(topology.environment().clone())))?;
    let plan = DependencyResolver::new().resolve(&catalog)?;

    println!("✅ Dependencies resolve: {}", plan.order().join(" -> "));
    let external = plan.external_inputs();
    if !external.is_empty() {
        println!("⚠️  {} input(s) rely on exports from previous runs:", external.len());
        for (stack, input) in external {
            println!("      - {}: {}", stack, input.selector);
        }
    }

    Ok(())
}
