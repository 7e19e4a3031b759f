//! Plan command - Print the deployment plan.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use stratus_core::{DeploymentPlan, DependencyResolver, InputSource, PlanDiff};
use stratus_topology::SimulatedProvider;
use tracing::info;

use super::{load_topology, OutputFormat};

#[derive(Args)]
pub struct PlanArgs {
    /// Topology manifest (YAML)
    #[arg(short, long, env = "STRATUS_TOPOLOGY")]
    topology: Option<PathBuf>,

    /// Restrict the plan to these stacks (repeatable)
    #[arg(short, long = "stack")]
    stacks: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Previously saved plan (JSON) to diff against
    #[arg(long)]
    previous: Option<PathBuf>,

    /// Save the plan as JSON
    #[arg(long)]
    save: Option<PathBuf>,
}

pub async fn execute(args: PlanArgs) -> Result<()> {
    let topology = load_topology(args.topology.as_deref(), &args.stacks)?;
    info!("Planning topology '{}'", topology.name());

    let catalog = topology.catalog(Arc::new(SimulatedProvider::new(topology.environment().clone())))?;
    let plan = DependencyResolver::new().resolve(&catalog)?;

    let diff = match &args.previous {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read previous plan {}", path.display()))?;
            let previous: DeploymentPlan = serde_json::from_str(&content)
                .with_context(|| format!("Invalid plan file {}", path.display()))?;
            Some(plan.diff(&previous))
        }
        None => None,
    };

    if let Some(path) = &args.save {
        fs::write(path, serde_json::to_string_pretty(&plan)?)
            .with_context(|| format!("Failed to write plan to {}", path.display()))?;
        info!("Saved plan to {:?}", path);
    }

    match args.format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "topology": topology.name(),
                "plan": plan,
                "diff": diff,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            print!("{}", render_plan(topology.name(), &plan));
            if let Some(diff) = &diff {
                print!("{}", render_diff(diff));
            }
        }
    }

    Ok(())
}

fn render_plan(name: &str, plan: &DeploymentPlan) -> String {
    let mut out = format!("📋 Plan for '{}' ({} stacks)\n\n", name, plan.len());

    for (i, stack) in plan.stacks().iter().enumerate() {
        let produces: Vec<&str> = stack.produces.iter().map(|k| k.as_str()).collect();
        out.push_str(&format!("  {}. {} [{}]\n", i + 1, stack.id, produces.join(", ")));

        for input in &stack.inputs {
            let from = match &input.source {
                InputSource::Stack(id) => format!("handoff from {}", id),
                InputSource::Export {
                    name,
                    publisher: Some(publisher),
                } => format!("export '{}' from {}", name, publisher),
                InputSource::Export { name, publisher: None } => format!("export '{}' (previous run)", name),
            };
            out.push_str(&format!("       <- {} ({})\n", input.selector.kind, from));
        }
        for export in &stack.exports {
            out.push_str(&format!(
                "       -> export '{}' ({}.{})\n",
                export.name,
                export.kind,
                export.attribute_name()
            ));
        }
    }

    out.push_str("\nPhases:\n");
    for (i, phase) in plan.phases().iter().enumerate() {
        out.push_str(&format!("  {}: {}\n", i + 1, phase.join(", ")));
    }
    out
}

fn render_diff(diff: &PlanDiff) -> String {
    if diff.is_empty() {
        return "\n✅ No changes from previous plan\n".to_string();
    }

    let mut out = String::from("\nChanges from previous plan:\n");
    for (label, ids) in [
        ("added", &diff.added),
        ("removed", &diff.removed),
        ("moved", &diff.moved),
        ("changed", &diff.changed),
    ] {
        if !ids.is_empty() {
            out.push_str(&format!("  {}: {}\n", label, ids.join(", ")));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_topology::{reference_topology, Environment};

    fn reference_plan(stacks: &[&str]) -> DeploymentPlan {
        let mut topology = reference_topology(Environment::default()).unwrap();
        if !stacks.is_empty() {
            topology = topology.select(stacks).unwrap();
        }
        let catalog = topology.catalog(Arc::new(SimulatedProvider::default())).unwrap();
        DependencyResolver::new().resolve(&catalog).unwrap()
    }

    #[test]
    fn test_render_plan() {
        let output = render_plan("skillshift", &reference_plan(&[]));

        assert!(output.contains("Plan for 'skillshift' (10 stacks)"));
        assert!(output.contains("  1. ApiConfig [parameter]"));
        assert!(output.contains("<- parameter (export 'SecretKeyParameter' from Secrets)"));
        assert!(output.contains("-> export 'ServiceLoadBalancerDns' (load_balancer.dnsName)"));
        assert!(output.contains("<- role (handoff from PipelineIam)"));
        assert!(output.contains("  3: KeycloakService, Service"));
    }

    #[test]
    fn test_render_diff() {
        let full = reference_plan(&[]);
        let partial = reference_plan(&["Network", "Cluster", "Ecr", "PipelineIam", "Pipeline"]);

        let diff = full.diff(&partial);
        let output = render_diff(&diff);
        assert!(output.contains("added: ApiConfig, Iam, KeycloakService, Secrets, Service"));
        assert!(!output.contains("removed"));

        assert!(render_diff(&full.diff(&full)).contains("No changes"));
    }
}
