//! CLI command definitions.
//!
//! This module defines the command structure for the Stratus CLI and the
//! loading helpers the commands share.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use stratus_core::PlannerConfig;
use stratus_topology::{reference_topology, Environment, Topology};
use tracing::debug;

pub mod exports;
pub mod plan;
pub mod synth;
pub mod validate;

/// Configuration file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "stratus.toml";

/// Stratus - stack dependency planner for multi-tier cloud topologies
#[derive(Parser)]
#[command(name = "stratus")]
#[command(version, about = "Stratus - stack dependency planner for multi-tier cloud topologies")]
#[command(long_about = r#"
Stratus orders infrastructure stacks by the resources they require and
produce, passes resources between stacks by in-run handoff or named export,
and rejects cycles, ambiguity and export collisions before anything is
created.

COMMANDS:
  validate  → Validate a topology manifest and resolve its plan
  plan      → Print the deployment order and phases
  synth     → Run the plan against the simulated provider
  exports   → List the persisted export table

Without --topology, commands use the built-in reference topology.

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Resolution failure
  4 - Deployment failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Planner configuration file (defaults to ./stratus.toml when present)
    #[arg(short, long, global = true, env = "STRATUS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a topology manifest and resolve its plan
    Validate(validate::ValidateArgs),

    /// Print the deployment plan
    Plan(plan::PlanArgs),

    /// Provision the topology with the simulated provider
    Synth(synth::SynthArgs),

    /// List published exports
    Exports(exports::ExportsArgs),
}

/// Output format for commands that print structured data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Load the topology at `path`, or the reference topology, restricted to
/// `stacks` when any are given.
pub fn load_topology(path: Option<&Path>, stacks: &[String]) -> Result<Topology> {
    let topology = match path {
        Some(path) => Topology::from_file(path)
            .with_context(|| format!("Failed to load topology from {}", path.display()))?,
        None => {
            debug!("No topology given, using the reference topology");
            reference_topology(Environment::default())?
        }
    };

    if stacks.is_empty() {
        Ok(topology)
    } else {
        Ok(topology.select(stacks)?)
    }
}

/// Load planner configuration from `path`, `./stratus.toml`, or defaults.
pub fn load_config(path: Option<&Path>) -> Result<PlannerConfig> {
    match path {
        Some(path) => PlannerConfig::from_file(path)
            .with_context(|| format!("Failed to read config {}", path.display())),
        None => {
            let local = Path::new(DEFAULT_CONFIG_FILE);
            if local.exists() {
                debug!("Using {}", DEFAULT_CONFIG_FILE);
                Ok(PlannerConfig::from_file(local)?)
            } else {
                Ok(PlannerConfig::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_reference_topology_selection() {
        let topology = load_topology(None, &["Network".to_string(), "Cluster".to_string()]).unwrap();
        assert_eq!(topology.stack_ids(), vec!["Network", "Cluster"]);
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stratus.toml");
        std::fs::write(&path, "state_dir = \"/tmp/stratus-state\"\npersist = false\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.state_dir, PathBuf::from("/tmp/stratus-state"));
        assert!(!config.persist);
    }

    #[test]
    fn test_load_topology_missing_file() {
        let err = load_topology(Some(Path::new("/nonexistent/topology.yaml")), &[]).unwrap_err();
        assert!(err.to_string().contains("Failed to load topology"));
    }
}
