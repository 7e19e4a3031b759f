//! Stratus CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Resolution failure (invalid topology, missing producer, cycle, ...)
//! - 4: Deployment failure

use std::process::ExitCode;

use clap::Parser;
use stratus_core::CoreError;
use stratus_topology::TopologyError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const RESOLUTION_FAILURE: u8 = 3;
    pub const DEPLOYMENT_FAILURE: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so plan output stays machine-readable
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(cli.verbose, cli.quiet)));
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let log_result = if cli.log_json {
        tracing_subscriber::registry().with(fmt_layer.json()).with(filter).try_init()
    } else {
        tracing_subscriber::registry().with(fmt_layer).with(filter).try_init()
    };

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let config = cli.config.clone();
    let result = match cli.command {
        Commands::Validate(args) => commands::validate::execute(args).await,
        Commands::Plan(args) => commands::plan::execute(args).await,
        Commands::Synth(args) => commands::synth::execute(args, config.as_deref()).await,
        Commands::Exports(args) => commands::exports::execute(args, config.as_deref()).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Filter used when `RUST_LOG` is unset.
fn default_directives(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "warn"
    } else if verbose {
        "stratus=debug,info"
    } else {
        "stratus=info,warn"
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(core) = cause.downcast_ref::<CoreError>() {
            return categorize_core(core);
        }
        if let Some(topology) = cause.downcast_ref::<TopologyError>() {
            return match topology {
                TopologyError::UnknownStack(_) => ExitCodes::INVALID_ARGS,
                TopologyError::Core(core) => categorize_core(core),
                TopologyError::ProvisionFailed { .. } => ExitCodes::DEPLOYMENT_FAILURE,
                other if other.is_manifest_error() => ExitCodes::RESOLUTION_FAILURE,
                _ => ExitCodes::GENERAL_ERROR,
            };
        }
        if cause.downcast_ref::<clap::Error>().is_some() {
            return ExitCodes::INVALID_ARGS;
        }
    }
    ExitCodes::GENERAL_ERROR
}

fn categorize_core(e: &CoreError) -> u8 {
    match e {
        CoreError::Halted { .. } | CoreError::Provider { .. } | CoreError::InvalidOutput { .. } => {
            ExitCodes::DEPLOYMENT_FAILURE
        }
        CoreError::Config(_) => ExitCodes::INVALID_ARGS,
        // Preflight failures: nothing was created
        CoreError::ExportNotFound(_) | CoreError::TypeMismatch { .. } => ExitCodes::RESOLUTION_FAILURE,
        other if other.is_resolution_error() => ExitCodes::RESOLUTION_FAILURE,
        _ => ExitCodes::GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(default_directives(false, false), "stratus=info,warn");
        assert_eq!(default_directives(true, false), "stratus=debug,info");
        assert_eq!(default_directives(false, true), "warn");
        assert_eq!(default_directives(true, true), "warn");
    }

    #[test]
    fn test_categorize_resolution_errors() {
        let err = anyhow::Error::new(CoreError::CyclicDependency {
            cycle: vec!["Network".to_string(), "Service".to_string()],
        });
        assert_eq!(categorize_error(&err), ExitCodes::RESOLUTION_FAILURE);

        let err = anyhow::Error::new(CoreError::ExportNotFound("SkillShiftVpcId".to_string()));
        assert_eq!(categorize_error(&err), ExitCodes::RESOLUTION_FAILURE);
    }

    #[test]
    fn test_categorize_through_context() {
        let err = anyhow::Error::new(CoreError::Provider {
            stack: "Cluster".to_string(),
            message: "quota".to_string(),
        })
        .context("Deployment failed");
        assert_eq!(categorize_error(&err), ExitCodes::DEPLOYMENT_FAILURE);
    }

    #[test]
    fn test_categorize_topology_errors() {
        let err = anyhow::Error::new(TopologyError::UnknownStack("Database".to_string()));
        assert_eq!(categorize_error(&err), ExitCodes::INVALID_ARGS);

        let err = anyhow::Error::new(TopologyError::InvalidManifest("empty".to_string()));
        assert_eq!(categorize_error(&err), ExitCodes::RESOLUTION_FAILURE);

        let err = anyhow::anyhow!("something else");
        assert_eq!(categorize_error(&err), ExitCodes::GENERAL_ERROR);
    }
}
