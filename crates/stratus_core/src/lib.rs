//! # stratus_core
//!
//! Stack dependency resolution and cross-stack reference engine for Stratus.
//!
//! This crate decides in which order infrastructure stacks are provisioned,
//! how one stack's resources reach another stack's inputs, and how export
//! collisions and circular references are rejected before anything is
//! created.
//!
//! # Architecture
//!
//! - **Registry**: Every resource created during a run, keyed by id
//! - **Stacks**: Units of provisioning with static `requires`/`produces`
//! - **Resolver**: Orders stacks into a deterministic deployment plan
//! - **Broker**: Resolves inputs by in-run handoff or named export
//! - **Planner**: Runs the plan, registering resources and publishing exports
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stratus_core::{PlannerConfig, ProvisioningPlanner, ResourceRegistry, StackCatalog};
//!
//! let catalog = StackCatalog::from_stacks(vec![
//!     Arc::new(NetworkStack) as Arc<dyn Stack>,
//!     Arc::new(ClusterStack),
//! ])?;
//!
//! let planner = ProvisioningPlanner::new(Arc::new(catalog), PlannerConfig::default());
//! let plan = planner.plan()?;
//! println!("{}", plan.order().join(" -> "));
//!
//! let mut registry = ResourceRegistry::new();
//! let report = planner.deploy(&mut registry).await?;
//! ```

pub mod broker;
pub mod catalog;
pub mod config;
pub mod error;
pub mod exports;
pub mod plan;
pub mod planner;
pub mod registry;
pub mod resolver;
pub mod resource;
pub mod selector;
pub mod stack;

// Re-export main types for convenience
pub use broker::ReferenceBroker;
pub use catalog::StackCatalog;
pub use config::{PlannerConfig, DEFAULT_STATE_DIR};
pub use error::{CoreError, CoreResult, ProvisioningError};
pub use exports::{exports_path, ExportRecord, ExportTable};
pub use plan::{DeploymentPlan, InputSource, PlanDiff, PlannedInput, PlannedStack};
pub use planner::{CancelHandle, DeploymentReport, ProvisioningPlanner, RunState, StackOutcome};
pub use registry::ResourceRegistry;
pub use resolver::DependencyResolver;
pub use resource::{Attributes, Resource, ResourceKind};
pub use selector::{ResourceSelector, SelectorSource};
pub use stack::{Bindings, ExportDeclaration, Stack};
