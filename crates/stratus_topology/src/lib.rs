//! # stratus_topology
//!
//! Declarative topologies for Stratus.
//!
//! A topology manifest lists stacks, the resources each one creates and the
//! inputs those resources take from other stacks. This crate validates
//! manifests, turns their entries into [`stratus_core::Stack`]
//! implementations and provides the resource provider boundary along with a
//! simulated provider.

pub mod error;
pub mod manifest;
pub mod policy;
pub mod provider;
pub mod simulated;
pub mod stacks;
pub mod topology;

pub use error::{TopologyError, TopologyResult};
pub use manifest::{
    ExportDecl, InputRef, InputTarget, ResourceDecl, StackManifest, TopologyManifest, IDENTIFIER_PATTERN,
};
pub use policy::{ReferenceMode, ReferencePolicy};
pub use provider::{Environment, ProvisionRequest, ResourceProvider};
pub use simulated::SimulatedProvider;
pub use stacks::DeclaredStack;
pub use topology::{reference_topology, Topology};
