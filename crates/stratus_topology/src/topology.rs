//! Validated topologies and the shipped reference topology.

use std::path::Path;
use std::sync::Arc;

use stratus_core::{Stack, StackCatalog};
use tracing::debug;

use crate::error::{TopologyError, TopologyResult};
use crate::manifest::TopologyManifest;
use crate::provider::{Environment, ResourceProvider};
use crate::stacks::DeclaredStack;

const REFERENCE_MANIFEST: &str = include_str!("../../../topologies/reference.yaml");

/// A validated set of declared stacks.
#[derive(Debug, Clone)]
pub struct Topology {
    manifest: TopologyManifest,
}

impl Topology {
    /// Validate a manifest into a topology.
    pub fn new(manifest: TopologyManifest) -> TopologyResult<Self> {
        manifest.validate()?;
        Ok(Self { manifest })
    }

    pub fn from_file(path: &Path) -> TopologyResult<Self> {
        Self::new(TopologyManifest::from_file(path)?)
    }

    pub fn from_yaml(content: &str) -> TopologyResult<Self> {
        Self::new(TopologyManifest::from_yaml(content)?)
    }

    pub fn manifest(&self) -> &TopologyManifest {
        &self.manifest
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn environment(&self) -> &Environment {
        &self.manifest.environment
    }

    pub fn stack_ids(&self) -> Vec<&str> {
        self.manifest.stack_ids()
    }

    /// Replace the target environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.manifest.environment = environment;
        self
    }

    /// Build one stack per manifest entry, all sharing `provider`.
    pub fn stacks(&self, provider: Arc<dyn ResourceProvider>) -> Vec<Arc<dyn Stack>> {
        self.manifest
            .stacks
            .iter()
            .map(|s| Arc::new(DeclaredStack::new(s.clone(), Arc::clone(&provider))) as Arc<dyn Stack>)
            .collect()
    }

    /// Build a stack catalog for this topology.
    pub fn catalog(&self, provider: Arc<dyn ResourceProvider>) -> TopologyResult<StackCatalog> {
        Ok(StackCatalog::from_stacks(self.stacks(provider))?)
    }

    /// Restrict the topology to the given stacks, for independent
    /// deployment. Inputs pointing outside the selection must then come
    /// from exports published by earlier runs.
    pub fn select<S: AsRef<str>>(&self, ids: &[S]) -> TopologyResult<Self> {
        for id in ids {
            if self.manifest.stack(id.as_ref()).is_none() {
                return Err(TopologyError::UnknownStack(id.as_ref().to_string()));
            }
        }

        let mut manifest = self.manifest.clone();
        manifest
            .stacks
            .retain(|s| ids.iter().any(|id| id.as_ref() == s.id));
        debug!(
            "Selected {} of {} stacks from '{}'",
            manifest.stacks.len(),
            self.manifest.stacks.len(),
            self.manifest.name
        );
        Ok(Self { manifest })
    }
}

/// The reference multi-tier topology: network, registry, task and pipeline
/// roles, configuration parameters, cluster, two load-balanced services and
/// the build pipeline.
pub fn reference_topology(environment: Environment) -> TopologyResult<Topology> {
    Ok(Topology::from_yaml(REFERENCE_MANIFEST)?.with_environment(environment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedProvider;
    use stratus_core::{CoreError, DependencyResolver};

    #[test]
    fn test_reference_topology_order() {
        let topology = reference_topology(Environment::default()).unwrap();
        let catalog = topology.catalog(Arc::new(SimulatedProvider::default())).unwrap();
        let plan = DependencyResolver::new().resolve(&catalog).unwrap();

        assert_eq!(
            plan.order(),
            vec![
                "ApiConfig",
                "Ecr",
                "Iam",
                "Network",
                "Cluster",
                "KeycloakService",
                "PipelineIam",
                "Pipeline",
                "Secrets",
                "Service",
            ]
        );
        assert_eq!(plan.phases().len(), 3);
        assert_eq!(plan.phases()[1], vec!["Cluster", "Pipeline"]);
        assert_eq!(plan.phases()[2], vec!["KeycloakService", "Service"]);
    }

    #[test]
    fn test_unqualified_role_is_ambiguous() {
        let topology = reference_topology(Environment::default()).unwrap();
        let mut manifest = topology.manifest().clone();
        for stack in manifest.stacks.iter_mut().filter(|s| s.id == "Pipeline") {
            for resource in &mut stack.resources {
                if let Some(role) = resource.inputs.get_mut("roleArn") {
                    role.from = None;
                }
            }
        }

        let topology = Topology::new(manifest).unwrap();
        let catalog = topology.catalog(Arc::new(SimulatedProvider::default())).unwrap();
        let err = DependencyResolver::new().resolve(&catalog).unwrap_err();

        match err {
            CoreError::AmbiguousDependency { stack, candidates, .. } => {
                assert_eq!(stack, "Pipeline");
                assert_eq!(candidates, vec!["Iam", "PipelineIam"]);
            }
            other => panic!("expected AmbiguousDependency, got {other}"),
        }
    }

    #[test]
    fn test_select_unknown_stack() {
        let topology = reference_topology(Environment::default()).unwrap();
        let err = topology.select(&["Network", "Database"]).unwrap_err();
        assert!(matches!(err, TopologyError::UnknownStack(ref id) if id == "Database"));
    }

    #[test]
    fn test_select_keeps_manifest_order() {
        let topology = reference_topology(Environment::default()).unwrap();
        let selected = topology.select(&["Cluster", "Network"]).unwrap();
        assert_eq!(selected.stack_ids(), vec!["Network", "Cluster"]);
        assert_eq!(selected.name(), topology.name());
    }

    #[test]
    fn test_environment_override() {
        let env = Environment::new("123456789012", "ap-southeast-2");
        let topology = reference_topology(env.clone()).unwrap();
        assert_eq!(topology.environment(), &env);
    }
}
