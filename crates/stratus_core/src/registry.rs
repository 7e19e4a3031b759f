//! Resource registry for the resources created during a run.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::resource::{Resource, ResourceKind};

/// The set of resources created during a run.
///
/// Resources are keyed by id and never replaced or removed. The planner is
/// the only writer; everything else reads through the reference broker.
#[derive(Default)]
pub struct ResourceRegistry {
    resources: BTreeMap<String, Arc<Resource>>,
    by_producer: HashMap<(ResourceKind, String), Vec<String>>,
    exports: BTreeMap<String, String>,
}

impl ResourceRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource.
    ///
    /// Fails with `DuplicateId` if the id is already present; the registry
    /// is left untouched in that case.
    pub fn register(&mut self, resource: Resource) -> CoreResult<Arc<Resource>> {
        if self.resources.contains_key(resource.id()) {
            return Err(CoreError::DuplicateId(resource.id().to_string()));
        }

        debug!(
            "Registering {} resource: {} (stack {})",
            resource.kind(),
            resource.id(),
            resource.producing_stack()
        );

        let resource = Arc::new(resource);
        self.by_producer
            .entry((resource.kind(), resource.producing_stack().to_string()))
            .or_default()
            .push(resource.id().to_string());
        self.resources
            .insert(resource.id().to_string(), Arc::clone(&resource));
        Ok(resource)
    }

    /// Record that a registered resource was published by `stack` under an
    /// export name.
    pub(crate) fn record_export(&mut self, stack: &str, name: impl Into<String>, resource_id: &str) -> CoreResult<()> {
        let name = name.into();
        if !self.resources.contains_key(resource_id) {
            return Err(CoreError::InvalidOutput {
                stack: stack.to_string(),
                message: format!("export '{}' refers to unregistered resource '{}'", name, resource_id),
            });
        }
        self.exports.insert(name, resource_id.to_string());
        Ok(())
    }

    /// Get a resource by id.
    pub fn lookup(&self, id: &str) -> Option<Arc<Resource>> {
        self.resources.get(id).cloned()
    }

    /// Find the resource of `kind` produced by `stack`.
    pub fn find_by_kind_and_producer(&self, kind: ResourceKind, stack: &str) -> Option<Arc<Resource>> {
        self.by_producer
            .get(&(kind, stack.to_string()))
            .and_then(|ids| ids.first())
            .and_then(|id| self.lookup(id))
    }

    /// Find a resource published in this run under `name`.
    pub fn find_by_export_name(&self, name: &str) -> Option<Arc<Resource>> {
        self.exports.get(name).and_then(|id| self.lookup(id))
    }

    /// All resources produced by `stack`, ordered by id.
    pub fn produced_by(&self, stack: &str) -> Vec<Arc<Resource>> {
        self.resources
            .values()
            .filter(|r| r.producing_stack() == stack)
            .cloned()
            .collect()
    }

    /// All registered resources, ordered by id.
    pub fn resources(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.resources.values()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.resources.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("exports", &self.exports)
            .finish()
    }
}
