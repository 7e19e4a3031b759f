//! The declared set of stacks for a provisioning run.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::stack::Stack;

/// A catalog of stack declarations keyed by stack id.
///
/// Unlike a plain map, adding a second stack with the same id is an error:
/// two declarations for one logical stack are a configuration mistake.
#[derive(Default, Clone)]
pub struct StackCatalog {
    stacks: BTreeMap<String, Arc<dyn Stack>>,
}

impl StackCatalog {
    /// Create a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stack declaration.
    pub fn add(&mut self, stack: Arc<dyn Stack>) -> CoreResult<()> {
        let id = stack.id().to_string();
        if self.stacks.contains_key(&id) {
            return Err(CoreError::DuplicateStack(id));
        }
        debug!("Declaring stack: {}", id);
        self.stacks.insert(id, stack);
        Ok(())
    }

    /// Builder-style `add`.
    pub fn with(mut self, stack: Arc<dyn Stack>) -> CoreResult<Self> {
        self.add(stack)?;
        Ok(self)
    }

    /// Build a catalog from a list of stacks.
    pub fn from_stacks(stacks: impl IntoIterator<Item = Arc<dyn Stack>>) -> CoreResult<Self> {
        let mut catalog = Self::new();
        for stack in stacks {
            catalog.add(stack)?;
        }
        Ok(catalog)
    }

    /// Get a stack by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Stack>> {
        self.stacks.get(id).cloned()
    }

    /// Get a stack by id, returning an error if not found.
    pub fn get_required(&self, id: &str) -> CoreResult<Arc<dyn Stack>> {
        self.get(id)
            .ok_or_else(|| CoreError::Config(format!("Stack not declared: {}", id)))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.stacks.contains_key(id)
    }

    /// Stack ids in sorted order.
    pub fn ids(&self) -> Vec<&str> {
        self.stacks.keys().map(|s| s.as_str()).collect()
    }

    /// Stacks in sorted id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Stack>> {
        self.stacks.values()
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }
}

impl std::fmt::Debug for StackCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackCatalog")
            .field("stacks", &self.stacks.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisioningError;
    use crate::resource::{Resource, ResourceKind};
    use crate::selector::ResourceSelector;
    use crate::stack::Bindings;
    use async_trait::async_trait;

    struct EmptyStack(&'static str);

    #[async_trait]
    impl Stack for EmptyStack {
        fn id(&self) -> &str {
            self.0
        }

        fn requires(&self) -> Vec<ResourceSelector> {
            Vec::new()
        }

        fn produces(&self) -> Vec<ResourceKind> {
            Vec::new()
        }

        async fn execute(&self, _bindings: &Bindings) -> Result<Vec<Resource>, ProvisioningError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_catalog_add_and_ids_sorted() {
        let catalog = StackCatalog::new()
            .with(Arc::new(EmptyStack("Network")))
            .unwrap()
            .with(Arc::new(EmptyStack("Ecr")))
            .unwrap();

        assert_eq!(catalog.ids(), vec!["Ecr", "Network"]);
        assert!(catalog.contains("Ecr"));
        assert!(catalog.get_required("Pipeline").is_err());
    }

    #[test]
    fn test_catalog_rejects_duplicate_stack() {
        let mut catalog = StackCatalog::new();
        catalog.add(Arc::new(EmptyStack("Iam"))).unwrap();

        let err = catalog.add(Arc::new(EmptyStack("Iam"))).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateStack(ref id) if id == "Iam"));
        assert_eq!(catalog.len(), 1);
    }
}
