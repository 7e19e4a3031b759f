//! Stack descriptors.
//!
//! Stacks are the units of provisioning in Stratus. Each stack declares,
//! before anything runs, which resources it needs (`requires`), which kinds
//! it creates (`produces`) and which named exports it publishes (`exports`).
//! The resolver plans purely from these declarations; `execute` is only
//! called once every requirement has been bound.
//!
//! # Stack Lifecycle
//!
//! 1. **Declaration**: Stacks are added to a `StackCatalog` by id.
//! 2. **Planning**: The `DependencyResolver` orders the catalog into a
//!    `DeploymentPlan` without executing anything.
//! 3. **Binding**: The `ReferenceBroker` resolves each selector to a resource.
//! 4. **Execution**: `execute` receives the bindings and returns the
//!    resources it created, which the planner validates and registers.
//!
//! # Example
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use stratus_core::{Bindings, ProvisioningError, Resource, ResourceKind, ResourceSelector, Stack};
//!
//! struct ClusterStack;
//!
//! #[async_trait]
//! impl Stack for ClusterStack {
//!     fn id(&self) -> &str { "Cluster" }
//!     fn requires(&self) -> Vec<ResourceSelector> {
//!         vec![ResourceSelector::from_stack(ResourceKind::Network, "Network")]
//!     }
//!     fn produces(&self) -> Vec<ResourceKind> { vec![ResourceKind::Cluster] }
//!
//!     async fn execute(&self, bindings: &Bindings) -> Result<Vec<Resource>, ProvisioningError> {
//!         let vpc = bindings.attribute(&self.requires()[0], "vpcId")?;
//!         // Call the provider here
//!         Ok(vec![])
//!     }
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProvisioningError;
use crate::resource::{Resource, ResourceKind};
use crate::selector::ResourceSelector;

/// A named export a stack publishes after it executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDeclaration {
    /// Export name in the flat, cross-run namespace
    pub name: String,
    /// Kind of the produced resource being exported
    pub kind: ResourceKind,
    /// Attribute to publish; defaults to the kind's primary attribute
    pub attribute: Option<String>,
}

impl ExportDeclaration {
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// The attribute whose value is published.
    pub fn attribute_name(&self) -> &str {
        self.attribute
            .as_deref()
            .unwrap_or_else(|| self.kind.primary_attribute())
    }
}

/// Resolved resources handed to a stack's `execute`.
#[derive(Debug, Clone)]
pub struct Bindings {
    stack: String,
    resources: BTreeMap<ResourceSelector, Arc<Resource>>,
}

impl Bindings {
    pub fn new(stack: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            resources: BTreeMap::new(),
        }
    }

    /// Bind a selector. Returns false if it was already bound; the first
    /// binding is kept.
    pub fn bind(&mut self, selector: ResourceSelector, resource: Arc<Resource>) -> bool {
        if self.resources.contains_key(&selector) {
            return false;
        }
        self.resources.insert(selector, resource);
        true
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    pub fn get(&self, selector: &ResourceSelector) -> Option<&Arc<Resource>> {
        self.resources.get(selector)
    }

    /// Get the resource bound to `selector`.
    pub fn require(&self, selector: &ResourceSelector) -> Result<&Arc<Resource>, ProvisioningError> {
        self.resources
            .get(selector)
            .ok_or_else(|| ProvisioningError::MissingBinding {
                stack: self.stack.clone(),
                selector: selector.to_string(),
            })
    }

    /// Read one attribute of the resource bound to `selector`.
    pub fn attribute(
        &self,
        selector: &ResourceSelector,
        name: &str,
    ) -> Result<&serde_json::Value, ProvisioningError> {
        let resource = self.require(selector)?;
        resource
            .attribute(name)
            .ok_or_else(|| ProvisioningError::MissingAttribute {
                resource: resource.id().to_string(),
                kind: resource.kind(),
                attribute: name.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceSelector, &Arc<Resource>)> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Trait for stack implementations.
///
/// `requires`, `produces` and `exports` must be pure: they are queried
/// repeatedly during planning and must not touch the provider.
///
/// Stacks must be `Send + Sync` so a catalog can be shared across tasks.
#[async_trait]
pub trait Stack: Send + Sync {
    /// Get the unique stack id.
    fn id(&self) -> &str;

    /// Get a human-readable description of the stack.
    fn description(&self) -> &str {
        ""
    }

    /// Declare the resources this stack needs as input.
    fn requires(&self) -> Vec<ResourceSelector>;

    /// Declare the kinds of resources this stack creates.
    fn produces(&self) -> Vec<ResourceKind>;

    /// Declare the named exports this stack publishes.
    ///
    /// Default: none.
    fn exports(&self) -> Vec<ExportDeclaration> {
        Vec::new()
    }

    /// Create the stack's resources.
    ///
    /// Every resource returned must carry this stack's id as its producing
    /// stack and be of a declared kind.
    async fn execute(&self, bindings: &Bindings) -> Result<Vec<Resource>, ProvisioningError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_declaration_attribute_defaults_to_primary() {
        let export = ExportDeclaration::new("SkillShiftVpcId", ResourceKind::Network);
        assert_eq!(export.attribute_name(), "vpcId");

        let export = ExportDeclaration::new("ClusterArn", ResourceKind::Cluster).with_attribute("clusterArn");
        assert_eq!(export.attribute_name(), "clusterArn");
    }

    #[test]
    fn test_bindings_require() {
        let selector = ResourceSelector::from_stack(ResourceKind::Network, "Network");
        let mut bindings = Bindings::new("Cluster");

        let err = bindings.require(&selector).unwrap_err();
        assert_eq!(
            err,
            ProvisioningError::MissingBinding {
                stack: "Cluster".to_string(),
                selector: "network from Network".to_string(),
            }
        );

        let vpc = Arc::new(
            Resource::new("Network/Vpc", ResourceKind::Network, "Network").with_attribute("vpcId", "vpc-1"),
        );
        assert!(bindings.bind(selector.clone(), vpc));
        assert_eq!(bindings.attribute(&selector, "vpcId").unwrap(), "vpc-1");
        assert!(matches!(
            bindings.attribute(&selector, "cidr"),
            Err(ProvisioningError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn test_bindings_keep_first() {
        let selector = ResourceSelector::kind(ResourceKind::Role);
        let mut bindings = Bindings::new("Service");
        let first = Arc::new(Resource::new("Iam/Role", ResourceKind::Role, "Iam"));
        let second = Arc::new(Resource::new("Other/Role", ResourceKind::Role, "Other"));

        assert!(bindings.bind(selector.clone(), first));
        assert!(!bindings.bind(selector.clone(), second));
        assert_eq!(bindings.require(&selector).unwrap().id(), "Iam/Role");
        assert_eq!(bindings.len(), 1);
    }
}
