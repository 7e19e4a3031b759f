//! Stacks built from manifest entries.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use stratus_core::{
    Bindings, ExportDeclaration, ProvisioningError, Resource, ResourceKind, ResourceSelector, Stack,
};
use tracing::{debug, info};

use crate::manifest::{InputTarget, StackManifest};
use crate::provider::{ProvisionRequest, ResourceProvider};

/// A stack whose resources are declared in a topology manifest.
///
/// Executing it provisions every declared resource in order through the
/// provider, filling inputs from bindings or from resources created earlier
/// in the same stack.
pub struct DeclaredStack {
    manifest: StackManifest,
    provider: Arc<dyn ResourceProvider>,
}

impl DeclaredStack {
    pub fn new(manifest: StackManifest, provider: Arc<dyn ResourceProvider>) -> Self {
        Self { manifest, provider }
    }

    pub fn manifest(&self) -> &StackManifest {
        &self.manifest
    }

    fn resource_id(&self, name: &str) -> String {
        format!("{}/{}", self.manifest.id, name)
    }
}

#[async_trait]
impl Stack for DeclaredStack {
    fn id(&self) -> &str {
        &self.manifest.id
    }

    fn description(&self) -> &str {
        &self.manifest.description
    }

    fn requires(&self) -> Vec<ResourceSelector> {
        self.manifest.selectors()
    }

    fn produces(&self) -> Vec<ResourceKind> {
        self.manifest.produced_kinds()
    }

    fn exports(&self) -> Vec<ExportDeclaration> {
        self.manifest
            .exports
            .iter()
            .map(|e| {
                let declaration = ExportDeclaration::new(&e.name, e.kind);
                match &e.attribute {
                    Some(attribute) => declaration.with_attribute(attribute),
                    None => declaration,
                }
            })
            .collect()
    }

    async fn execute(&self, bindings: &Bindings) -> Result<Vec<Resource>, ProvisioningError> {
        let stack = self.manifest.id.as_str();
        let mut created: BTreeMap<&str, Resource> = BTreeMap::new();
        let mut resources = Vec::with_capacity(self.manifest.resources.len());

        for decl in &self.manifest.resources {
            let mut properties = decl.properties.clone();

            for (property, input) in &decl.inputs {
                let target = input
                    .target()
                    .map_err(|message| ProvisioningError::provider(stack, message))?;
                let value = match target {
                    InputTarget::Binding(selector) => {
                        let attribute = input.attribute.as_deref().unwrap_or_else(|| selector.kind.primary_attribute());
                        bindings.attribute(&selector, attribute)?.clone()
                    }
                    InputTarget::Local(name) => {
                        let local = created.get(name.as_str()).ok_or_else(|| {
                            ProvisioningError::provider(stack, format!("'{}' is not an earlier resource", name))
                        })?;
                        let attribute = input
                            .attribute
                            .as_deref()
                            .unwrap_or_else(|| local.kind().primary_attribute());
                        local
                            .attribute(attribute)
                            .cloned()
                            .ok_or_else(|| ProvisioningError::MissingAttribute {
                                resource: local.id().to_string(),
                                kind: local.kind(),
                                attribute: attribute.to_string(),
                            })?
                    }
                };
                properties.insert(property.clone(), value);
            }

            let request = ProvisionRequest {
                stack: stack.to_string(),
                logical_name: decl.name.clone(),
                kind: decl.kind,
                properties,
            };
            debug!("Provisioning {} '{}' via {}", decl.kind, decl.name, self.provider.name());

            let attributes = self
                .provider
                .provision(&request)
                .await
                .map_err(|e| ProvisioningError::provider(stack, e.to_string()))?;

            let resource = Resource::new(self.resource_id(&decl.name), decl.kind, stack).with_attributes(attributes);
            info!("Created {} {}", decl.kind, resource.id());
            created.insert(decl.name.as_str(), resource.clone());
            resources.push(resource);
        }

        Ok(resources)
    }
}
