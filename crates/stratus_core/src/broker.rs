//! Cross-stack reference broker.
//!
//! The broker is the only read path from a stack's inputs to the resources
//! that satisfy them. It holds shared borrows of the registry and the export
//! table, so it can never observe a registry in the middle of a write.

use std::sync::Arc;

use tracing::{debug, error};

use crate::error::{CoreError, CoreResult};
use crate::exports::{ExportRecord, ExportTable};
use crate::plan::{InputSource, PlannedInput};
use crate::registry::ResourceRegistry;
use crate::resource::{Attributes, Resource};
use crate::selector::ResourceSelector;
use crate::stack::Bindings;

/// Read-only view resolving planned inputs to resources.
pub struct ReferenceBroker<'a> {
    registry: &'a ResourceRegistry,
    exports: &'a ExportTable,
}

impl<'a> ReferenceBroker<'a> {
    pub fn new(registry: &'a ResourceRegistry, exports: &'a ExportTable) -> Self {
        Self { registry, exports }
    }

    /// Resolve one planned input.
    pub fn resolve(&self, consumer: &str, input: &PlannedInput) -> CoreResult<Arc<Resource>> {
        match &input.source {
            InputSource::Stack(producer) => self
                .registry
                .find_by_kind_and_producer(input.selector.kind, producer)
                .ok_or_else(|| {
                    error!(
                        "Planned producer {} has no {} resource registered for {}",
                        producer, input.selector.kind, consumer
                    );
                    CoreError::MissingBinding {
                        stack: consumer.to_string(),
                        selector: input.selector.to_string(),
                    }
                }),
            InputSource::Export { name, .. } => self.resolve_export(&input.selector, name),
        }
    }

    /// Resolve a selector against the export table.
    pub fn resolve_export(&self, selector: &ResourceSelector, name: &str) -> CoreResult<Arc<Resource>> {
        let record = self
            .exports
            .get(name)
            .ok_or_else(|| CoreError::ExportNotFound(name.to_string()))?;

        // Same-run exports resolve to the registered resource itself
        if let Some(resource) = self.registry.find_by_export_name(name) {
            if resource.kind() == selector.kind {
                debug!("Export '{}' resolved in-run to {}", name, resource.id());
                return Ok(resource);
            }
        }

        let resource = resource_from_record(selector, record)?;
        debug!("Export '{}' resolved from export table to {}", name, resource.id());
        Ok(Arc::new(resource))
    }

    /// Resolve every input of a stack into bindings.
    pub fn bind_all(&self, consumer: &str, inputs: &[PlannedInput]) -> CoreResult<Bindings> {
        let mut bindings = Bindings::new(consumer);
        for input in inputs {
            let resource = self.resolve(consumer, input)?;
            bindings.bind(input.selector.clone(), resource);
        }
        Ok(bindings)
    }
}

/// Rebuild a typed resource from an export record, checking it can satisfy
/// the selector's kind and attribute shape.
pub(crate) fn resource_from_record(selector: &ResourceSelector, record: &ExportRecord) -> CoreResult<Resource> {
    let mismatch = |message: String| CoreError::TypeMismatch {
        selector: selector.to_string(),
        message,
    };

    let attributes: Attributes = match record.kind {
        Some(kind) if kind != selector.kind => {
            return Err(mismatch(format!(
                "export '{}' holds a {} resource",
                record.name, kind
            )));
        }
        Some(_) => record.attributes.clone(),
        None => {
            // A plain value can only stand in for a single-attribute kind
            let required = selector.kind.required_attributes();
            if required.len() != 1 {
                return Err(mismatch(format!(
                    "export '{}' is a plain value but {} requires {}",
                    record.name,
                    selector.kind,
                    required.join(", ")
                )));
            }
            let mut attributes = Attributes::new();
            attributes.insert(required[0].to_string(), record.value.clone().into());
            attributes
        }
    };

    let missing = selector.kind.missing_attributes(&attributes);
    if !missing.is_empty() {
        return Err(mismatch(format!(
            "export '{}' is missing attributes: {}",
            record.name,
            missing.join(", ")
        )));
    }

    let id = record
        .resource_id
        .clone()
        .unwrap_or_else(|| format!("export:{}", record.name));
    let producer = record
        .producing_stack
        .clone()
        .unwrap_or_else(|| format!("export:{}", record.name));
    Ok(Resource::new(id, selector.kind, producer).with_attributes(attributes))
}
