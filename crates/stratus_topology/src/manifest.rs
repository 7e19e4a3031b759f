//! Topology manifest definitions.
//!
//! A topology manifest describes a set of stacks declaratively in YAML:
//!
//! ```yaml
//! name: skillshift
//! environment:
//!   account: "123456789012"
//!   region: us-east-1
//! stacks:
//!   - id: Network
//!     resources:
//!       - name: SkillShiftVpc
//!         kind: network
//!         properties:
//!           maxAzs: 2
//!     exports:
//!       - name: SkillShiftVpcId
//!         kind: network
//!   - id: Cluster
//!     resources:
//!       - name: SkillShiftCluster
//!         kind: cluster
//!         inputs:
//!           vpcId:
//!             kind: network
//!             from: Network
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use stratus_core::{Attributes, ResourceKind, ResourceSelector};
use tracing::debug;

use crate::error::{TopologyError, TopologyResult};
use crate::policy::ReferencePolicy;
use crate::provider::Environment;

/// Pattern for stack ids, resource names and export names.
pub const IDENTIFIER_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9-]*$";

/// Root manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyManifest {
    pub name: String,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub reference_policy: ReferencePolicy,
    #[serde(default)]
    pub stacks: Vec<StackManifest>,
}

/// One declared stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackManifest {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub resources: Vec<ResourceDecl>,
    #[serde(default)]
    pub exports: Vec<ExportDecl>,
}

/// A resource the stack creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDecl {
    pub name: String,
    pub kind: ResourceKind,
    /// Literal properties passed to the provider
    #[serde(default)]
    pub properties: Attributes,
    /// Properties filled from other resources, keyed by property name
    #[serde(default)]
    pub inputs: BTreeMap<String, InputRef>,
}

/// Reference to another resource's attribute.
///
/// Either `local` (an earlier resource of the same stack) or a cross-stack
/// `kind`, optionally narrowed by `from` (producing stack) or `export`
/// (export name).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ResourceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<String>,
    /// Attribute to read; defaults to the kind's primary attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

/// What an input reference points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputTarget {
    /// A resource bound from another stack
    Binding(ResourceSelector),
    /// An earlier resource of the same stack
    Local(String),
}

impl InputRef {
    /// Interpret the reference.
    pub fn target(&self) -> Result<InputTarget, String> {
        if let Some(local) = &self.local {
            if self.from.is_some() || self.export.is_some() {
                return Err(format!("local reference '{}' cannot also set 'from' or 'export'", local));
            }
            return Ok(InputTarget::Local(local.clone()));
        }

        let kind = self
            .kind
            .ok_or_else(|| "cross-stack reference requires 'kind'".to_string())?;
        match (&self.from, &self.export) {
            (Some(_), Some(_)) => Err("'from' and 'export' are mutually exclusive".to_string()),
            (Some(stack), None) => Ok(InputTarget::Binding(ResourceSelector::from_stack(kind, stack))),
            (None, Some(name)) => Ok(InputTarget::Binding(ResourceSelector::export(kind, name))),
            (None, None) => Ok(InputTarget::Binding(ResourceSelector::kind(kind))),
        }
    }
}

/// A named export of one of the stack's resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDecl {
    pub name: String,
    pub kind: ResourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl StackManifest {
    /// Resource kinds in declaration order.
    pub fn produced_kinds(&self) -> Vec<ResourceKind> {
        self.resources.iter().map(|r| r.kind).collect()
    }

    /// Cross-stack selectors in declaration order, without duplicates.
    pub fn selectors(&self) -> Vec<ResourceSelector> {
        let mut selectors: Vec<ResourceSelector> = Vec::new();
        for resource in &self.resources {
            for input in resource.inputs.values() {
                if let Ok(InputTarget::Binding(selector)) = input.target() {
                    if !selectors.contains(&selector) {
                        selectors.push(selector);
                    }
                }
            }
        }
        selectors
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceDecl> {
        self.resources.iter().find(|r| r.name == name)
    }
}

impl TopologyManifest {
    /// Load and validate a manifest from a YAML file.
    pub fn from_file(path: &Path) -> TopologyResult<Self> {
        debug!("Reading topology manifest from {:?}", path);
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a manifest from YAML.
    pub fn from_yaml(content: &str) -> TopologyResult<Self> {
        let manifest: Self = serde_yaml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn stack(&self, id: &str) -> Option<&StackManifest> {
        self.stacks.iter().find(|s| s.id == id)
    }

    pub fn stack_ids(&self) -> Vec<&str> {
        self.stacks.iter().map(|s| s.id.as_str()).collect()
    }

    /// Check the manifest's structure and reference policy.
    ///
    /// Dependency problems between stacks (missing producers, cycles,
    /// ambiguity) are left to the resolver.
    pub fn validate(&self) -> TopologyResult<()> {
        let identifier = Regex::new(IDENTIFIER_PATTERN).map_err(|e| TopologyError::InvalidManifest(e.to_string()))?;
        let check = |what: &'static str, value: &str| -> TopologyResult<()> {
            if identifier.is_match(value) {
                Ok(())
            } else {
                Err(TopologyError::InvalidIdentifier {
                    what,
                    value: value.to_string(),
                })
            }
        };

        if self.name.trim().is_empty() {
            return Err(TopologyError::InvalidManifest("topology name is empty".to_string()));
        }

        let mut stack_ids = HashSet::new();
        let mut export_names = HashSet::new();
        for stack in &self.stacks {
            check("stack id", &stack.id)?;
            if !stack_ids.insert(stack.id.as_str()) {
                return Err(TopologyError::InvalidManifest(format!("duplicate stack id '{}'", stack.id)));
            }

            let invalid = |message: String| TopologyError::InvalidManifest(format!("stack '{}': {}", stack.id, message));

            let mut names = HashSet::new();
            let mut kinds = HashSet::new();
            for resource in &stack.resources {
                check("resource name", &resource.name)?;
                if !names.insert(resource.name.as_str()) {
                    return Err(invalid(format!("duplicate resource name '{}'", resource.name)));
                }
                if !kinds.insert(resource.kind) {
                    return Err(invalid(format!("more than one {} resource", resource.kind)));
                }

                for (property, input) in &resource.inputs {
                    let target = input
                        .target()
                        .map_err(|m| invalid(format!("input '{}' of '{}': {}", property, resource.name, m)))?;
                    match target {
                        InputTarget::Local(name) => {
                            // Only resources declared earlier have outputs yet
                            if name == resource.name || !names.contains(name.as_str()) {
                                return Err(invalid(format!(
                                    "input '{}' of '{}' refers to '{}', which is not an earlier resource",
                                    property, resource.name, name
                                )));
                            }
                        }
                        InputTarget::Binding(selector) => {
                            if let Some(name) = selector.export_name() {
                                check("export name", name)?;
                            }
                            if let Some(from) = selector.stack_id() {
                                check("stack id", from)?;
                            }
                            self.reference_policy.check(&selector).map_err(|message| {
                                TopologyError::PolicyViolation {
                                    stack: stack.id.clone(),
                                    resource: resource.name.clone(),
                                    message,
                                }
                            })?;
                        }
                    }
                }
            }

            for export in &stack.exports {
                check("export name", &export.name)?;
                if !kinds.contains(&export.kind) {
                    return Err(invalid(format!(
                        "export '{}' refers to {} but the stack declares no such resource",
                        export.name, export.kind
                    )));
                }
                if !export_names.insert(export.name.as_str()) {
                    return Err(TopologyError::InvalidManifest(format!(
                        "export '{}' is declared more than once",
                        export.name
                    )));
                }
            }
        }

        debug!("Topology '{}' is valid ({} stacks)", self.name, self.stacks.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
name: demo
environment:
  account: "123456789012"
  region: eu-west-1
stacks:
  - id: Network
    description: VPC
    resources:
      - name: Vpc
        kind: network
        properties:
          maxAzs: 2
    exports:
      - name: DemoVpcId
        kind: network
  - id: Cluster
    resources:
      - name: Cluster
        kind: cluster
        inputs:
          vpcId:
            kind: network
            from: Network
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = TopologyManifest::from_yaml(MANIFEST).unwrap();

        assert_eq!(manifest.name, "demo");
        assert_eq!(manifest.environment.region, "eu-west-1");
        assert_eq!(manifest.stack_ids(), vec!["Network", "Cluster"]);

        let network = manifest.stack("Network").unwrap();
        assert_eq!(network.resources[0].properties["maxAzs"], 2);
        assert_eq!(network.produced_kinds(), vec![ResourceKind::Network]);

        let cluster = manifest.stack("Cluster").unwrap();
        assert_eq!(
            cluster.selectors(),
            vec![ResourceSelector::from_stack(ResourceKind::Network, "Network")]
        );
    }

    #[test]
    fn test_input_ref_targets() {
        let local = InputRef {
            local: Some("Alb".to_string()),
            ..Default::default()
        };
        assert_eq!(local.target().unwrap(), InputTarget::Local("Alb".to_string()));

        let any = InputRef {
            kind: Some(ResourceKind::Role),
            ..Default::default()
        };
        assert_eq!(
            any.target().unwrap(),
            InputTarget::Binding(ResourceSelector::kind(ResourceKind::Role))
        );

        let both = InputRef {
            kind: Some(ResourceKind::Network),
            from: Some("Network".to_string()),
            export: Some("VpcId".to_string()),
            ..Default::default()
        };
        assert!(both.target().unwrap_err().contains("mutually exclusive"));

        assert!(InputRef::default().target().is_err());
    }

    #[test]
    fn test_invalid_stack_id() {
        let yaml = MANIFEST.replace("id: Cluster", "id: 9Cluster");
        let err = TopologyManifest::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, TopologyError::InvalidIdentifier { what: "stack id", .. }));
    }

    #[test]
    fn test_duplicate_stack_id() {
        let yaml = MANIFEST.replace("id: Cluster", "id: Network");
        let err = TopologyManifest::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate stack id"));
    }

    #[test]
    fn test_two_resources_of_one_kind() {
        let yaml = r#"
name: demo
stacks:
  - id: Iam
    resources:
      - name: TaskRole
        kind: role
      - name: BuildRole
        kind: role
"#;
        let err = TopologyManifest::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("more than one role resource"));
    }

    #[test]
    fn test_local_reference_must_be_earlier() {
        let yaml = r#"
name: demo
stacks:
  - id: Service
    resources:
      - name: Service
        kind: service
        inputs:
          loadBalancerArn:
            local: Alb
            attribute: loadBalancerArn
      - name: Alb
        kind: load_balancer
"#;
        let err = TopologyManifest::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("not an earlier resource"));
    }

    #[test]
    fn test_policy_violation() {
        let yaml = MANIFEST.replace("from: Network", "export: DemoVpcId");
        let err = TopologyManifest::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, TopologyError::PolicyViolation { ref stack, .. } if stack == "Cluster"));
        assert!(err.is_manifest_error());
    }

    #[test]
    fn test_export_of_undeclared_kind() {
        let yaml = MANIFEST.replace("kind: network\n  - id: Cluster", "kind: role\n  - id: Cluster");
        let err = TopologyManifest::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("declares no such resource"));
    }

    #[test]
    fn test_unknown_kind_is_yaml_error() {
        let yaml = MANIFEST.replace("kind: cluster", "kind: bucket");
        let err = TopologyManifest::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, TopologyError::Yaml(_)));
    }
}
