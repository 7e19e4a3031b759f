//! Resource definitions.
//!
//! A resource is an opaque provisioned entity. The core never looks inside
//! it beyond the attribute shape its kind requires.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute map describing a provisioned resource.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Kinds of resources a stack can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Network,
    Cluster,
    Repository,
    Role,
    Service,
    LoadBalancer,
    Pipeline,
    Parameter,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Network => "network",
            ResourceKind::Cluster => "cluster",
            ResourceKind::Repository => "repository",
            ResourceKind::Role => "role",
            ResourceKind::Service => "service",
            ResourceKind::LoadBalancer => "load_balancer",
            ResourceKind::Pipeline => "pipeline",
            ResourceKind::Parameter => "parameter",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "network" | "vpc" => Some(ResourceKind::Network),
            "cluster" => Some(ResourceKind::Cluster),
            "repository" => Some(ResourceKind::Repository),
            "role" => Some(ResourceKind::Role),
            "service" => Some(ResourceKind::Service),
            "load_balancer" => Some(ResourceKind::LoadBalancer),
            "pipeline" => Some(ResourceKind::Pipeline),
            "parameter" => Some(ResourceKind::Parameter),
            _ => None,
        }
    }

    pub fn all() -> &'static [ResourceKind] {
        &[
            ResourceKind::Network,
            ResourceKind::Cluster,
            ResourceKind::Repository,
            ResourceKind::Role,
            ResourceKind::Service,
            ResourceKind::LoadBalancer,
            ResourceKind::Pipeline,
            ResourceKind::Parameter,
        ]
    }

    /// Attributes every resource of this kind must expose.
    ///
    /// The first entry is the primary attribute: the value published by
    /// default when the resource is exported.
    pub fn required_attributes(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Network => &["vpcId"],
            ResourceKind::Cluster => &["clusterName", "clusterArn"],
            ResourceKind::Repository => &["repositoryUri", "repositoryName"],
            ResourceKind::Role => &["roleArn"],
            ResourceKind::Service => &["serviceArn", "serviceName"],
            ResourceKind::LoadBalancer => &["dnsName"],
            ResourceKind::Pipeline => &["pipelineName"],
            ResourceKind::Parameter => &["parameterName"],
        }
    }

    pub fn primary_attribute(&self) -> &'static str {
        self.required_attributes()[0]
    }

    /// Required attributes missing from `attributes`.
    pub fn missing_attributes(&self, attributes: &Attributes) -> Vec<&'static str> {
        self.required_attributes()
            .iter()
            .copied()
            .filter(|name| !attributes.contains_key(*name))
            .collect()
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A provisioned resource.
///
/// Resources are immutable once built; the registry shares them as
/// `Arc<Resource>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    id: String,
    kind: ResourceKind,
    attributes: Attributes,
    producing_stack: String,
}

impl Resource {
    pub fn new(
        id: impl Into<String>,
        kind: ResourceKind,
        producing_stack: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            attributes: Attributes::new(),
            producing_stack: producing_stack.into(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes.extend(attributes);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn producing_stack(&self) -> &str {
        &self.producing_stack
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    /// Attribute rendered as a plain string, the form used by exports.
    pub fn attribute_string(&self, name: &str) -> Option<String> {
        self.attributes.get(name).map(value_to_string)
    }
}

pub(crate) fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
