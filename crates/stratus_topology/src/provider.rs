//! Resource provider boundary.
//!
//! A provider turns a request for one logical resource into the attributes
//! the created resource exposes. Declared stacks call it once per resource,
//! in declaration order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stratus_core::{Attributes, ResourceKind};

use crate::error::TopologyResult;

/// Target account and region for provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub account: String,
    pub region: String,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            account: "000000000000".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

impl Environment {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.account, self.region)
    }
}

/// Request to create one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionRequest {
    /// Stack the resource belongs to
    pub stack: String,
    /// Name of the resource within its stack
    pub logical_name: String,
    pub kind: ResourceKind,
    /// Declared properties with every input already resolved
    pub properties: Attributes,
}

impl ProvisionRequest {
    /// String property, if present.
    pub fn property_str(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(|v| v.as_str())
    }
}

/// Trait for creating resources.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Provider name used in logs.
    fn name(&self) -> &str;

    /// Create a resource, returning its attributes.
    async fn provision(&self, request: &ProvisionRequest) -> TopologyResult<Attributes>;
}
