//! Simulated resource provider.
//!
//! Fabricates realistic, deterministic attributes without calling any cloud
//! API. The same environment, stack and logical name always yield the same
//! physical ids, so repeated runs produce identical export tables.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use stratus_core::{Attributes, ResourceKind};
use tracing::debug;
use uuid::Uuid;

use crate::error::{TopologyError, TopologyResult};
use crate::provider::{Environment, ProvisionRequest, ResourceProvider};

/// Provider that simulates resource creation.
///
/// Every request is captured for later inspection. Failures can be injected
/// per resource kind or per logical name.
#[derive(Clone)]
pub struct SimulatedProvider {
    environment: Environment,
    /// Captured requests, in call order.
    captured: Arc<RwLock<Vec<ProvisionRequest>>>,
    /// Kinds whose provisioning fails.
    failing_kinds: Arc<RwLock<Vec<ResourceKind>>>,
    /// Logical names whose provisioning fails.
    failing_names: Arc<RwLock<Vec<String>>>,
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new(Environment::default())
    }
}

impl SimulatedProvider {
    /// Create a new simulated provider for an environment.
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            captured: Arc::new(RwLock::new(Vec::new())),
            failing_kinds: Arc::new(RwLock::new(Vec::new())),
            failing_names: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Fail every request for resources of `kind`.
    pub fn fail_on_kind(self, kind: ResourceKind) -> Self {
        self.failing_kinds.write().push(kind);
        self
    }

    /// Fail requests for the resource with this logical name.
    pub fn fail_on(self, logical_name: impl Into<String>) -> Self {
        self.failing_names.write().push(logical_name.into());
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Get all captured requests.
    pub fn requests(&self) -> Vec<ProvisionRequest> {
        self.captured.read().clone()
    }

    pub fn request_count(&self) -> usize {
        self.captured.read().len()
    }

    /// Captured request for a logical name, if any.
    pub fn request_for(&self, logical_name: &str) -> Option<ProvisionRequest> {
        self.captured
            .read()
            .iter()
            .find(|r| r.logical_name == logical_name)
            .cloned()
    }

    /// Clear all captured requests.
    pub fn clear_requests(&self) {
        self.captured.write().clear();
    }

    fn check_failure(&self, request: &ProvisionRequest) -> TopologyResult<()> {
        let by_kind = self.failing_kinds.read().contains(&request.kind);
        let by_name = self.failing_names.read().iter().any(|n| n == &request.logical_name);
        if by_kind || by_name {
            return Err(TopologyError::ProvisionFailed {
                logical_name: request.logical_name.clone(),
                kind: request.kind.to_string(),
                message: "simulated provider failure".to_string(),
            });
        }
        Ok(())
    }

    /// Stable hex suffix for a resource.
    fn physical_id(&self, request: &ProvisionRequest, len: usize) -> String {
        let key = format!("{}/{}/{}", self.environment, request.stack, request.logical_name);
        let hex = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).simple().to_string();
        hex.chars().take(len).collect()
    }

    fn arn(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:aws:{}:{}:{}:{}",
            service, self.environment.region, self.environment.account, resource
        )
    }

    fn name_or_logical(request: &ProvisionRequest, property: &str) -> String {
        request
            .property_str(property)
            .map(str::to_string)
            .unwrap_or_else(|| request.logical_name.clone())
    }

    fn fabricate(&self, request: &ProvisionRequest) -> Attributes {
        let mut attributes = request.properties.clone();
        let env = &self.environment;

        let mut set = |name: &str, value: String| {
            attributes.insert(name.to_string(), value.into());
        };

        match request.kind {
            ResourceKind::Network => {
                set("vpcId", format!("vpc-{}", self.physical_id(request, 17)));
            }
            ResourceKind::Cluster => {
                let name = Self::name_or_logical(request, "clusterName");
                set("clusterArn", self.arn("ecs", &format!("cluster/{}", name)));
                set("clusterName", name);
            }
            ResourceKind::Repository => {
                let name = Self::name_or_logical(request, "repositoryName").to_lowercase();
                set(
                    "repositoryUri",
                    format!("{}.dkr.ecr.{}.amazonaws.com/{}", env.account, env.region, name),
                );
                set("repositoryArn", self.arn("ecr", &format!("repository/{}", name)));
                set("repositoryName", name);
            }
            ResourceKind::Role => {
                let name = Self::name_or_logical(request, "roleName");
                set("roleArn", format!("arn:aws:iam::{}:role/{}", env.account, name));
                set("roleName", name);
            }
            ResourceKind::Service => {
                let name = Self::name_or_logical(request, "serviceName");
                let cluster = request.property_str("cluster").unwrap_or("default").to_string();
                set("serviceArn", self.arn("ecs", &format!("service/{}/{}", cluster, name)));
                set("serviceName", name);
            }
            ResourceKind::LoadBalancer => {
                let id = self.physical_id(request, 16);
                let prefix: String = request.logical_name.to_lowercase().chars().take(16).collect();
                set(
                    "dnsName",
                    format!("{}-{}.{}.elb.amazonaws.com", prefix, &id[..10], env.region),
                );
                set(
                    "loadBalancerArn",
                    self.arn(
                        "elasticloadbalancing",
                        &format!("loadbalancer/app/{}/{}", prefix, id),
                    ),
                );
            }
            ResourceKind::Pipeline => {
                let name = Self::name_or_logical(request, "pipelineName");
                set("pipelineArn", self.arn("codepipeline", &name));
                set("pipelineName", name);
            }
            ResourceKind::Parameter => {
                let name = request
                    .property_str("parameterName")
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("/{}", request.logical_name));
                let path = if name.starts_with('/') {
                    name.clone()
                } else {
                    format!("/{}", name)
                };
                set("parameterArn", self.arn("ssm", &format!("parameter{}", path)));
                set("parameterName", name);
            }
        }

        attributes
    }
}

#[async_trait]
impl ResourceProvider for SimulatedProvider {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn provision(&self, request: &ProvisionRequest) -> TopologyResult<Attributes> {
        self.captured.write().push(request.clone());
        self.check_failure(request)?;

        let attributes = self.fabricate(request);
        debug!(
            "Simulated {} {}/{} with {} attributes",
            request.kind,
            request.stack,
            request.logical_name,
            attributes.len()
        );
        Ok(attributes)
    }
}
