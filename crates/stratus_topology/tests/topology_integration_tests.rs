//! Integration tests running topologies through the provisioning planner.

use std::sync::Arc;

use stratus_core::{
    CoreError, ExportTable, PlannerConfig, ProvisioningPlanner, ResourceKind, ResourceRegistry, RunState,
};
use stratus_topology::{reference_topology, Environment, SimulatedProvider, Topology, TopologyError};
use tempfile::tempdir;

fn environment() -> Environment {
    Environment::new("123456789012", "us-east-1")
}

fn planner(topology: &Topology, provider: &SimulatedProvider, config: PlannerConfig) -> ProvisioningPlanner {
    let catalog = topology.catalog(Arc::new(provider.clone())).unwrap();
    ProvisioningPlanner::new(Arc::new(catalog), config)
}

#[tokio::test]
async fn test_reference_topology_synth() {
    let dir = tempdir().unwrap();
    let config = PlannerConfig::default().with_state_dir(dir.path());
    let topology = reference_topology(environment()).unwrap();
    let provider = SimulatedProvider::new(environment());

    let mut registry = ResourceRegistry::new();
    let report = planner(&topology, &provider, config.clone())
        .deploy(&mut registry)
        .await
        .unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.completed.len(), 10);
    assert_eq!(registry.len(), 12);

    // The service received resolved values from four stacks and its own ALB
    let request = provider.request_for("SkillShiftService").unwrap();
    assert_eq!(request.property_str("cluster"), Some("skilapp-cluster"));
    assert_eq!(
        request.property_str("image"),
        Some("123456789012.dkr.ecr.us-east-1.amazonaws.com/skillshift-app")
    );
    assert_eq!(
        request.property_str("taskRoleArn"),
        Some("arn:aws:iam::123456789012:role/EcsTaskRole")
    );
    assert_eq!(
        request.property_str("secretKeyParameter"),
        Some("/skillshift/production/SECRET_KEY")
    );
    let alb = registry.lookup("Service/ServiceAlb").unwrap();
    assert_eq!(
        request.property_str("loadBalancerArn"),
        alb.attribute_string("loadBalancerArn").as_deref()
    );

    // Cluster and load balancer share the network stack's VPC
    let vpc = registry
        .find_by_kind_and_producer(ResourceKind::Network, "Network")
        .unwrap()
        .attribute_string("vpcId");
    assert_eq!(provider.request_for("SkillShiftCluster").unwrap().property_str("vpcId"), vpc.as_deref());
    assert_eq!(provider.request_for("ServiceAlb").unwrap().property_str("vpcId"), vpc.as_deref());

    // Both services run on the same cluster with the same task role
    let keycloak = provider.request_for("KeycloakFargateService").unwrap();
    assert_eq!(keycloak.property_str("cluster"), Some("skilapp-cluster"));
    assert_eq!(keycloak.property_str("taskRoleArn"), request.property_str("taskRoleArn"));
    assert_eq!(keycloak.property_str("repositoryUri"), request.property_str("image"));
    assert_eq!(keycloak.property_str("image"), Some("quay.io/keycloak/keycloak:latest"));

    // The pipeline assumes its own role, not the task role
    assert_eq!(
        provider.request_for("SkillShiftPipeline").unwrap().property_str("roleArn"),
        Some("arn:aws:iam::123456789012:role/CodePipelineRole")
    );

    let exports = ExportTable::load(&config.exports_path()).unwrap();
    assert_eq!(exports.len(), 8);
    assert_eq!(exports.get("SkillShiftVpcId").unwrap().value, vpc.unwrap());
    assert_eq!(
        exports.get("ServiceLoadBalancerDns").unwrap().producing_stack.as_deref(),
        Some("Service")
    );
    assert_ne!(
        exports.get("KeycloakLoadBalancerDns").unwrap().value,
        exports.get("ServiceLoadBalancerDns").unwrap().value
    );
}

#[tokio::test]
async fn test_provider_failure_leaves_earlier_stacks_registered() {
    let topology = reference_topology(environment()).unwrap();
    let provider = SimulatedProvider::new(environment()).fail_on_kind(ResourceKind::Cluster);

    let mut registry = ResourceRegistry::new();
    let err = planner(&topology, &provider, PlannerConfig::ephemeral())
        .deploy(&mut registry)
        .await
        .unwrap_err();

    let report = err.report().unwrap();
    assert_eq!(report.completed_stacks(), vec!["ApiConfig", "Ecr", "Iam", "Network"]);
    assert_eq!(report.failed_stack.as_deref(), Some("Cluster"));
    assert_eq!(
        report.pending,
        vec!["KeycloakService", "PipelineIam", "Pipeline", "Secrets", "Service"]
    );
    assert!(matches!(err.root(), CoreError::Provider { .. }));

    assert_eq!(registry.len(), 4);
    assert!(provider.request_for("SkillShiftPipeline").is_none());
}

#[tokio::test]
async fn test_independent_deployments_share_exports() {
    let dir = tempdir().unwrap();
    let config = PlannerConfig::default().with_state_dir(dir.path());
    let topology = reference_topology(environment()).unwrap();
    let provider = SimulatedProvider::new(environment());

    let parameters = topology.select(&["ApiConfig", "Secrets"]).unwrap();
    let mut registry = ResourceRegistry::new();
    planner(&parameters, &provider, config.clone())
        .deploy(&mut registry)
        .await
        .unwrap();

    let rest = topology
        .select(&[
            "Network",
            "Ecr",
            "Iam",
            "PipelineIam",
            "Cluster",
            "Service",
            "KeycloakService",
            "Pipeline",
        ])
        .unwrap();
    let planner = planner(&rest, &provider, config);
    let plan = planner.plan().unwrap();
    assert_eq!(plan.external_inputs().len(), 2);

    let mut registry = ResourceRegistry::new();
    let report = planner.deploy(&mut registry).await.unwrap();
    assert!(report.is_success());
    assert_eq!(
        provider
            .request_for("SkillShiftService")
            .unwrap()
            .property_str("apiBaseUrlParameter"),
        Some("/skillshift/production/NEXT_PUBLIC_API_BASE_URL")
    );
}

#[tokio::test]
async fn test_missing_parameter_exports_fail_before_any_stack() {
    let topology = reference_topology(environment()).unwrap();
    let provider = SimulatedProvider::new(environment());

    let without_parameters = topology
        .select(&["Network", "Ecr", "Iam", "Cluster", "Service"])
        .unwrap();
    let mut registry = ResourceRegistry::new();
    let err = planner(&without_parameters, &provider, PlannerConfig::ephemeral())
        .deploy(&mut registry)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::ExportNotFound(ref name) if name == "ApiBaseUrlParameter"));
    assert_eq!(provider.request_count(), 0);
}

#[test]
fn test_handoff_outside_selection_is_unresolved() {
    let topology = reference_topology(environment()).unwrap();
    let cluster_only = topology.select(&["Cluster"]).unwrap();

    let err = planner(&cluster_only, &SimulatedProvider::default(), PlannerConfig::ephemeral())
        .plan()
        .unwrap_err();
    assert!(matches!(err, CoreError::UnresolvedDependency { ref stack, .. } if stack == "Cluster"));
}

#[test]
fn test_manifest_cycle_is_rejected() {
    let yaml = r#"
name: loop
stacks:
  - id: Network
    resources:
      - name: Vpc
        kind: network
        inputs:
          serviceArn:
            kind: service
            from: Service
  - id: Service
    resources:
      - name: Web
        kind: service
        inputs:
          vpcId:
            kind: network
            from: Network
"#;
    let topology = Topology::from_yaml(yaml).unwrap();
    let err = planner(&topology, &SimulatedProvider::default(), PlannerConfig::ephemeral())
        .plan()
        .unwrap_err();
    assert_eq!(err.to_string(), "Cyclic dependency: Network -> Service -> Network");
}

#[test]
fn test_manifest_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("topology.yaml");
    std::fs::write(
        &path,
        r#"
name: single
stacks:
  - id: Iam
    resources:
      - name: TaskRole
        kind: role
"#,
    )
    .unwrap();

    let topology = Topology::from_file(&path).unwrap();
    assert_eq!(topology.stack_ids(), vec!["Iam"]);

    let err = Topology::from_file(&dir.path().join("missing.yaml")).unwrap_err();
    assert!(matches!(err, TopologyError::Io(_)));
}
