//! Provisioning planner: runs a deployment plan with persistence support.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::broker::ReferenceBroker;
use crate::catalog::StackCatalog;
use crate::config::PlannerConfig;
use crate::error::{CoreError, CoreResult};
use crate::exports::{ExportRecord, ExportTable};
use crate::plan::{DeploymentPlan, PlannedStack};
use crate::registry::ResourceRegistry;
use crate::resolver::DependencyResolver;
use crate::resource::Resource;

/// Run state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Run has not started
    #[default]
    Pending,
    /// Run is executing stacks
    Running,
    /// Every stack executed
    Completed,
    /// Run halted at a failing stack
    Failed,
    /// Run was cancelled between stacks
    Cancelled,
}

/// What one executed stack produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackOutcome {
    pub stack: String,
    /// Ids of the registered resources
    pub resources: Vec<String>,
    /// Names of the published exports
    pub exports: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Persistent record of a provisioning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentReport {
    /// Run ID
    pub run_id: String,
    /// Optional run label from configuration
    pub label: Option<String>,
    /// Run state
    pub state: RunState,
    /// Planned stack order
    pub order: Vec<String>,
    /// Stacks that executed successfully, in order
    pub completed: Vec<StackOutcome>,
    /// Stack the run halted at
    pub failed_stack: Option<String>,
    /// Error message if the run halted
    pub error: Option<String>,
    /// Stacks that never started
    pub pending: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DeploymentReport {
    fn new(order: Vec<String>, label: Option<String>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            label,
            state: RunState::Pending,
            pending: order.clone(),
            order,
            completed: Vec::new(),
            failed_stack: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Ids of the stacks that completed.
    pub fn completed_stacks(&self) -> Vec<&str> {
        self.completed.iter().map(|o| o.stack.as_str()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.state == RunState::Completed
    }

    /// Get the log file path for this run inside `runs_dir`.
    pub fn log_path(&self, runs_dir: &Path) -> PathBuf {
        runs_dir.join(format!("{}.json", self.run_id))
    }

    /// Save the report into `runs_dir`.
    pub fn save(&self, runs_dir: &Path) -> CoreResult<PathBuf> {
        fs::create_dir_all(runs_dir)?;
        let path = self.log_path(runs_dir);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        debug!("Saved run log to {:?}", path);
        Ok(path)
    }

    /// Load a report from disk.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Cloneable handle used to stop a run between stacks.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives provisioning runs over a stack catalog.
///
/// The planner is the single writer of the resource registry and the export
/// table during a run. Stacks execute strictly one after another in plan
/// order.
pub struct ProvisioningPlanner {
    catalog: Arc<StackCatalog>,
    config: PlannerConfig,
    cancel: CancelHandle,
}

impl ProvisioningPlanner {
    /// Create a new planner over the given catalog.
    pub fn new(catalog: Arc<StackCatalog>, config: PlannerConfig) -> Self {
        Self {
            catalog,
            config,
            cancel: CancelHandle::default(),
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &StackCatalog {
        &self.catalog
    }

    /// Handle that cancels the current or next run.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Resolve the catalog into a deployment plan.
    pub fn plan(&self) -> CoreResult<DeploymentPlan> {
        DependencyResolver::new().resolve(&self.catalog)
    }

    /// Load the export table from the state directory, or an empty table
    /// when persistence is disabled.
    pub fn load_exports(&self) -> CoreResult<ExportTable> {
        if self.config.persist {
            ExportTable::load(&self.config.exports_path())
        } else {
            Ok(ExportTable::new())
        }
    }

    /// Plan and run the whole catalog against the persisted export table.
    pub async fn deploy(&self, registry: &mut ResourceRegistry) -> CoreResult<DeploymentReport> {
        let plan = self.plan()?;
        let mut exports = self.load_exports()?;
        self.run(plan, registry, &mut exports).await
    }

    /// Check everything that can fail before the first stack executes.
    ///
    /// Exports expected from previous runs must already exist with a
    /// compatible shape, and no planned export name may already belong to
    /// another stack.
    pub fn preflight(&self, plan: &DeploymentPlan, registry: &ResourceRegistry, exports: &ExportTable) -> CoreResult<()> {
        for planned in plan.stacks() {
            self.catalog.get_required(&planned.id)?;
            check_export_ownership(planned, exports).map_err(|e| {
                warn!("Preflight failed for {}: {}", planned.id, e);
                e
            })?;
        }

        let broker = ReferenceBroker::new(registry, exports);
        for (stack, input) in plan.external_inputs() {
            if let Some(name) = input.selector.export_name() {
                broker.resolve_export(&input.selector, name).map_err(|e| {
                    warn!("Preflight failed for {}: {}", stack, e);
                    e
                })?;
            }
        }
        Ok(())
    }

    /// Execute a plan.
    ///
    /// Runs every stack in order, stopping at the first failure. Resources
    /// created by completed stacks stay registered; nothing is rolled back.
    /// A halted run returns `CoreError::Halted` carrying the partial report.
    pub async fn run(
        &self,
        plan: DeploymentPlan,
        registry: &mut ResourceRegistry,
        exports: &mut ExportTable,
    ) -> CoreResult<DeploymentReport> {
        self.preflight(&plan, registry, exports)?;

        let order: Vec<String> = plan.order().into_iter().map(str::to_string).collect();
        let mut report = DeploymentReport::new(order, self.config.run_label.clone());
        report.state = RunState::Running;
        report.started_at = Some(Utc::now());

        info!("Starting provisioning run {} ({} stacks)", report.run_id, plan.len());

        let total = plan.len();
        for (i, planned) in plan.stacks().iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("Run {} cancelled before stack {}", report.run_id, planned.id);
                report.state = RunState::Cancelled;
                return Err(self.halt(report, CoreError::Cancelled(planned.id.clone())));
            }

            info!("Executing stack [{}/{}]: {}", i + 1, total, planned.id);
            report.pending.retain(|id| id != &planned.id);

            let started_at = Utc::now();
            match self.execute_stack(planned, registry, exports, &report.run_id).await {
                Ok((resources, published)) => {
                    // Resources are registered from here on; a failed state
                    // write still lists the stack as completed.
                    let persist_exports = !published.is_empty();
                    report.completed.push(StackOutcome {
                        stack: planned.id.clone(),
                        resources,
                        exports: published,
                        started_at,
                        completed_at: Utc::now(),
                    });
                    if let Err(e) = self.persist_state(&report, exports, persist_exports) {
                        error!("Failed to persist state after stack '{}': {}", planned.id, e);
                        report.state = RunState::Failed;
                        report.failed_stack = Some(planned.id.clone());
                        return Err(self.halt(report, e));
                    }
                    info!("Stack '{}' completed successfully", planned.id);
                }
                Err(e) => {
                    if matches!(e, CoreError::MissingBinding { .. }) {
                        error!("Internal invariant violated in stack '{}': {}", planned.id, e);
                    } else {
                        error!("Stack '{}' failed: {}", planned.id, e);
                    }
                    report.state = RunState::Failed;
                    report.failed_stack = Some(planned.id.clone());
                    return Err(self.halt(report, e));
                }
            }
        }

        report.state = RunState::Completed;
        report.completed_at = Some(Utc::now());
        if let Err(e) = self.persist_report(&report) {
            error!("Failed to persist run log for {}: {}", report.run_id, e);
            report.state = RunState::Failed;
            return Err(self.halt(report, e));
        }

        info!("Provisioning run {} completed", report.run_id);
        Ok(report)
    }

    /// Resolve, execute, validate and commit one stack.
    ///
    /// Returns the registered resource ids and published export names.
    async fn execute_stack(
        &self,
        planned: &PlannedStack,
        registry: &mut ResourceRegistry,
        exports: &mut ExportTable,
        run_id: &str,
    ) -> CoreResult<(Vec<String>, Vec<String>)> {
        let stack = self.catalog.get_required(&planned.id)?;

        let bindings = ReferenceBroker::new(registry, exports).bind_all(&planned.id, &planned.inputs)?;
        debug!("Bound {} inputs for {}", bindings.len(), planned.id);

        let resources = stack.execute(&bindings).await?;
        let records = validate_outputs(planned, &resources, registry, exports)?;

        // Validation guarantees neither registration nor publication fails,
        // so a stack's outputs are committed all together.
        let mut ids = Vec::with_capacity(resources.len());
        for resource in resources {
            ids.push(registry.register(resource)?.id().to_string());
        }

        let mut published = Vec::with_capacity(records.len());
        for record in records {
            let name = record.name.clone();
            if let Some(resource_id) = record.resource_id.clone() {
                registry.record_export(&planned.id, &name, &resource_id)?;
            }
            exports.publish(record.with_run_id(run_id))?;
            published.push(name);
        }

        Ok((ids, published))
    }

    fn persist_state(&self, report: &DeploymentReport, exports: &ExportTable, with_exports: bool) -> CoreResult<()> {
        if self.config.persist && with_exports {
            exports.save(&self.config.exports_path())?;
        }
        self.persist_report(report)
    }

    fn persist_report(&self, report: &DeploymentReport) -> CoreResult<()> {
        if self.config.persist {
            report.save(&self.config.runs_dir())?;
        }
        Ok(())
    }

    fn halt(&self, mut report: DeploymentReport, source: CoreError) -> CoreError {
        report.error = Some(source.to_string());
        report.completed_at = Some(Utc::now());
        if let Err(e) = self.persist_report(&report) {
            warn!("Failed to persist run log for {}: {}", report.run_id, e);
        }
        CoreError::Halted {
            report: Box::new(report),
            source: Box::new(source),
        }
    }
}

/// Fail with `ExportCollision` if a name the stack exports is already owned
/// by another stack or by an external value.
fn check_export_ownership(planned: &PlannedStack, exports: &ExportTable) -> CoreResult<()> {
    for export in &planned.exports {
        if let Some(existing) = exports.get(&export.name) {
            if existing.producing_stack.as_deref() != Some(planned.id.as_str()) {
                return Err(CoreError::ExportCollision {
                    name: export.name.clone(),
                    existing: existing
                        .producing_stack
                        .clone()
                        .unwrap_or_else(|| "<external>".to_string()),
                    attempted: planned.id.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Check a stack's outputs against its declarations and build its export
/// records.
fn validate_outputs(
    planned: &PlannedStack,
    resources: &[Resource],
    registry: &ResourceRegistry,
    exports: &ExportTable,
) -> CoreResult<Vec<ExportRecord>> {
    let invalid = |message: String| CoreError::InvalidOutput {
        stack: planned.id.clone(),
        message,
    };

    let mut ids = HashSet::new();
    for resource in resources {
        if resource.producing_stack() != planned.id {
            return Err(invalid(format!(
                "resource '{}' claims to be produced by '{}'",
                resource.id(),
                resource.producing_stack()
            )));
        }
        if !planned.produces.contains(&resource.kind()) {
            return Err(invalid(format!(
                "resource '{}' is of undeclared kind {}",
                resource.id(),
                resource.kind()
            )));
        }
        let missing = resource.kind().missing_attributes(resource.attributes());
        if !missing.is_empty() {
            return Err(invalid(format!(
                "{} resource '{}' is missing attributes: {}",
                resource.kind(),
                resource.id(),
                missing.join(", ")
            )));
        }
        if registry.contains(resource.id()) || !ids.insert(resource.id()) {
            return Err(CoreError::DuplicateId(resource.id().to_string()));
        }
    }

    for kind in &planned.produces {
        let count = resources.iter().filter(|r| r.kind() == *kind).count();
        if count != 1 {
            return Err(invalid(format!("expected exactly one {} resource, got {}", kind, count)));
        }
    }

    check_export_ownership(planned, exports)?;

    let mut records = Vec::with_capacity(planned.exports.len());
    for export in &planned.exports {
        let resource = resources
            .iter()
            .find(|r| r.kind() == export.kind)
            .ok_or_else(|| invalid(format!("export '{}' has no {} resource", export.name, export.kind)))?;
        let record = ExportRecord::from_resource(&export.name, resource, export.attribute_name()).ok_or_else(|| {
            invalid(format!(
                "export '{}' refers to missing attribute '{}'",
                export.name,
                export.attribute_name()
            ))
        })?;
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisioningError;
    use crate::resource::ResourceKind;
    use crate::stack::ExportDeclaration;

    fn planned_network() -> PlannedStack {
        PlannedStack {
            id: "Network".to_string(),
            inputs: vec![],
            produces: vec![ResourceKind::Network],
            exports: vec![ExportDeclaration::new("SkillShiftVpcId", ResourceKind::Network)],
        }
    }

    fn vpc(producer: &str) -> Resource {
        Resource::new(format!("{}/Vpc", producer), ResourceKind::Network, producer).with_attribute("vpcId", "vpc-1")
    }

    #[test]
    fn test_validate_outputs_builds_export_records() {
        let records = validate_outputs(
            &planned_network(),
            &[vpc("Network")],
            &ResourceRegistry::new(),
            &ExportTable::new(),
        )
        .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, "vpc-1");
    }

    #[test]
    fn test_validate_outputs_rejects_foreign_producer() {
        let err = validate_outputs(
            &planned_network(),
            &[vpc("Cluster")],
            &ResourceRegistry::new(),
            &ExportTable::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidOutput { .. }));
    }

    #[test]
    fn test_validate_outputs_requires_declared_kinds() {
        let err = validate_outputs(&planned_network(), &[], &ResourceRegistry::new(), &ExportTable::new())
            .unwrap_err();
        assert!(err.to_string().contains("expected exactly one network resource, got 0"));

        let role = Resource::new("Network/Role", ResourceKind::Role, "Network").with_attribute("roleArn", "arn");
        let err = validate_outputs(
            &planned_network(),
            &[vpc("Network"), role],
            &ResourceRegistry::new(),
            &ExportTable::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("undeclared kind role"));
    }

    #[test]
    fn test_validate_outputs_rejects_registered_id() {
        let mut registry = ResourceRegistry::new();
        registry.register(vpc("Network")).unwrap();

        let err = validate_outputs(&planned_network(), &[vpc("Network")], &registry, &ExportTable::new())
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateId(_)));
    }

    #[test]
    fn test_validate_outputs_export_owned_elsewhere() {
        let mut exports = ExportTable::new();
        exports
            .publish(ExportRecord::from_resource("SkillShiftVpcId", &vpc("Legacy"), "vpcId").unwrap())
            .unwrap();

        let err = validate_outputs(&planned_network(), &[vpc("Network")], &ResourceRegistry::new(), &exports)
            .unwrap_err();
        assert!(matches!(err, CoreError::ExportCollision { ref existing, .. } if existing == "Legacy"));
    }

    #[test]
    fn test_cancel_handle_shared() {
        let handle = CancelHandle::default();
        let clone = handle.clone();
        assert!(!handle.is_cancelled());
        clone.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_provisioning_error_maps_to_missing_binding() {
        let err: CoreError = ProvisioningError::MissingBinding {
            stack: "Cluster".to_string(),
            selector: "network".to_string(),
        }
        .into();
        assert!(matches!(err, CoreError::MissingBinding { .. }));
    }
}
