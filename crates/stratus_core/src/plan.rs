//! Deployment plans produced by the resolver.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::resource::ResourceKind;
use crate::selector::ResourceSelector;
use crate::stack::ExportDeclaration;

/// Where a planned input is resolved from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "name")]
pub enum InputSource {
    /// Produced earlier in the same run by this stack.
    Stack(String),
    /// Looked up by export name. `publisher` is the in-plan stack that
    /// declares the export, if any; otherwise the export must already exist.
    Export {
        name: String,
        publisher: Option<String>,
    },
}

/// A selector together with the producer the resolver chose for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedInput {
    pub selector: ResourceSelector,
    pub source: InputSource,
}

impl PlannedInput {
    /// The in-plan stack this input depends on, if any.
    pub fn upstream(&self) -> Option<&str> {
        match &self.source {
            InputSource::Stack(id) => Some(id),
            InputSource::Export { publisher, .. } => publisher.as_deref(),
        }
    }

    /// Whether this input relies on an export from a previous run.
    pub fn is_external(&self) -> bool {
        matches!(self.source, InputSource::Export { publisher: None, .. })
    }
}

/// One step of a deployment plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStack {
    pub id: String,
    pub inputs: Vec<PlannedInput>,
    pub produces: Vec<ResourceKind>,
    pub exports: Vec<ExportDeclaration>,
}

impl PlannedStack {
    /// In-plan stacks this stack depends on, sorted and deduplicated.
    pub fn dependencies(&self) -> BTreeSet<&str> {
        self.inputs.iter().filter_map(|i| i.upstream()).collect()
    }
}

/// An ordered, immutable deployment plan.
///
/// For every stack, all of its in-plan dependencies appear strictly earlier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    stacks: Vec<PlannedStack>,
    phases: Vec<Vec<String>>,
}

impl DeploymentPlan {
    pub(crate) fn new(stacks: Vec<PlannedStack>) -> Self {
        let phases = compute_phases(&stacks);
        Self { stacks, phases }
    }

    /// Stacks in execution order.
    pub fn stacks(&self) -> &[PlannedStack] {
        &self.stacks
    }

    /// Stack ids in execution order.
    pub fn order(&self) -> Vec<&str> {
        self.stacks.iter().map(|s| s.id.as_str()).collect()
    }

    /// Stacks grouped by dependency depth. Stacks within one phase have no
    /// dependency relationship with each other.
    pub fn phases(&self) -> &[Vec<String>] {
        &self.phases
    }

    pub fn get(&self, id: &str) -> Option<&PlannedStack> {
        self.stacks.iter().find(|s| s.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.stacks.iter().position(|s| s.id == id)
    }

    /// Inputs that must be satisfied by exports from previous runs.
    pub fn external_inputs(&self) -> Vec<(&str, &PlannedInput)> {
        self.stacks
            .iter()
            .flat_map(|s| s.inputs.iter().filter(|i| i.is_external()).map(move |i| (s.id.as_str(), i)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// Compare this plan against a previous revision.
    pub fn diff(&self, previous: &DeploymentPlan) -> PlanDiff {
        let current: Vec<&str> = self.order();
        let before: Vec<&str> = previous.order();

        let added = current
            .iter()
            .filter(|id| !before.contains(id))
            .map(|id| id.to_string())
            .collect();
        let removed = before
            .iter()
            .filter(|id| !current.contains(id))
            .map(|id| id.to_string())
            .collect();

        // Relative order of the stacks both plans share
        let shared_now: Vec<&str> = current.iter().copied().filter(|id| before.contains(id)).collect();
        let shared_before: Vec<&str> = before.iter().copied().filter(|id| current.contains(id)).collect();
        let moved = shared_now
            .iter()
            .zip(shared_before.iter())
            .filter(|(now, was)| now != was)
            .map(|(now, _)| now.to_string())
            .collect();

        let changed = self
            .stacks
            .iter()
            .filter_map(|s| previous.get(&s.id).filter(|p| *p != s).map(|_| s.id.clone()))
            .collect();

        PlanDiff {
            added,
            removed,
            moved,
            changed,
        }
    }
}

/// Differences between two plan revisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDiff {
    /// Stacks only in the new plan
    pub added: Vec<String>,
    /// Stacks only in the previous plan
    pub removed: Vec<String>,
    /// Shared stacks whose relative position changed
    pub moved: Vec<String>,
    /// Shared stacks whose inputs, outputs or exports changed
    pub changed: Vec<String>,
}

impl PlanDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.moved.is_empty() && self.changed.is_empty()
    }
}

fn compute_phases(stacks: &[PlannedStack]) -> Vec<Vec<String>> {
    let mut depth: HashMap<&str, usize> = HashMap::new();
    let mut phases: Vec<Vec<String>> = Vec::new();

    // Plan order is topological, so every dependency already has a depth.
    for stack in stacks {
        let level = stack
            .dependencies()
            .iter()
            .filter_map(|dep| depth.get(dep))
            .map(|d| d + 1)
            .max()
            .unwrap_or(0);
        depth.insert(&stack.id, level);
        if phases.len() <= level {
            phases.resize_with(level + 1, Vec::new);
        }
        phases[level].push(stack.id.clone());
    }

    phases
}
