//! Dependency resolution and topological ordering.
//!
//! Implements Kahn's algorithm over the stack dependency graph with:
//! - Producer lookup for every declared selector (unresolved and ambiguous
//!   selectors are fatal)
//! - A sorted ready set so independent stacks are always emitted in stack id
//!   order
//! - Cycle extraction reporting one concrete cycle in dependency order
//!
//! Resolution only reads declarations. No stack is executed.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, info};

use crate::catalog::StackCatalog;
use crate::error::{CoreError, CoreResult};
use crate::plan::{DeploymentPlan, InputSource, PlannedInput, PlannedStack};
use crate::resource::ResourceKind;
use crate::selector::{ResourceSelector, SelectorSource};
use crate::stack::ExportDeclaration;

/// Declarations captured from one stack.
struct Declared {
    requires: Vec<ResourceSelector>,
    produces: Vec<ResourceKind>,
    exports: Vec<ExportDeclaration>,
}

/// Computes deployment plans from stack declarations.
#[derive(Debug, Default, Clone, Copy)]
pub struct DependencyResolver;

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Build a deployment plan for every stack in the catalog.
    ///
    /// Fails without producing a plan on the first configuration error:
    /// export collisions, unresolved or ambiguous selectors, export kind
    /// mismatches, or dependency cycles.
    pub fn resolve(&self, catalog: &StackCatalog) -> CoreResult<DeploymentPlan> {
        // Declarations are snapshotted once so the graph is built from a
        // single consistent view.
        let declared: BTreeMap<String, Declared> = catalog
            .iter()
            .map(|stack| {
                (
                    stack.id().to_string(),
                    Declared {
                        requires: stack.requires(),
                        produces: stack.produces(),
                        exports: stack.exports(),
                    },
                )
            })
            .collect();

        let publishers = collect_publishers(&declared)?;

        // Step 1: bind every selector to its producer
        let mut planned: BTreeMap<String, PlannedStack> = BTreeMap::new();
        for (id, decl) in &declared {
            let mut inputs = Vec::with_capacity(decl.requires.len());
            let mut seen = HashSet::new();
            for selector in &decl.requires {
                if !seen.insert(selector.clone()) {
                    continue;
                }
                let source = resolve_source(id, selector, &declared, &publishers)?;
                inputs.push(PlannedInput {
                    selector: selector.clone(),
                    source,
                });
            }

            let mut produces = Vec::new();
            for kind in &decl.produces {
                if !produces.contains(kind) {
                    produces.push(*kind);
                }
            }

            planned.insert(
                id.clone(),
                PlannedStack {
                    id: id.clone(),
                    inputs,
                    produces,
                    exports: decl.exports.clone(),
                },
            );
        }

        let order = topological_order(&planned)?;
        info!("Resolved deployment plan: {}", order.join(" -> "));

        let stacks = order.iter().filter_map(|id| planned.remove(id)).collect();
        Ok(DeploymentPlan::new(stacks))
    }
}

/// Order planned stacks so every producer precedes its consumers.
fn topological_order(planned: &BTreeMap<String, PlannedStack>) -> CoreResult<Vec<String>> {
    // Step 2: build the graph (producer -> consumers)
    let mut dependents: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut dependencies: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for stack in planned.values() {
        dependents.entry(stack.id.as_str()).or_default();
        dependencies.insert(stack.id.as_str(), stack.dependencies());
    }
    for (&consumer, deps) in &dependencies {
        for &producer in deps {
            dependents.entry(producer).or_default().insert(consumer);
        }
    }

    // Step 3: Kahn's algorithm with a sorted ready set
    let mut in_degree: BTreeMap<&str, usize> =
        dependencies.iter().map(|(&id, deps)| (id, deps.len())).collect();
    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut order: Vec<String> = Vec::with_capacity(planned.len());

    while let Some(id) = ready.pop_first() {
        order.push(id.to_string());
        for &consumer in &dependents[id] {
            if let Some(degree) = in_degree.get_mut(consumer) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(consumer);
                }
            }
        }
    }

    // Step 4: anything left over sits on or behind a cycle
    if order.len() < planned.len() {
        let remaining: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, &degree)| degree > 0)
            .map(|(&id, _)| id)
            .collect();
        let cycle = find_cycle(&remaining, &dependencies);
        return Err(CoreError::CyclicDependency { cycle });
    }

    Ok(order)
}

/// Map export names to the stack declaring them.
fn collect_publishers(
    declared: &BTreeMap<String, Declared>,
) -> CoreResult<BTreeMap<String, (String, ResourceKind)>> {
    let mut publishers: BTreeMap<String, (String, ResourceKind)> = BTreeMap::new();
    for (id, decl) in declared {
        for export in &decl.exports {
            if let Some((existing, _)) = publishers.get(&export.name) {
                return Err(CoreError::ExportCollision {
                    name: export.name.clone(),
                    existing: existing.clone(),
                    attempted: id.clone(),
                });
            }
            if !decl.produces.contains(&export.kind) {
                return Err(CoreError::InvalidOutput {
                    stack: id.clone(),
                    message: format!(
                        "export '{}' publishes a {} resource the stack does not produce",
                        export.name, export.kind
                    ),
                });
            }
            publishers.insert(export.name.clone(), (id.clone(), export.kind));
        }
    }
    Ok(publishers)
}

fn resolve_source(
    consumer: &str,
    selector: &ResourceSelector,
    declared: &BTreeMap<String, Declared>,
    publishers: &BTreeMap<String, (String, ResourceKind)>,
) -> CoreResult<InputSource> {
    let unresolved = || CoreError::UnresolvedDependency {
        stack: consumer.to_string(),
        selector: selector.to_string(),
    };

    match &selector.source {
        SelectorSource::Stack(producer) => {
            let decl = declared.get(producer).ok_or_else(unresolved)?;
            if !decl.produces.contains(&selector.kind) {
                return Err(unresolved());
            }
            if producer == consumer {
                return Err(CoreError::CyclicDependency {
                    cycle: vec![consumer.to_string()],
                });
            }
            Ok(InputSource::Stack(producer.clone()))
        }
        SelectorSource::Any => {
            let candidates: Vec<&String> = declared
                .iter()
                .filter(|(id, decl)| id.as_str() != consumer && decl.produces.contains(&selector.kind))
                .map(|(id, _)| id)
                .collect();
            match candidates.as_slice() {
                [] => Err(unresolved()),
                [producer] => {
                    debug!("Selector {} in {} resolved to {}", selector, consumer, producer);
                    Ok(InputSource::Stack((*producer).clone()))
                }
                many => Err(CoreError::AmbiguousDependency {
                    stack: consumer.to_string(),
                    selector: selector.to_string(),
                    candidates: many.iter().map(|s| s.to_string()).collect(),
                }),
            }
        }
        SelectorSource::Export(name) => match publishers.get(name) {
            Some((publisher, kind)) => {
                if *kind != selector.kind {
                    return Err(CoreError::TypeMismatch {
                        selector: selector.to_string(),
                        message: format!("export '{}' is declared by '{}' as {}", name, publisher, kind),
                    });
                }
                if publisher == consumer {
                    return Err(CoreError::CyclicDependency {
                        cycle: vec![consumer.to_string()],
                    });
                }
                Ok(InputSource::Export {
                    name: name.clone(),
                    publisher: Some(publisher.clone()),
                })
            }
            None => {
                debug!("Export '{}' required by {} is external to this plan", name, consumer);
                Ok(InputSource::Export {
                    name: name.clone(),
                    publisher: None,
                })
            }
        },
    }
}

/// Extract one concrete cycle from the stacks Kahn's algorithm could not
/// order.
///
/// Every remaining stack still has a remaining dependency, so walking
/// dependencies from any of them must eventually revisit a stack. The cycle
/// is returned in deployment direction (each stack feeds the next), rotated
/// to start at its smallest id.
fn find_cycle(remaining: &BTreeSet<&str>, dependencies: &BTreeMap<&str, BTreeSet<&str>>) -> Vec<String> {
    let Some(start) = remaining.first().copied() else {
        return Vec::new();
    };

    let mut path: Vec<&str> = Vec::new();
    let mut current = start;
    loop {
        if let Some(pos) = path.iter().position(|id| *id == current) {
            let mut cycle: Vec<&str> = path[pos..].to_vec();
            // Walked consumer -> producer; flip to producer -> consumer
            cycle.reverse();
            if let Some(min_pos) = cycle.iter().enumerate().min_by_key(|(_, id)| **id).map(|(i, _)| i) {
                cycle.rotate_left(min_pos);
            }
            return cycle.into_iter().map(str::to_string).collect();
        }
        path.push(current);

        let next = dependencies
            .get(current)
            .and_then(|deps| deps.iter().copied().find(|dep| remaining.contains(dep)));
        match next {
            Some(dep) => current = dep,
            None => return path.into_iter().map(str::to_string).collect(),
        }
    }
}
