//! Dependency graph builder
//!
//! Derives a partial order over declared resources from their references.
//! The resulting order is deterministic: independent resources keep their
//! declaration order, so repeated plans list actions identically.

use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::model::{ResourceKey, ResourceSpec};

/// Topologically sorted view over a set of resource specs
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    order: Vec<ResourceKey>,
    deps: BTreeMap<ResourceKey, Vec<ResourceKey>>,
    dependents: BTreeMap<ResourceKey, Vec<ResourceKey>>,
}

impl DependencyGraph {
    /// Build the graph from declared specs
    ///
    /// Fails when a reference points at a resource that is not declared,
    /// or when the reference graph contains a cycle (the error carries one
    /// full cycle path).
    pub fn build(specs: &[ResourceSpec]) -> Result<Self> {
        let mut deps: BTreeMap<ResourceKey, Vec<ResourceKey>> = BTreeMap::new();
        let declared: Vec<ResourceKey> = specs.iter().map(ResourceSpec::key).collect();

        for spec in specs {
            let key = spec.key();
            let entry = deps.entry(key.clone()).or_default();
            for reference in &spec.references {
                if !declared.contains(&reference.target) {
                    return Err(CoreError::DanglingReference {
                        referrer: key,
                        target: reference.target.clone(),
                        slot: reference.slot.clone(),
                    });
                }
                if !entry.contains(&reference.target) {
                    entry.push(reference.target.clone());
                }
            }
        }

        let mut order = Vec::with_capacity(specs.len());
        let mut marks: BTreeMap<ResourceKey, Mark> = BTreeMap::new();
        let mut path: Vec<ResourceKey> = Vec::new();

        // Visiting in declaration order gives the deterministic tie-break.
        for key in &declared {
            visit(key, &deps, &mut marks, &mut path, &mut order)?;
        }

        let mut dependents: BTreeMap<ResourceKey, Vec<ResourceKey>> = BTreeMap::new();
        for key in &declared {
            dependents.entry(key.clone()).or_default();
        }
        for key in &order {
            if let Some(targets) = deps.get(key) {
                for target in targets {
                    dependents
                        .entry(target.clone())
                        .or_default()
                        .push(key.clone());
                }
            }
        }

        tracing::debug!(resources = order.len(), "dependency graph built");

        Ok(Self {
            order,
            deps,
            dependents,
        })
    }

    /// Resources in creation order (every reference target precedes its
    /// referrer)
    pub fn order(&self) -> &[ResourceKey] {
        &self.order
    }

    /// Resources in teardown order (dependents before their dependencies)
    pub fn reverse_order(&self) -> Vec<ResourceKey> {
        self.order.iter().rev().cloned().collect()
    }

    /// Direct dependencies of a resource (its reference targets)
    pub fn dependencies_of(&self, key: &ResourceKey) -> &[ResourceKey] {
        self.deps.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct dependents of a resource (resources referencing it)
    pub fn dependents_of(&self, key: &ResourceKey) -> &[ResourceKey] {
        self.dependents.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Position of a resource in the creation order
    pub fn position(&self, key: &ResourceKey) -> Option<usize> {
        self.order.iter().position(|k| k == key)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    InProgress,
    Done,
}

fn visit(
    key: &ResourceKey,
    deps: &BTreeMap<ResourceKey, Vec<ResourceKey>>,
    marks: &mut BTreeMap<ResourceKey, Mark>,
    path: &mut Vec<ResourceKey>,
    order: &mut Vec<ResourceKey>,
) -> Result<()> {
    match marks.get(key) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::InProgress) => {
            // Slice the current path from the first occurrence of `key` and
            // close the loop, so the error shows a -> b -> a.
            let start = path.iter().position(|k| k == key).unwrap_or(0);
            let mut cycle: Vec<ResourceKey> = path[start..].to_vec();
            cycle.push(key.clone());
            return Err(CoreError::CircularDependency { path: cycle });
        }
        None => {}
    }

    marks.insert(key.clone(), Mark::InProgress);
    path.push(key.clone());

    let targets = deps.get(key).cloned().unwrap_or_default();
    for dep in &targets {
        visit(dep, deps, marks, path, order)?;
    }

    path.pop();
    marks.insert(key.clone(), Mark::Done);
    order.push(key.clone());
    Ok(())
}
