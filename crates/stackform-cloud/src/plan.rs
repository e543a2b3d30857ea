//! Plan engine
//!
//! Diffs the desired resource model against the state store and produces an
//! ordered list of actions. No-ops are explicit in the plan so a caller can
//! preview exactly what an apply would (not) touch.

use std::collections::BTreeMap;

use crate::action::{Action, AttributeDiff, Plan};
use crate::error::{CloudError, Result};
use crate::provider::Attributes;
use crate::state::{ResourceStatus, StateStore};
use stackform_core::{DependencyGraph, ResourceKey, ResourceSpec};

/// Resolve a spec's attributes against the store
///
/// Reference slots whose producer is not `Created` yet stay unresolved. In
/// strict mode (executor) that is an error; in lenient mode (planner) the
/// slot is simply left out of the comparison, because the producing action
/// is ordered first anyway.
pub fn resolve_attributes(
    spec: &ResourceSpec,
    store: &StateStore,
    strict: bool,
) -> Result<Attributes> {
    let mut attrs = spec.attributes.clone();
    for reference in &spec.references {
        let resolved = store
            .get(&reference.target)
            .filter(|s| s.status == ResourceStatus::Created)
            .and_then(|s| s.attributes.get(&reference.output).cloned());
        match resolved {
            Some(value) => {
                attrs.insert(reference.slot.clone(), value);
            }
            None if strict => {
                return Err(CloudError::UnresolvedReference {
                    referrer: spec.key(),
                    target: reference.target.clone(),
                    slot: reference.slot.clone(),
                    output: reference.output.clone(),
                });
            }
            None => {}
        }
    }
    Ok(attrs)
}

pub struct Planner;

impl Planner {
    /// Diff desired specs against current state, in topological order
    pub fn diff(
        graph: &DependencyGraph,
        specs: &[ResourceSpec],
        store: &StateStore,
    ) -> Result<Plan> {
        let by_key: BTreeMap<ResourceKey, &ResourceSpec> =
            specs.iter().map(|s| (s.key(), s)).collect();

        let mut actions = Vec::with_capacity(graph.order().len());
        for (position, key) in graph.order().iter().enumerate() {
            let Some(spec) = by_key.get(key) else {
                continue;
            };

            // Defensive: the graph guarantees producers come first, so a
            // reference pointing forward would mean the sort itself broke.
            for reference in &spec.references {
                let target_position = graph.position(&reference.target);
                if target_position.is_none() || target_position >= Some(position) {
                    return Err(CloudError::UnresolvedReference {
                        referrer: spec.key(),
                        target: reference.target.clone(),
                        slot: reference.slot.clone(),
                        output: reference.output.clone(),
                    });
                }
            }

            let action = match store.get(key) {
                Some(state) if state.status == ResourceStatus::Created => {
                    let desired = resolve_attributes(spec, store, false)?;
                    let diff = attribute_diff(&desired, &state.attributes);
                    if diff.is_empty() {
                        Action::Noop {
                            spec: (*spec).clone(),
                        }
                    } else {
                        Action::Update {
                            spec: (*spec).clone(),
                            diff,
                        }
                    }
                }
                // No record, or a Pending/Failed leftover from an earlier
                // partial run: (re)create.
                _ => Action::Create {
                    spec: (*spec).clone(),
                },
            };
            actions.push(action);
        }

        let plan = Plan::new(actions);
        tracing::debug!(summary = %plan.summary(), "plan computed");
        Ok(plan)
    }

    /// Emit a delete for every stored resource, dependents first
    ///
    /// States with no declared counterpart (orphans) go first: nothing we
    /// know of depends on them.
    pub fn destroy(graph: &DependencyGraph, store: &StateStore) -> Plan {
        let mut actions = Vec::with_capacity(store.len());

        for state in store.states() {
            if graph.position(&state.key()).is_none() {
                actions.push(Action::Delete {
                    state: state.clone(),
                });
            }
        }
        for key in graph.reverse_order() {
            if let Some(state) = store.get(&key) {
                actions.push(Action::Delete {
                    state: state.clone(),
                });
            }
        }

        let plan = Plan::new(actions);
        tracing::debug!(summary = %plan.summary(), "destroy plan computed");
        plan
    }
}

fn attribute_diff(desired: &Attributes, current: &Attributes) -> Vec<AttributeDiff> {
    desired
        .iter()
        .filter(|(k, v)| current.get(*k) != Some(v))
        .map(|(k, v)| AttributeDiff {
            attribute: k.clone(),
            current: current.get(k).cloned(),
            desired: v.clone(),
        })
        .collect()
}
