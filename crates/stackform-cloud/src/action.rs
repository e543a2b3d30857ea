//! Planned actions and apply results

use serde::{Deserialize, Serialize};
use stackform_core::{ResourceKey, ResourceSpec};

use crate::state::ResourceState;

/// One attribute-level difference between desired and stored state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDiff {
    pub attribute: String,
    pub current: Option<serde_json::Value>,
    pub desired: serde_json::Value,
}

/// A planned action for a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Create a resource that has no live counterpart
    Create { spec: ResourceSpec },

    /// Replace a live resource whose attributes drifted from the template
    Update {
        spec: ResourceSpec,
        diff: Vec<AttributeDiff>,
    },

    /// Tear down a live resource
    Delete { state: ResourceState },

    /// Resource matches the template, nothing to do
    Noop { spec: ResourceSpec },
}

impl Action {
    pub fn key(&self) -> ResourceKey {
        match self {
            Action::Create { spec } | Action::Update { spec, .. } | Action::Noop { spec } => {
                spec.key()
            }
            Action::Delete { state } => state.key(),
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Action::Create { .. } => "create",
            Action::Update { .. } => "update",
            Action::Delete { .. } => "delete",
            Action::Noop { .. } => "no-op",
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Action::Noop { .. })
    }
}

/// Plan containing all actions for one invocation
///
/// Built fresh each run, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub actions: Vec<Action>,
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| !a.is_noop());
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self {
            actions: Vec::new(),
            has_changes: false,
        }
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for action in &self.actions {
            match action {
                Action::Create { .. } => summary.create += 1,
                Action::Update { .. } => summary.update += 1,
                Action::Delete { .. } => summary.delete += 1,
                Action::Noop { .. } => summary.no_change += 1,
            }
        }
        summary
    }
}

/// Counts of planned actions by type
#[derive(Debug, Clone, Default)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete, {} unchanged",
            self.create, self.update, self.delete, self.no_change
        )
    }
}

/// Terminal outcome of one executed action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        provider_id: Option<String>,
        message: String,
    },
    Failure {
        error: String,
    },
    /// Never attempted: a (transitive) dependency failed
    Blocked {
        dependency: ResourceKey,
    },
    /// Never attempted: the caller cancelled the run
    Cancelled,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// Result of one action within an apply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub key: ResourceKey,
    pub verb: String,
    pub outcome: Outcome,
}

/// Result of applying a full plan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Per-action results, in plan order
    pub results: Vec<ActionResult>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_success())
    }

    pub fn failed(&self) -> Vec<&ActionResult> {
        self.results
            .iter()
            .filter(|r| !r.outcome.is_success())
            .collect()
    }

    pub fn record(&mut self, key: ResourceKey, verb: &str, outcome: Outcome) {
        self.results.push(ActionResult {
            key,
            verb: verb.to_string(),
            outcome,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackform_core::{ResourceKind, ResourceSpec};

    #[test]
    fn test_plan_summary() {
        let plan = Plan::new(vec![
            Action::Create {
                spec: ResourceSpec::new(ResourceKind::Bucket, "a"),
            },
            Action::Noop {
                spec: ResourceSpec::new(ResourceKind::KeyPair, "b"),
            },
        ]);
        assert!(plan.has_changes);
        let summary = plan.summary();
        assert_eq!(summary.create, 1);
        assert_eq!(summary.no_change, 1);
        assert_eq!(summary.to_string(), "1 to create, 0 to update, 0 to delete, 1 unchanged");
    }

    #[test]
    fn test_all_noop_plan_has_no_changes() {
        let plan = Plan::new(vec![Action::Noop {
            spec: ResourceSpec::new(ResourceKind::Bucket, "a"),
        }]);
        assert!(!plan.has_changes);
    }
}
