//! Plan executor
//!
//! Runs planned actions against a provider as a bounded task graph: an
//! action starts once every action it depends on has reached a terminal
//! outcome, independent actions run concurrently, and each result is
//! committed to the state store before anything that consumes it is
//! scheduled. A failure blocks its transitive dependents but leaves
//! independent branches running.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;

use crate::action::{Action, ApplyResult, Outcome, Plan};
use crate::error::{CloudError, Result};
use crate::plan::resolve_attributes;
use crate::provider::{Attributes, Provider};
use crate::secret;
use crate::state::{ResourceState, ResourceStatus, StateStore};
use stackform_core::{DependencyGraph, ResourceKey, ResourceKind, ResourceSpec};

/// Tuning knobs for an apply run
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Maximum number of provider calls in flight at once
    pub concurrency: usize,

    /// Deadline for a single provider call
    pub call_timeout: Duration,

    /// Override for the private-key sink path (default: `<key_name>.pem`
    /// in the working directory)
    pub key_file: Option<PathBuf>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            call_timeout: Duration::from_secs(30),
            key_file: None,
        }
    }
}

/// Cooperative cancellation: not-yet-started actions stay unscheduled,
/// in-flight provider calls finish and their results are committed
#[derive(Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

enum ExecOutcome {
    Created {
        provider_id: String,
        attributes: Attributes,
    },
    Deleted,
    Failed {
        error: String,
    },
}

pub struct Executor {
    provider: Arc<dyn Provider>,
    options: ExecutorOptions,
    cancel: CancelHandle,
}

impl Executor {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self::with_options(provider, ExecutorOptions::default())
    }

    pub fn with_options(provider: Arc<dyn Provider>, options: ExecutorOptions) -> Self {
        Self {
            provider,
            options,
            cancel: CancelHandle::default(),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Apply a plan, committing every result to the store as it lands
    pub async fn apply(
        &self,
        plan: &Plan,
        graph: &DependencyGraph,
        store: &mut StateStore,
    ) -> Result<ApplyResult> {
        let start = Instant::now();
        let mut result = ApplyResult::new();

        let plan_order: Vec<ResourceKey> = plan.actions.iter().map(Action::key).collect();
        let mut pending: BTreeMap<ResourceKey, Action> = plan
            .actions
            .iter()
            .map(|a| (a.key(), a.clone()))
            .collect();

        // Predecessors within this plan. Creates wait on their reference
        // targets; deletes wait on the deletes of their dependents.
        let mut blockers: BTreeMap<ResourceKey, BTreeSet<ResourceKey>> = BTreeMap::new();
        for (key, action) in &pending {
            let preds = match action {
                Action::Delete { .. } => graph.dependents_of(key),
                _ => graph.dependencies_of(key),
            };
            blockers.insert(
                key.clone(),
                preds
                    .iter()
                    .filter(|p| pending.contains_key(*p))
                    .cloned()
                    .collect(),
            );
        }

        let mut queued: BTreeSet<ResourceKey> = BTreeSet::new();
        let mut ready: VecDeque<ResourceKey> = VecDeque::new();
        for key in &plan_order {
            if blockers.get(key).is_none_or(BTreeSet::is_empty) {
                ready.push_back(key.clone());
                queued.insert(key.clone());
            }
        }

        let mut in_flight: JoinSet<(ResourceKey, &'static str, ExecOutcome)> = JoinSet::new();

        loop {
            while !self.cancel.is_cancelled() && in_flight.len() < self.options.concurrency {
                let Some(key) = ready.pop_front() else { break };
                // A key can sit in the ready queue after its action was
                // blocked away; skip it.
                let Some(action) = pending.remove(&key) else {
                    continue;
                };

                match action {
                    Action::Noop { .. } => {
                        let provider_id = store.get(&key).and_then(|s| s.provider_id.clone());
                        result.record(
                            key.clone(),
                            "no-op",
                            Outcome::Success {
                                provider_id,
                                message: "no changes".to_string(),
                            },
                        );
                        unblock(&key, &mut blockers, &pending, &plan_order, &mut ready, &mut queued);
                    }
                    Action::Create { spec } => {
                        self.spawn_write(&key, "create", &spec, None, store, &mut in_flight, &mut pending, &mut blockers, &mut result)
                            .await?;
                    }
                    Action::Update { spec, .. } => {
                        let prior_id = store.get(&key).and_then(|s| s.provider_id.clone());
                        self.spawn_write(&key, "update", &spec, prior_id, store, &mut in_flight, &mut pending, &mut blockers, &mut result)
                            .await?;
                    }
                    Action::Delete { state } => {
                        let Some(provider_id) = state.provider_id.clone() else {
                            // Never materialized at the provider; just drop
                            // the record.
                            store.remove(&key).await?;
                            result.record(
                                key.clone(),
                                "delete",
                                Outcome::Success {
                                    provider_id: None,
                                    message: "no live resource to delete".to_string(),
                                },
                            );
                            unblock(&key, &mut blockers, &pending, &plan_order, &mut ready, &mut queued);
                            continue;
                        };

                        let provider = Arc::clone(&self.provider);
                        let timeout = self.options.call_timeout;
                        let kind = state.kind;
                        let k = key.clone();
                        tracing::info!(resource = %key, "deleting");
                        in_flight.spawn(async move {
                            let exec = match timed(provider.delete_resource(kind, &provider_id), timeout).await {
                                Ok(()) => ExecOutcome::Deleted,
                                Err(e) => ExecOutcome::Failed {
                                    error: e.to_string(),
                                },
                            };
                            (k, "delete", exec)
                        });
                    }
                }
            }

            if in_flight.is_empty() {
                break;
            }

            match in_flight.join_next().await {
                Some(Ok((key, verb, exec))) => match exec {
                    ExecOutcome::Created {
                        provider_id,
                        attributes,
                    } => {
                        let mut state = ResourceState::new(key.kind, key.name.clone())
                            .with_status(ResourceStatus::Created)
                            .with_provider_id(provider_id.clone());
                        state.attributes = attributes;
                        store.upsert(state).await?;
                        tracing::info!(resource = %key, provider_id = %provider_id, "{verb} complete");
                        result.record(
                            key.clone(),
                            verb,
                            Outcome::Success {
                                provider_id: Some(provider_id),
                                message: format!("{verb} complete"),
                            },
                        );
                        unblock(&key, &mut blockers, &pending, &plan_order, &mut ready, &mut queued);
                    }
                    ExecOutcome::Deleted => {
                        store.remove(&key).await?;
                        tracing::info!(resource = %key, "deleted");
                        result.record(
                            key.clone(),
                            verb,
                            Outcome::Success {
                                provider_id: None,
                                message: "delete complete".to_string(),
                            },
                        );
                        unblock(&key, &mut blockers, &pending, &plan_order, &mut ready, &mut queued);
                    }
                    ExecOutcome::Failed { error } => {
                        tracing::warn!(resource = %key, error = %error, "action failed");
                        if verb != "delete" {
                            // Create/update failure: mark Failed so the next
                            // diff retries. A failed delete keeps its record
                            // as-is so a destroy retry attempts it again.
                            let mut state = store
                                .get(&key)
                                .cloned()
                                .unwrap_or_else(|| ResourceState::new(key.kind, key.name.clone()));
                            state.status = ResourceStatus::Failed;
                            store.upsert(state).await?;
                        }
                        result.record(key.clone(), verb, Outcome::Failure { error });
                        block_dependents(&key, &mut pending, &blockers, &mut result);
                    }
                },
                Some(Err(e)) => {
                    return Err(CloudError::Api(format!("executor task failed: {e}")));
                }
                None => break,
            }
        }

        // Whatever is still pending was never blocked by a failure, so the
        // only way to get here with leftovers is cancellation.
        for key in &plan_order {
            if let Some(action) = pending.remove(key) {
                result.record(key.clone(), action.verb(), Outcome::Cancelled);
            }
        }

        result
            .results
            .sort_by_key(|r| plan_order.iter().position(|k| k == &r.key).unwrap_or(usize::MAX));
        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    /// Resolve inputs and spawn a create (or replace-style update) call
    #[allow(clippy::too_many_arguments)]
    async fn spawn_write(
        &self,
        key: &ResourceKey,
        verb: &'static str,
        spec: &ResourceSpec,
        prior_id: Option<String>,
        store: &mut StateStore,
        in_flight: &mut JoinSet<(ResourceKey, &'static str, ExecOutcome)>,
        pending: &mut BTreeMap<ResourceKey, Action>,
        blockers: &mut BTreeMap<ResourceKey, BTreeSet<ResourceKey>>,
        result: &mut ApplyResult,
    ) -> Result<()> {
        let attrs = match self.prepare_inputs(spec, store) {
            Ok(attrs) => attrs,
            Err(e) => {
                // Failed before any provider call: record and block exactly
                // like a provider failure.
                let mut state = store
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| ResourceState::new(key.kind, key.name.clone()));
                state.status = ResourceStatus::Failed;
                store.upsert(state).await?;
                result.record(key.clone(), verb, Outcome::Failure { error: e.to_string() });
                block_dependents(key, pending, blockers, result);
                return Ok(());
            }
        };

        let provider = Arc::clone(&self.provider);
        let timeout = self.options.call_timeout;
        let kind = spec.kind;
        let k = key.clone();
        tracing::info!(resource = %key, "{}", if verb == "create" { "creating" } else { "replacing" });
        in_flight.spawn(async move {
            let exec = write_call(provider, kind, prior_id, attrs, timeout).await;
            (k, verb, exec)
        });
        Ok(())
    }

    /// Strictly resolve references; for key pairs, generate the secret and
    /// feed the sink before the provider ever sees the request
    fn prepare_inputs(&self, spec: &ResourceSpec, store: &StateStore) -> Result<Attributes> {
        let mut attrs = resolve_attributes(spec, store, true)?;

        if spec.kind == ResourceKind::KeyPair {
            let key_name = spec
                .get_attribute::<String>("key_name")
                .unwrap_or_else(|| spec.name.clone());
            let sink = self
                .options
                .key_file
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("{key_name}.pem")));

            let material = secret::generate(&key_name)?;
            secret::write_private_key(&sink, &material)?;

            attrs.insert("public_key".into(), material.public_key_openssh.into());
            attrs.insert("fingerprint".into(), material.fingerprint.into());
            attrs.insert("key_file".into(), sink.to_string_lossy().into_owned().into());
        }

        Ok(attrs)
    }
}

async fn write_call(
    provider: Arc<dyn Provider>,
    kind: ResourceKind,
    prior_id: Option<String>,
    attrs: Attributes,
    timeout: Duration,
) -> ExecOutcome {
    // Updates are executed as replace: the provider interface is
    // create/delete/describe only.
    if let Some(id) = prior_id {
        if let Err(e) = timed(provider.delete_resource(kind, &id), timeout).await {
            return ExecOutcome::Failed {
                error: e.to_string(),
            };
        }
    }

    match timed(provider.create_resource(kind, &attrs), timeout).await {
        Ok((provider_id, outputs)) => {
            let mut attributes = attrs;
            attributes.extend(outputs);
            ExecOutcome::Created {
                provider_id,
                attributes,
            }
        }
        Err(e) => ExecOutcome::Failed {
            error: e.to_string(),
        },
    }
}

async fn timed<T>(
    fut: impl std::future::Future<Output = Result<T>>,
    timeout: Duration,
) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(r) => r,
        Err(_) => Err(CloudError::Timeout(timeout.as_millis() as u64)),
    }
}

/// Release `done` as a blocker and queue any action that became ready
fn unblock(
    done: &ResourceKey,
    blockers: &mut BTreeMap<ResourceKey, BTreeSet<ResourceKey>>,
    pending: &BTreeMap<ResourceKey, Action>,
    plan_order: &[ResourceKey],
    ready: &mut VecDeque<ResourceKey>,
    queued: &mut BTreeSet<ResourceKey>,
) {
    for set in blockers.values_mut() {
        set.remove(done);
    }
    for key in plan_order {
        if pending.contains_key(key)
            && !queued.contains(key)
            && blockers.get(key).is_none_or(BTreeSet::is_empty)
        {
            ready.push_back(key.clone());
            queued.insert(key.clone());
        }
    }
}

/// Drop every pending action that (transitively) waits on `failed`
fn block_dependents(
    failed: &ResourceKey,
    pending: &mut BTreeMap<ResourceKey, Action>,
    blockers: &BTreeMap<ResourceKey, BTreeSet<ResourceKey>>,
    result: &mut ApplyResult,
) {
    let mut queue = vec![failed.clone()];
    while let Some(cause) = queue.pop() {
        let blocked: Vec<ResourceKey> = pending
            .keys()
            .filter(|p| blockers.get(*p).is_some_and(|b| b.contains(&cause)))
            .cloned()
            .collect();
        for key in blocked {
            if let Some(action) = pending.remove(&key) {
                tracing::warn!(resource = %key, dependency = %failed, "blocked by failed dependency");
                result.record(
                    key.clone(),
                    action.verb(),
                    Outcome::Blocked {
                        dependency: failed.clone(),
                    },
                );
                queue.push(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Planner;
    use serde_json::json;
    use std::sync::Mutex;
    use stackform_core::ResourceSpec;
    use tempfile::tempdir;

    #[derive(Default)]
    struct TestProvider {
        calls: Mutex<Vec<(&'static str, ResourceKind)>>,
        counter: Mutex<u64>,
        fail_create: Option<ResourceKind>,
        fail_delete: Option<ResourceKind>,
        delay: Option<Duration>,
    }

    impl TestProvider {
        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl Provider for TestProvider {
        fn name(&self) -> &str {
            "test"
        }

        async fn create_resource(
            &self,
            kind: ResourceKind,
            attributes: &Attributes,
        ) -> Result<(String, Attributes)> {
            self.calls.lock().unwrap().push(("create", kind));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_create == Some(kind) {
                return Err(CloudError::Api(format!("simulated create failure for {kind}")));
            }
            let n = {
                let mut counter = self.counter.lock().unwrap();
                *counter += 1;
                *counter
            };
            let mut outputs = Attributes::new();
            if kind == ResourceKind::Instance {
                outputs.insert("public_ip".into(), json!(format!("203.0.113.{n}")));
            }
            if kind == ResourceKind::Role {
                if let Some(role_name) = attributes.get("role_name") {
                    outputs.insert("arn".into(), json!(format!("arn:test:role/{}", role_name.as_str().unwrap_or(""))));
                }
            }
            Ok((format!("{kind}-{n:04}"), outputs))
        }

        async fn delete_resource(&self, kind: ResourceKind, _provider_id: &str) -> Result<()> {
            self.calls.lock().unwrap().push(("delete", kind));
            if self.fail_delete == Some(kind) {
                return Err(CloudError::Api(format!("simulated delete failure for {kind}")));
            }
            Ok(())
        }

        async fn describe_resource(
            &self,
            _kind: ResourceKind,
            _provider_id: &str,
        ) -> Result<Option<Attributes>> {
            Ok(None)
        }
    }

    fn role_policy_bucket() -> Vec<ResourceSpec> {
        let role = ResourceSpec::new(ResourceKind::Role, "web")
            .with_attribute("role_name", json!("web"));
        let policy = ResourceSpec::new(ResourceKind::Policy, "access")
            .with_attribute("policy_name", json!("access"))
            .with_reference("role", role.key(), "role_name");
        let bucket = ResourceSpec::new(ResourceKind::Bucket, "artifacts")
            .with_attribute("bucket", json!("artifacts"))
            .with_attribute("region", json!("ap-northeast-1"));
        vec![role, policy, bucket]
    }

    async fn apply_fresh(
        provider: Arc<TestProvider>,
        specs: &[ResourceSpec],
    ) -> (tempfile::TempDir, StateStore, ApplyResult) {
        let dir = tempdir().unwrap();
        let mut store = StateStore::load(dir.path()).await.unwrap();
        let graph = DependencyGraph::build(specs).unwrap();
        let plan = Planner::diff(&graph, specs, &store).unwrap();

        let executor = Executor::new(provider);
        let result = executor.apply(&plan, &graph, &mut store).await.unwrap();
        (dir, store, result)
    }

    #[tokio::test]
    async fn test_apply_creates_and_commits_in_order() {
        let provider = Arc::new(TestProvider::default());
        let specs = role_policy_bucket();
        let (_dir, store, result) = apply_fresh(Arc::clone(&provider), &specs).await;

        assert!(result.is_success());
        assert_eq!(store.len(), 3);
        for state in store.states() {
            assert_eq!(state.status, ResourceStatus::Created);
            assert!(state.provider_id.is_some());
        }

        // Policy resolved its role reference from the committed role state.
        let policy = store
            .get(&ResourceKey::new(ResourceKind::Policy, "access"))
            .unwrap();
        assert_eq!(policy.get_attribute::<String>("role").as_deref(), Some("web"));
    }

    #[tokio::test]
    async fn test_noop_plan_makes_zero_provider_calls() {
        let provider = Arc::new(TestProvider::default());
        let specs = role_policy_bucket();
        let (dir, mut store, _) = apply_fresh(Arc::clone(&provider), &specs).await;
        let calls_after_create = provider.call_count();

        let graph = DependencyGraph::build(&specs).unwrap();
        let plan = Planner::diff(&graph, &specs, &store).unwrap();
        assert!(!plan.has_changes);

        let executor = Executor::new(Arc::clone(&provider) as Arc<dyn Provider>);
        let result = executor.apply(&plan, &graph, &mut store).await.unwrap();

        assert!(result.is_success());
        assert_eq!(provider.call_count(), calls_after_create);
        drop(dir);
    }

    #[tokio::test]
    async fn test_failure_blocks_dependents_not_independents() {
        let provider = Arc::new(TestProvider {
            fail_create: Some(ResourceKind::Role),
            ..TestProvider::default()
        });
        let specs = role_policy_bucket();
        let (_dir, store, result) = apply_fresh(Arc::clone(&provider), &specs).await;

        assert!(!result.is_success());

        let role = store.get(&ResourceKey::new(ResourceKind::Role, "web")).unwrap();
        assert_eq!(role.status, ResourceStatus::Failed);

        // Policy depends on the role: blocked, never attempted.
        assert!(store
            .get(&ResourceKey::new(ResourceKind::Policy, "access"))
            .is_none());
        let policy_result = result
            .results
            .iter()
            .find(|r| r.key == ResourceKey::new(ResourceKind::Policy, "access"))
            .unwrap();
        assert!(matches!(policy_result.outcome, Outcome::Blocked { .. }));

        // The bucket branch is independent and still lands.
        let bucket = store
            .get(&ResourceKey::new(ResourceKind::Bucket, "artifacts"))
            .unwrap();
        assert_eq!(bucket.status, ResourceStatus::Created);
    }

    #[tokio::test]
    async fn test_resume_after_partial_failure() {
        let provider = Arc::new(TestProvider {
            fail_create: Some(ResourceKind::Role),
            ..TestProvider::default()
        });
        let specs = role_policy_bucket();
        let (dir, mut store, _) = apply_fresh(Arc::clone(&provider), &specs).await;

        // Second run with a healthy provider: only the failed branch is
        // retried, the bucket stays untouched.
        let provider = Arc::new(TestProvider::default());
        let graph = DependencyGraph::build(&specs).unwrap();
        let plan = Planner::diff(&graph, &specs, &store).unwrap();
        let verbs: Vec<(&str, ResourceKey)> = plan
            .actions
            .iter()
            .map(|a| (a.verb(), a.key()))
            .collect();
        assert!(verbs.contains(&("create", ResourceKey::new(ResourceKind::Role, "web"))));
        assert!(verbs.contains(&("no-op", ResourceKey::new(ResourceKind::Bucket, "artifacts"))));

        let executor = Executor::new(Arc::clone(&provider) as Arc<dyn Provider>);
        let result = executor.apply(&plan, &graph, &mut store).await.unwrap();
        assert!(result.is_success());
        assert_eq!(store.len(), 3);
        assert!(provider
            .calls
            .lock()
            .unwrap()
            .iter()
            .all(|(_, kind)| *kind != ResourceKind::Bucket));
        drop(dir);
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_record() {
        let provider = Arc::new(TestProvider::default());
        let specs = role_policy_bucket();
        let (dir, mut store, _) = apply_fresh(Arc::clone(&provider), &specs).await;

        let provider = Arc::new(TestProvider {
            fail_delete: Some(ResourceKind::Bucket),
            ..TestProvider::default()
        });
        let graph = DependencyGraph::build(&specs).unwrap();
        let plan = Planner::destroy(&graph, &store);
        let executor = Executor::new(Arc::clone(&provider) as Arc<dyn Provider>);
        let result = executor.apply(&plan, &graph, &mut store).await.unwrap();

        assert!(!result.is_success());
        let bucket = store
            .get(&ResourceKey::new(ResourceKind::Bucket, "artifacts"))
            .unwrap();
        assert_eq!(bucket.status, ResourceStatus::Created);
        // Everything else is gone.
        assert_eq!(store.len(), 1);
        drop(dir);
    }

    #[tokio::test]
    async fn test_cancel_before_apply_schedules_nothing() {
        let provider = Arc::new(TestProvider::default());
        let specs = role_policy_bucket();
        let dir = tempdir().unwrap();
        let mut store = StateStore::load(dir.path()).await.unwrap();
        let graph = DependencyGraph::build(&specs).unwrap();
        let plan = Planner::diff(&graph, &specs, &store).unwrap();

        let executor = Executor::new(Arc::clone(&provider) as Arc<dyn Provider>);
        executor.cancel_handle().cancel();
        let result = executor.apply(&plan, &graph, &mut store).await.unwrap();

        assert_eq!(provider.call_count(), 0);
        assert!(result
            .results
            .iter()
            .all(|r| matches!(r.outcome, Outcome::Cancelled)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_flight_commits_started_work() {
        let provider = Arc::new(TestProvider {
            delay: Some(Duration::from_millis(100)),
            ..TestProvider::default()
        });
        let role = ResourceSpec::new(ResourceKind::Role, "web")
            .with_attribute("role_name", json!("web"));
        let policy = ResourceSpec::new(ResourceKind::Policy, "access")
            .with_attribute("policy_name", json!("access"))
            .with_reference("role", role.key(), "role_name");
        let specs = vec![role, policy];
        let dir = tempdir().unwrap();
        let mut store = StateStore::load(dir.path()).await.unwrap();
        let graph = DependencyGraph::build(&specs).unwrap();
        let plan = Planner::diff(&graph, &specs, &store).unwrap();

        let executor = Executor::new(Arc::clone(&provider) as Arc<dyn Provider>);
        let cancel = executor.cancel_handle();
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let result = executor.apply(&plan, &graph, &mut store).await.unwrap();
        canceller.await.unwrap();

        // The role create was already in flight when the cancel landed: it
        // runs to completion and its result is committed.
        let role_state = store
            .get(&ResourceKey::new(ResourceKind::Role, "web"))
            .unwrap();
        assert_eq!(role_state.status, ResourceStatus::Created);
        assert!(role_state.provider_id.is_some());

        // The dependent policy had not started: never attempted, no record.
        let policy_result = result
            .results
            .iter()
            .find(|r| r.key == ResourceKey::new(ResourceKind::Policy, "access"))
            .unwrap();
        assert!(matches!(policy_result.outcome, Outcome::Cancelled));
        assert!(store
            .get(&ResourceKey::new(ResourceKind::Policy, "access"))
            .is_none());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_provider_timeout_is_a_failure() {
        let provider = Arc::new(TestProvider {
            delay: Some(Duration::from_millis(200)),
            ..TestProvider::default()
        });
        let specs = vec![ResourceSpec::new(ResourceKind::Bucket, "artifacts")
            .with_attribute("bucket", json!("artifacts"))];
        let dir = tempdir().unwrap();
        let mut store = StateStore::load(dir.path()).await.unwrap();
        let graph = DependencyGraph::build(&specs).unwrap();
        let plan = Planner::diff(&graph, &specs, &store).unwrap();

        let executor = Executor::with_options(
            Arc::clone(&provider) as Arc<dyn Provider>,
            ExecutorOptions {
                call_timeout: Duration::from_millis(10),
                ..ExecutorOptions::default()
            },
        );
        let result = executor.apply(&plan, &graph, &mut store).await.unwrap();

        assert!(!result.is_success());
        match &result.results[0].outcome {
            Outcome::Failure { error } => assert!(error.contains("timed out")),
            other => panic!("expected failure, got {other:?}"),
        }
        let bucket = store
            .get(&ResourceKey::new(ResourceKind::Bucket, "artifacts"))
            .unwrap();
        assert_eq!(bucket.status, ResourceStatus::Failed);
    }

    #[tokio::test]
    async fn test_keypair_create_feeds_sink_and_keeps_secret_out_of_state() {
        let provider = Arc::new(TestProvider::default());
        let dir = tempdir().unwrap();
        let key_file = dir.path().join("deployer.pem");
        let specs = vec![ResourceSpec::new(ResourceKind::KeyPair, "deployer")
            .with_attribute("key_name", json!("deployer"))];
        let mut store = StateStore::load(dir.path()).await.unwrap();
        let graph = DependencyGraph::build(&specs).unwrap();
        let plan = Planner::diff(&graph, &specs, &store).unwrap();

        let executor = Executor::with_options(
            Arc::clone(&provider) as Arc<dyn Provider>,
            ExecutorOptions {
                key_file: Some(key_file.clone()),
                ..ExecutorOptions::default()
            },
        );
        let result = executor.apply(&plan, &graph, &mut store).await.unwrap();
        assert!(result.is_success());

        let pem = std::fs::read_to_string(&key_file).unwrap();
        assert!(pem.contains("PRIVATE KEY"));

        let state = store
            .get(&ResourceKey::new(ResourceKind::KeyPair, "deployer"))
            .unwrap();
        assert!(state.get_attribute::<String>("fingerprint").unwrap().starts_with("SHA256:"));
        assert!(state
            .get_attribute::<String>("public_key")
            .unwrap()
            .starts_with("ssh-ed25519"));
        // The private half never reaches durable state.
        let serialized = serde_json::to_string(state).unwrap();
        assert!(!serialized.contains("PRIVATE KEY"));
    }
}
