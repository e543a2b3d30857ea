//! Simulated provider for Stackform
//!
//! An in-memory `Provider` with deterministic identifiers and synthesized
//! outputs, so plans and applies behave identically run to run. Supports
//! per-kind failure injection and an optional artificial latency, which is
//! all the executor tests need from a misbehaving cloud.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use stackform_cloud::{Attributes, CloudError, Provider, Result};
use stackform_core::ResourceKind;

/// One live simulated resource
#[derive(Debug, Clone)]
pub struct SimResource {
    pub kind: ResourceKind,
    pub attributes: Attributes,
}

#[derive(Default)]
struct SimState {
    resources: BTreeMap<String, SimResource>,
    counters: BTreeMap<ResourceKind, u64>,
}

/// In-memory provider with deterministic IDs
///
/// IDs are `<prefix>-<n>` with a per-kind counter, so the first instance is
/// always `i-0001` and the first key pair `key-0001`.
#[derive(Default)]
pub struct SimProvider {
    state: Mutex<SimState>,
    fail_create: Mutex<BTreeSet<ResourceKind>>,
    fail_delete: Mutex<BTreeSet<ResourceKind>>,
    latency: Option<Duration>,
}

impl SimProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Make every create of `kind` fail until cleared
    pub fn fail_creates_of(&self, kind: ResourceKind) {
        self.fail_create.lock().unwrap_or_else(|e| e.into_inner()).insert(kind);
    }

    /// Make every delete of `kind` fail until cleared
    pub fn fail_deletes_of(&self, kind: ResourceKind) {
        self.fail_delete.lock().unwrap_or_else(|e| e.into_inner()).insert(kind);
    }

    pub fn clear_failures(&self) {
        self.fail_create.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.fail_delete.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Number of live simulated resources
    pub fn live_count(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).resources.len()
    }

    /// Snapshot of a live resource by provider id
    pub fn live(&self, provider_id: &str) -> Option<SimResource> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .resources
            .get(provider_id)
            .cloned()
    }

    fn id_prefix(kind: ResourceKind) -> &'static str {
        match kind {
            ResourceKind::KeyPair => "key",
            ResourceKind::Role => "role",
            ResourceKind::Policy => "pol",
            ResourceKind::InstanceProfile => "prof",
            ResourceKind::Instance => "i",
            ResourceKind::Bucket => "bkt",
            ResourceKind::BucketVersioning => "bktv",
            ResourceKind::BucketEncryption => "bkte",
        }
    }

    fn str_attr(attributes: &Attributes, key: &str) -> String {
        attributes
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    /// Synthesize the outputs a real cloud would return on create
    fn outputs(kind: ResourceKind, n: u64, attributes: &Attributes) -> Attributes {
        let mut out = Attributes::new();
        match kind {
            ResourceKind::KeyPair => {
                out.insert("key_name".into(), json!(Self::str_attr(attributes, "key_name")));
            }
            ResourceKind::Role => {
                let name = Self::str_attr(attributes, "role_name");
                out.insert("role_name".into(), json!(name));
                out.insert("arn".into(), json!(format!("arn:sim:iam::role/{name}")));
            }
            ResourceKind::Policy => {
                let name = Self::str_attr(attributes, "policy_name");
                out.insert("policy_arn".into(), json!(format!("arn:sim:iam::policy/{name}")));
            }
            ResourceKind::InstanceProfile => {
                let name = Self::str_attr(attributes, "profile_name");
                let name = if name.is_empty() {
                    format!("profile-{n:04}")
                } else {
                    name
                };
                out.insert("profile_name".into(), json!(name));
            }
            ResourceKind::Instance => {
                out.insert("public_ip".into(), json!(format!("203.0.113.{}", n % 254 + 1)));
                out.insert("private_ip".into(), json!(format!("10.0.1.{}", n % 254 + 1)));
            }
            ResourceKind::Bucket => {
                let name = Self::str_attr(attributes, "bucket");
                out.insert("bucket".into(), json!(name));
                out.insert("arn".into(), json!(format!("arn:sim:s3:::{name}")));
            }
            ResourceKind::BucketVersioning | ResourceKind::BucketEncryption => {}
        }
        out
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Provider for SimProvider {
    fn name(&self) -> &str {
        "sim"
    }

    async fn create_resource(
        &self,
        kind: ResourceKind,
        attributes: &Attributes,
    ) -> Result<(String, Attributes)> {
        self.simulate_latency().await;

        if self
            .fail_create
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&kind)
        {
            return Err(CloudError::Api(format!("simulated create failure: {kind}")));
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let counter = state.counters.entry(kind).or_insert(0);
        *counter += 1;
        let n = *counter;
        let provider_id = format!("{}-{n:04}", Self::id_prefix(kind));

        let mut merged = attributes.clone();
        merged.extend(Self::outputs(kind, n, attributes));
        state.resources.insert(
            provider_id.clone(),
            SimResource {
                kind,
                attributes: merged,
            },
        );
        tracing::debug!(%kind, %provider_id, "sim create");

        let outputs = Self::outputs(kind, n, attributes);
        Ok((provider_id, outputs))
    }

    async fn delete_resource(&self, kind: ResourceKind, provider_id: &str) -> Result<()> {
        self.simulate_latency().await;

        if self
            .fail_delete
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&kind)
        {
            return Err(CloudError::Api(format!("simulated delete failure: {kind}")));
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.resources.remove(provider_id).is_none() {
            // Deleting an unknown id is idempotent, matching real clouds
            // that return success for already-gone resources.
            tracing::debug!(%kind, %provider_id, "sim delete of unknown id");
        }
        Ok(())
    }

    async fn describe_resource(
        &self,
        _kind: ResourceKind,
        provider_id: &str,
    ) -> Result<Option<Attributes>> {
        self.simulate_latency().await;
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.resources.get(provider_id).map(|r| r.attributes.clone()))
    }
}
