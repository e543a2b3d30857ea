//! Durable state store
//!
//! Tracks the last-known provider identifiers and attributes for every
//! declared resource in a single JSON snapshot. Every mutation is persisted
//! with write-temp-then-rename so a crash mid-write leaves either the old or
//! the new snapshot on disk, never a corrupt mix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{CloudError, Result};
use crate::provider::Attributes;
use stackform_core::{ResourceKey, ResourceKind};

const STATE_VERSION: u32 = 1;
const STATE_FILE: &str = "state.json";
const STATE_TMP: &str = "state.json.tmp";

/// Lifecycle status of a managed resource
///
/// There is no tombstone status: a destroyed resource's record is removed
/// from the snapshot outright, and the apply result reports the delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Declared but not yet created
    Pending,
    /// Live at the provider
    Created,
    /// Last create/update attempt failed
    Failed,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Pending => write!(f, "pending"),
            ResourceStatus::Created => write!(f, "created"),
            ResourceStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Runtime record for a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    pub kind: ResourceKind,
    pub name: String,

    /// Provider-assigned identifier; present whenever status is `Created`
    pub provider_id: Option<String>,

    pub status: ResourceStatus,

    /// Last-known attributes (resolved inputs merged with provider outputs)
    pub attributes: Attributes,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Fields written by newer versions, preserved on read-modify-write
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ResourceState {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            kind,
            name: name.into(),
            provider_id: None,
            status: ResourceStatus::Pending,
            attributes: Attributes::new(),
            created_at: now,
            updated_at: now,
            extra: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.kind, self.name.clone())
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_provider_id(mut self, id: impl Into<String>) -> Self {
        self.provider_id = Some(id.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// On-disk snapshot layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    pub resources: Vec<ResourceState>,

    /// Top-level fields from newer versions, preserved on rewrite
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

/// Durable store over the snapshot, keyed by (kind, name)
#[derive(Debug)]
pub struct StateStore {
    dir: PathBuf,
    snapshot: StateSnapshot,
}

impl StateStore {
    /// Load the snapshot from `<dir>/state.json`, empty on first run
    ///
    /// Refuses to proceed when the snapshot fails an integrity check:
    /// unparseable content, duplicate (kind, name) entries, or a `Created`
    /// record without a provider id.
    pub async fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let path = dir.join(STATE_FILE);

        if !path.exists() {
            tracing::debug!("state file not found, starting empty");
            return Ok(Self {
                dir,
                snapshot: StateSnapshot::default(),
            });
        }

        let content = fs::read_to_string(&path).await?;
        let snapshot: StateSnapshot = serde_json::from_str(&content).map_err(|e| {
            CloudError::StateCorruption(format!("{}: {}", path.display(), e))
        })?;

        if snapshot.version > STATE_VERSION {
            return Err(CloudError::State(format!(
                "state file version {} is newer than supported version {}",
                snapshot.version, STATE_VERSION
            )));
        }

        let mut seen: Vec<ResourceKey> = Vec::new();
        for resource in &snapshot.resources {
            let key = resource.key();
            if seen.contains(&key) {
                return Err(CloudError::StateCorruption(format!(
                    "duplicate entry for {key}"
                )));
            }
            if resource.status == ResourceStatus::Created
                && resource.provider_id.as_deref().unwrap_or("").is_empty()
            {
                return Err(CloudError::StateCorruption(format!(
                    "{key} is marked created but has no provider id"
                )));
            }
            seen.push(key);
        }

        tracing::debug!(resources = snapshot.resources.len(), "state loaded");
        Ok(Self { dir, snapshot })
    }

    pub fn states(&self) -> &[ResourceState] {
        &self.snapshot.resources
    }

    pub fn len(&self) -> usize {
        self.snapshot.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.resources.is_empty()
    }

    pub fn get(&self, key: &ResourceKey) -> Option<&ResourceState> {
        self.snapshot.resources.iter().find(|r| &r.key() == key)
    }

    /// Insert or replace the record for `state`'s (kind, name) and persist
    pub async fn upsert(&mut self, mut state: ResourceState) -> Result<()> {
        state.updated_at = Utc::now();
        let key = state.key();
        if let Some(existing) = self
            .snapshot
            .resources
            .iter_mut()
            .find(|r| r.key() == key)
        {
            state.created_at = existing.created_at;
            *existing = state;
        } else {
            self.snapshot.resources.push(state);
        }
        self.persist().await
    }

    /// Remove the record for `key` and persist; returns the removed record
    pub async fn remove(&mut self, key: &ResourceKey) -> Result<Option<ResourceState>> {
        let idx = self.snapshot.resources.iter().position(|r| &r.key() == key);
        let removed = idx.map(|i| self.snapshot.resources.remove(i));
        if removed.is_some() {
            self.persist().await?;
        }
        Ok(removed)
    }

    fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    fn tmp_path(&self) -> PathBuf {
        self.dir.join(STATE_TMP)
    }

    /// Write the full snapshot atomically: temp file, then rename over
    async fn persist(&mut self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).await?;
        }

        self.snapshot.updated_at = Utc::now();
        let content = serde_json::to_string_pretty(&self.snapshot)?;

        let tmp = self.tmp_path();
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, self.state_path()).await?;

        tracing::debug!(resources = self.snapshot.resources.len(), "state persisted");
        Ok(())
    }
}
