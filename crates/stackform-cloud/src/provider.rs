//! Provider client abstraction
//!
//! The executor drives any backend that can create, delete, and describe a
//! resource by kind. Real cloud clients live outside this crate; the
//! in-memory simulator in `stackform-sim` is the reference implementation.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;
use stackform_core::ResourceKind;

/// Attribute map exchanged with a provider
pub type Attributes = BTreeMap<String, serde_json::Value>;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name for diagnostics (e.g. "sim")
    fn name(&self) -> &str;

    /// Create a resource; returns the provider id and output attributes
    /// (synthesized values such as addresses and ARNs)
    async fn create_resource(
        &self,
        kind: ResourceKind,
        attributes: &Attributes,
    ) -> Result<(String, Attributes)>;

    /// Delete a resource by provider id
    async fn delete_resource(&self, kind: ResourceKind, provider_id: &str) -> Result<()>;

    /// Describe a live resource; `None` when the provider no longer knows it
    async fn describe_resource(
        &self,
        kind: ResourceKind,
        provider_id: &str,
    ) -> Result<Option<Attributes>>;
}
