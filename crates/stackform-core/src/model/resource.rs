use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kinds of resources stackform knows how to manage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    KeyPair,
    Role,
    Policy,
    InstanceProfile,
    Instance,
    Bucket,
    BucketVersioning,
    BucketEncryption,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceKind::KeyPair => "key_pair",
            ResourceKind::Role => "role",
            ResourceKind::Policy => "policy",
            ResourceKind::InstanceProfile => "instance_profile",
            ResourceKind::Instance => "instance",
            ResourceKind::Bucket => "bucket",
            ResourceKind::BucketVersioning => "bucket_versioning",
            ResourceKind::BucketEncryption => "bucket_encryption",
        };
        write!(f, "{}", s)
    }
}

/// Identity of a declared resource, unique within a template and within
/// the state store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceKey {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// Binding of one attribute slot to another resource's output attribute
///
/// Example: `Instance.key_name` <- output `key_name` of `key_pair/deployer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Attribute slot on the referring resource to fill in
    pub slot: String,

    /// Resource whose output is consumed
    pub target: ResourceKey,

    /// Output attribute name on the target
    pub output: String,
}

impl Reference {
    pub fn new(
        slot: impl Into<String>,
        target: ResourceKey,
        output: impl Into<String>,
    ) -> Self {
        Self {
            slot: slot.into(),
            target,
            output: output.into(),
        }
    }
}

/// One declared resource: kind + name, its literal attributes, and the
/// references that bind attribute slots to other resources' outputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub kind: ResourceKind,
    pub name: String,

    /// Literal attributes known at load time
    pub attributes: BTreeMap<String, serde_json::Value>,

    /// Attribute slots bound to other resources' outputs
    #[serde(default)]
    pub references: Vec<Reference>,
}

impl ResourceSpec {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            attributes: BTreeMap::new(),
            references: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_reference(
        mut self,
        slot: impl Into<String>,
        target: ResourceKey,
        output: impl Into<String>,
    ) -> Self {
        self.references.push(Reference::new(slot, target, output));
        self
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.kind, self.name.clone())
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
