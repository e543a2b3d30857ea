//! Fixed resource template
//!
//! The declarative stack stackform provisions: an SSH key pair, a
//! role / policy / instance-profile chain, a compute instance bootstrapped
//! by a first-boot script, and a versioned + encrypted storage bucket.
//! `load()` is the single entry point; everything it returns has already
//! passed validation.

use serde_json::json;

use crate::error::{CoreError, Result};
use crate::model::{ResourceKey, ResourceKind, ResourceSpec};

/// Region the template targets
pub const DEFAULT_REGION: &str = "ap-northeast-1";

/// Instance types the template is allowed to request
pub const ALLOWED_INSTANCE_TYPES: &[&str] = &["t2.micro", "t3.micro", "t3.small", "t3.medium"];

/// First-boot script handed to the instance as `user_data`
///
/// Opaque to stackform: it is stored and forwarded verbatim, never parsed.
pub const BOOTSTRAP_SCRIPT: &str = r#"#!/usr/bin/env bash
set -euo pipefail

apt-get update -y
apt-get install -y nginx unzip
systemctl enable --now nginx

echo "stackform bootstrap finished at $(date -u)" > /var/log/stackform-bootstrap.log
"#;

/// Load and validate the fixed template
pub fn load() -> Result<Vec<ResourceSpec>> {
    let specs = stack();
    validate(&specs)?;
    tracing::debug!(resources = specs.len(), "template loaded");
    Ok(specs)
}

fn stack() -> Vec<ResourceSpec> {
    let key_pair = ResourceKey::new(ResourceKind::KeyPair, "deployer");
    let bucket = ResourceKey::new(ResourceKind::Bucket, "artifacts");
    let role = ResourceKey::new(ResourceKind::Role, "web");
    let policy = ResourceKey::new(ResourceKind::Policy, "artifacts-access");
    let profile = ResourceKey::new(ResourceKind::InstanceProfile, "web");

    vec![
        ResourceSpec::new(ResourceKind::KeyPair, "deployer")
            .with_attribute("key_name", json!("stackform-deployer")),
        ResourceSpec::new(ResourceKind::Bucket, "artifacts")
            .with_attribute("bucket", json!("stackform-artifacts"))
            .with_attribute("region", json!(DEFAULT_REGION))
            .with_attribute("versioning", json!("Enabled"))
            .with_attribute("encryption", json!("AES256")),
        ResourceSpec::new(ResourceKind::Role, "web")
            .with_attribute("role_name", json!("stackform-web"))
            .with_attribute("assume_role_service", json!("compute")),
        // Scoped to the bucket ARN on purpose: the policy only ever needs
        // access to the artifact bucket, not to every bucket in the account.
        ResourceSpec::new(ResourceKind::Policy, "artifacts-access")
            .with_attribute("policy_name", json!("stackform-artifacts-access"))
            .with_attribute(
                "actions",
                json!(["storage:GetObject", "storage:PutObject", "storage:ListBucket"]),
            )
            .with_reference("role", role.clone(), "role_name")
            .with_reference("resource_arn", bucket.clone(), "arn"),
        ResourceSpec::new(ResourceKind::InstanceProfile, "web")
            .with_attribute("profile_name", json!("stackform-web"))
            .with_reference("role", role, "role_name")
            .with_reference("policy", policy, "policy_arn"),
        ResourceSpec::new(ResourceKind::Instance, "web")
            .with_attribute("instance_type", json!("t3.micro"))
            .with_attribute("image", json!("ubuntu-24.04"))
            .with_attribute("region", json!(DEFAULT_REGION))
            .with_attribute("ssh_user", json!("ubuntu"))
            .with_attribute("user_data", json!(BOOTSTRAP_SCRIPT))
            .with_reference("key_name", key_pair, "key_name")
            .with_reference("instance_profile", profile, "profile_name"),
    ]
}

/// Validate a spec set: unique identities, resolvable references, and
/// per-kind attribute checks
pub fn validate(specs: &[ResourceSpec]) -> Result<()> {
    let keys: Vec<ResourceKey> = specs.iter().map(ResourceSpec::key).collect();

    for (i, key) in keys.iter().enumerate() {
        if key.name.is_empty() {
            return Err(CoreError::Validation(format!(
                "{} resource declared without a name",
                key.kind
            )));
        }
        if keys[..i].contains(key) {
            return Err(CoreError::Validation(format!(
                "duplicate resource declaration: {key}"
            )));
        }
    }

    for spec in specs {
        for reference in &spec.references {
            if !keys.contains(&reference.target) {
                return Err(CoreError::DanglingReference {
                    referrer: spec.key(),
                    target: reference.target.clone(),
                    slot: reference.slot.clone(),
                });
            }
        }

        match spec.kind {
            ResourceKind::Instance => {
                let region: String = spec.get_attribute("region").unwrap_or_default();
                if region.is_empty() {
                    return Err(CoreError::Validation(format!(
                        "{}: region must not be empty",
                        spec.key()
                    )));
                }
                let instance_type: String =
                    spec.get_attribute("instance_type").unwrap_or_default();
                if !ALLOWED_INSTANCE_TYPES.contains(&instance_type.as_str()) {
                    return Err(CoreError::Validation(format!(
                        "{}: instance type '{}' is not allowed (expected one of: {})",
                        spec.key(),
                        instance_type,
                        ALLOWED_INSTANCE_TYPES.join(", ")
                    )));
                }
            }
            ResourceKind::Bucket => {
                let region: String = spec.get_attribute("region").unwrap_or_default();
                if region.is_empty() {
                    return Err(CoreError::Validation(format!(
                        "{}: region must not be empty",
                        spec.key()
                    )));
                }
                let bucket: String = spec.get_attribute("bucket").unwrap_or_default();
                if bucket.is_empty() || !is_dns_safe(&bucket) {
                    return Err(CoreError::Validation(format!(
                        "{}: bucket name '{}' must be lowercase alphanumeric with hyphens",
                        spec.key(),
                        bucket
                    )));
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn is_dns_safe(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-')
}
