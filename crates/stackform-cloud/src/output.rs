//! Stack output rendering
//!
//! Derives user-facing outputs from the state store after a successful
//! apply. The headline output is a ready-to-paste ssh command for the web
//! instance.

use std::collections::BTreeMap;

use crate::error::{CloudError, Result};
use crate::state::{ResourceStatus, StateStore};
use stackform_core::ResourceKind;

const DEFAULT_SSH_USER: &str = "ubuntu";

/// Render stack outputs from current state
///
/// Requires the instance to be `Created` with a known address; anything
/// less is reported as incomplete rather than rendering a broken command.
pub fn render(store: &StateStore) -> Result<BTreeMap<String, String>> {
    let instance = store
        .states()
        .iter()
        .find(|s| s.kind == ResourceKind::Instance)
        .ok_or_else(|| CloudError::IncompleteState("no instance in state".to_string()))?;

    if instance.status != ResourceStatus::Created {
        return Err(CloudError::IncompleteState(format!(
            "{} is {}, not created",
            instance.key(),
            instance.status
        )));
    }

    let public_ip = instance
        .get_attribute::<String>("public_ip")
        .ok_or_else(|| {
            CloudError::IncompleteState(format!("{} has no public_ip", instance.key()))
        })?;

    let ssh_user = instance
        .get_attribute::<String>("ssh_user")
        .unwrap_or_else(|| DEFAULT_SSH_USER.to_string());

    // The key pair record carries the sink path; fall back to the
    // conventional <key_name>.pem next to the working directory.
    let key_file = store
        .states()
        .iter()
        .find(|s| s.kind == ResourceKind::KeyPair)
        .and_then(|kp| {
            kp.get_attribute::<String>("key_file")
                .or_else(|| kp.get_attribute::<String>("key_name").map(|n| format!("{n}.pem")))
        })
        .unwrap_or_else(|| "id_ed25519".to_string());

    let mut outputs = BTreeMap::new();
    outputs.insert("instance_public_ip".to_string(), public_ip.clone());
    outputs.insert(
        "ssh_command".to_string(),
        format!("ssh -i {key_file} {ssh_user}@{public_ip}"),
    );

    if let Some(bucket) = store
        .states()
        .iter()
        .find(|s| s.kind == ResourceKind::Bucket && s.status == ResourceStatus::Created)
    {
        if let Some(name) = bucket.get_attribute::<String>("bucket") {
            outputs.insert("bucket_name".to_string(), name);
        }
        if let Some(arn) = bucket.get_attribute::<String>("arn") {
            outputs.insert("bucket_arn".to_string(), arn);
        }
    }

    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ResourceState;
    use serde_json::json;
    use tempfile::tempdir;

    async fn store_with(states: Vec<ResourceState>) -> (tempfile::TempDir, StateStore) {
        let dir = tempdir().unwrap();
        let mut store = StateStore::load(dir.path()).await.unwrap();
        for state in states {
            store.upsert(state).await.unwrap();
        }
        (dir, store)
    }

    #[tokio::test]
    async fn test_render_ssh_command() {
        let (_dir, store) = store_with(vec![
            ResourceState::new(ResourceKind::KeyPair, "deployer")
                .with_status(ResourceStatus::Created)
                .with_provider_id("key-0001")
                .with_attribute("key_name", json!("demo-key")),
            ResourceState::new(ResourceKind::Instance, "web")
                .with_status(ResourceStatus::Created)
                .with_provider_id("i-0001")
                .with_attribute("public_ip", json!("203.0.113.7"))
                .with_attribute("ssh_user", json!("ubuntu")),
        ])
        .await;

        let outputs = render(&store).unwrap();
        assert_eq!(outputs["instance_public_ip"], "203.0.113.7");
        assert_eq!(outputs["ssh_command"], "ssh -i demo-key.pem ubuntu@203.0.113.7");
    }

    #[tokio::test]
    async fn test_render_prefers_recorded_key_file() {
        let (_dir, store) = store_with(vec![
            ResourceState::new(ResourceKind::KeyPair, "deployer")
                .with_status(ResourceStatus::Created)
                .with_provider_id("key-0001")
                .with_attribute("key_name", json!("demo-key"))
                .with_attribute("key_file", json!("/keys/deployer.pem")),
            ResourceState::new(ResourceKind::Instance, "web")
                .with_status(ResourceStatus::Created)
                .with_provider_id("i-0001")
                .with_attribute("public_ip", json!("203.0.113.7")),
        ])
        .await;

        let outputs = render(&store).unwrap();
        assert_eq!(
            outputs["ssh_command"],
            "ssh -i /keys/deployer.pem ubuntu@203.0.113.7"
        );
    }

    #[tokio::test]
    async fn test_render_incomplete_without_created_instance() {
        let (_dir, store) = store_with(vec![ResourceState::new(ResourceKind::Instance, "web")
            .with_status(ResourceStatus::Failed)])
        .await;

        let err = render(&store).unwrap_err();
        assert!(matches!(err, CloudError::IncompleteState(_)));
    }

    #[tokio::test]
    async fn test_render_includes_bucket_outputs() {
        let (_dir, store) = store_with(vec![
            ResourceState::new(ResourceKind::Instance, "web")
                .with_status(ResourceStatus::Created)
                .with_provider_id("i-0001")
                .with_attribute("public_ip", json!("203.0.113.7")),
            ResourceState::new(ResourceKind::Bucket, "artifacts")
                .with_status(ResourceStatus::Created)
                .with_provider_id("bkt-0001")
                .with_attribute("bucket", json!("stackform-artifacts"))
                .with_attribute("arn", json!("arn:sim:s3:::stackform-artifacts")),
        ])
        .await;

        let outputs = render(&store).unwrap();
        assert_eq!(outputs["bucket_name"], "stackform-artifacts");
        assert_eq!(outputs["bucket_arn"], "arn:sim:s3:::stackform-artifacts");
    }
}
