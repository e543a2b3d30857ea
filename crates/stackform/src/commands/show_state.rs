use colored::Colorize;
use std::path::Path;

use stackform_cloud::{ResourceStatus, StateStore};

pub async fn handle(state_dir: &Path, json: bool) -> anyhow::Result<()> {
    let store = StateStore::load(state_dir).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(store.states())?);
        return Ok(());
    }

    if store.is_empty() {
        println!("{}", "ℹ no resources in state".blue());
        return Ok(());
    }

    println!("{}", "Managed resources:".bold());
    for state in store.states() {
        let status = match state.status {
            ResourceStatus::Created => state.status.to_string().green(),
            ResourceStatus::Failed => state.status.to_string().red(),
            _ => state.status.to_string().yellow(),
        };
        let id = state.provider_id.as_deref().unwrap_or("-");
        println!("  {} [{}] id={}", state.key(), status, id.cyan());
        println!("    updated: {}", state.updated_at.to_rfc3339());
    }
    Ok(())
}
