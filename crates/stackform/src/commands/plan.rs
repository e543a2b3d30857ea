use colored::Colorize;
use std::path::Path;

use stackform_cloud::{Planner, StateStore};
use stackform_core::{template, DependencyGraph};

pub async fn handle(state_dir: &Path) -> anyhow::Result<()> {
    let specs = template::load()?;
    let graph = DependencyGraph::build(&specs)?;
    let store = StateStore::load(state_dir).await?;

    let plan = Planner::diff(&graph, &specs, &store)?;

    println!("{}", "Planned changes:".bold());
    super::print_plan(&plan);

    if !plan.has_changes {
        println!("{}", "✓ infrastructure is up to date".green());
    }
    Ok(())
}
