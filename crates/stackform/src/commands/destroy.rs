use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use stackform_cloud::{Executor, ExecutorOptions, Planner, Provider, StateStore};
use stackform_core::{template, DependencyGraph};
use stackform_sim::SimProvider;

pub async fn handle(state_dir: &Path, concurrency: usize, timeout: u64) -> anyhow::Result<()> {
    tracing::debug!(state_dir = %state_dir.display(), concurrency, timeout, "destroy invoked");

    let specs = template::load()?;
    let graph = DependencyGraph::build(&specs)?;
    let mut store = StateStore::load(state_dir).await?;

    if store.is_empty() {
        println!("{}", "ℹ nothing to destroy".blue());
        return Ok(());
    }

    let plan = Planner::destroy(&graph, &store);
    println!("{}", "Resources to destroy:".bold());
    super::print_plan(&plan);

    let provider = Arc::new(SimProvider::new()) as Arc<dyn Provider>;
    let executor = Executor::with_options(
        provider,
        ExecutorOptions {
            concurrency,
            call_timeout: Duration::from_secs(timeout),
            key_file: None,
        },
    );

    println!();
    println!("{}", "Destroying...".bold());
    let result = executor.apply(&plan, &graph, &mut store).await?;
    super::report_result(&result)
}
