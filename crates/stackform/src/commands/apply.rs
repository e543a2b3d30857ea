use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use stackform_cloud::{output, Executor, ExecutorOptions, Planner, Provider, StateStore};
use stackform_core::{template, DependencyGraph};
use stackform_sim::SimProvider;

pub async fn handle(
    state_dir: &Path,
    key_file: Option<PathBuf>,
    concurrency: usize,
    timeout: u64,
) -> anyhow::Result<()> {
    tracing::debug!(state_dir = %state_dir.display(), concurrency, timeout, "apply invoked");

    let specs = template::load()?;
    let graph = DependencyGraph::build(&specs)?;
    let mut store = StateStore::load(state_dir).await?;

    let plan = Planner::diff(&graph, &specs, &store)?;
    println!("{}", "Planned changes:".bold());
    super::print_plan(&plan);

    if !plan.has_changes {
        println!("{}", "✓ infrastructure is up to date".green());
        return Ok(());
    }

    let provider = Arc::new(SimProvider::new()) as Arc<dyn Provider>;
    let executor = Executor::with_options(
        provider,
        ExecutorOptions {
            concurrency,
            call_timeout: Duration::from_secs(timeout),
            key_file,
        },
    );

    println!();
    println!("{}", "Applying...".bold());
    let result = executor.apply(&plan, &graph, &mut store).await?;
    super::report_result(&result)?;

    println!();
    println!("{}", "Outputs:".bold());
    for (name, value) in output::render(&store)? {
        println!("  {} = {}", name, value.cyan());
    }
    Ok(())
}
