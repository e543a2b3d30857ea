pub mod apply;
pub mod destroy;
pub mod plan;
pub mod show_state;

use colored::Colorize;
use stackform_cloud::{Action, ApplyResult, Outcome, Plan};

/// Print a plan listing with one marked line per action
pub fn print_plan(plan: &Plan) {
    for action in &plan.actions {
        let line = match action {
            Action::Create { spec } => format!("{} {}", "+".green().bold(), spec.key()),
            Action::Update { spec, diff } => {
                let changed: Vec<&str> = diff.iter().map(|d| d.attribute.as_str()).collect();
                format!(
                    "{} {} ({})",
                    "~".yellow().bold(),
                    spec.key(),
                    changed.join(", ")
                )
            }
            Action::Delete { state } => format!("{} {}", "-".red().bold(), state.key()),
            Action::Noop { spec } => format!("  {} (unchanged)", spec.key()),
        };
        println!("  {line}");
    }
    println!();
    println!("Plan: {}", plan.summary());
}

/// Print per-action results and return an error naming the first failure
pub fn report_result(result: &ApplyResult) -> anyhow::Result<()> {
    for r in &result.results {
        match &r.outcome {
            Outcome::Success { message, .. } => {
                println!("  {} {} {}: {}", "✓".green(), r.verb, r.key, message);
            }
            Outcome::Failure { error } => {
                println!("  {} {} {}: {}", "✗".red().bold(), r.verb, r.key, error);
            }
            Outcome::Blocked { dependency } => {
                println!(
                    "  {} {} {}: blocked by {}",
                    "✗".red(),
                    r.verb,
                    r.key,
                    dependency
                );
            }
            Outcome::Cancelled => {
                println!("  {} {} {}: cancelled", "ℹ".blue(), r.verb, r.key);
            }
        }
    }
    println!();

    if result.is_success() {
        println!(
            "{} finished in {}ms",
            "✓".green().bold(),
            result.duration_ms
        );
        Ok(())
    } else {
        let failed: Vec<String> = result.failed().iter().map(|r| r.key.to_string()).collect();
        Err(anyhow::anyhow!("failed resources: {}", failed.join(", ")))
    }
}
