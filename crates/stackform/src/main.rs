mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackform")]
#[command(about = "Declarative provisioning of a fixed web stack", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding the state file
    #[arg(long, env = "STACKFORM_STATE_DIR", default_value = ".stackform", global = true)]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what an apply would change, without touching anything
    Plan,
    /// Create or update the stack to match the template
    Apply {
        /// Where to write the generated private key
        #[arg(long, env = "STACKFORM_KEY_FILE")]
        key_file: Option<PathBuf>,
        /// Maximum provider calls in flight at once
        #[arg(long, default_value = "4")]
        concurrency: usize,
        /// Per-call timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
    /// Tear down every managed resource
    Destroy {
        /// Maximum provider calls in flight at once
        #[arg(long, default_value = "4")]
        concurrency: usize,
        /// Per-call timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
    /// Print the stored state
    ShowState {
        /// Emit raw JSON instead of the table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Plan => commands::plan::handle(&cli.state_dir).await,
        Commands::Apply {
            key_file,
            concurrency,
            timeout,
        } => commands::apply::handle(&cli.state_dir, key_file, concurrency, timeout).await,
        Commands::Destroy {
            concurrency,
            timeout,
        } => commands::destroy::handle(&cli.state_dir, concurrency, timeout).await,
        Commands::ShowState { json } => commands::show_state::handle(&cli.state_dir, json).await,
    }
}
