//! greprag CLI: ask questions over a document folder and evaluate retrieval.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// greprag: question answering over documents with grep-extracted citations
#[derive(Parser, Debug)]
#[command(name = "greprag", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Document root to search
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// LLM model to use
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Answer a question from the documents
    Ask {
        /// The question
        question: String,

        /// Tool-calling turns before the final answer
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Measure citation recall over a dataset
    Eval {
        /// Dataset JSON file, or a directory of split files when --split is given
        #[arg(short, long)]
        dataset: PathBuf,

        /// Split name inside the dataset directory
        #[arg(short, long)]
        split: Option<String>,

        /// Directory to write the corpus to (a temporary one by default)
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Evaluate only the first N queries
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Runs in flight at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Save the report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the user configuration file path
    Path,
}

fn init_tracing(verbose: u8, quiet: bool) -> tracing_appender::non_blocking::WorkerGuard {
    let filter = match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "greprag", "greprag")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "greprag.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose, cli.quiet);

    let workspace = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut config = greprag_core::config::load_config(Some(&workspace), cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }
    if let Some(root) = &cli.root {
        config.search.root = root.clone();
    }

    commands::handle_command(cli.command, config).await
}
