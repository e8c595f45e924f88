//! Subcommand handlers.

use crate::{Commands, ConfigAction};
use greprag_core::config::AppConfig;
use greprag_core::eval::{AgentFactory, BatchEvaluator, Corpus, Dataset};
use greprag_core::{LlmProvider, SearchAgent, create_provider};
use greprag_tools::{DocumentToolExecutor, document_tree};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub async fn handle_command(command: Commands, config: AppConfig) -> anyhow::Result<()> {
    match command {
        Commands::Ask {
            question,
            max_iterations,
            json,
        } => ask(config, &question, max_iterations, json).await,
        Commands::Eval {
            dataset,
            split,
            corpus,
            limit,
            concurrency,
            output,
        } => {
            let mut config = config;
            if let Some(concurrency) = concurrency {
                config.eval.concurrency = concurrency;
            }
            let options = EvalOptions {
                dataset,
                split,
                corpus,
                limit,
                output,
            };
            eval(config, options).await
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                print!("{}", config.to_toml()?);
                Ok(())
            }
            ConfigAction::Path => {
                match greprag_core::config::user_config_path() {
                    Some(path) => println!("{}", path.display()),
                    None => println!("No configuration directory on this platform"),
                }
                Ok(())
            }
        },
    }
}

/// Agent for `config` with its tools bound to `root`.
fn build_agent(
    provider: Arc<dyn LlmProvider>,
    config: &AppConfig,
    root: &Path,
) -> SearchAgent {
    let mut config = config.clone();
    config.search.root = root.to_path_buf();
    let executor = DocumentToolExecutor::from_config(&config.search);
    let tree = config
        .agent
        .include_tree_snapshot
        .then(|| document_tree(root, config.agent.tree_depth, config.agent.tree_max_entries));
    SearchAgent::from_config(provider, Arc::new(executor), &config, tree.as_deref())
}

async fn ask(
    config: AppConfig,
    question: &str,
    max_iterations: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    config.validate()?;
    if !config.search.root.is_dir() {
        anyhow::bail!(
            "Document root '{}' is not a directory",
            config.search.root.display()
        );
    }

    let provider = create_provider(&config.llm)?;
    let agent = build_agent(provider, &config, &config.search.root);
    let iterations = max_iterations.unwrap_or(config.agent.max_iterations);
    let result = agent.run(question, iterations).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.response);
        let cost = result.usage.cost(
            config.llm.input_price_per_million,
            config.llm.output_price_per_million,
        );
        eprintln!("\n{} | ${:.4}", result.usage, cost);
    }
    Ok(())
}

struct EvalOptions {
    dataset: PathBuf,
    split: Option<String>,
    corpus: Option<PathBuf>,
    limit: Option<usize>,
    output: Option<PathBuf>,
}

async fn eval(config: AppConfig, options: EvalOptions) -> anyhow::Result<()> {
    config.validate()?;

    let dataset = match &options.split {
        Some(split) => Dataset::load_split(&options.dataset, split)?,
        None => Dataset::load(&options.dataset)?,
    }
    .limit(options.limit);
    let split = dataset.split_name().to_string();

    // Removed on drop, after the report is written.
    let scratch;
    let corpus_dir = match &options.corpus {
        Some(dir) => dir.clone(),
        None => {
            scratch = tempfile::tempdir()?;
            scratch.path().to_path_buf()
        }
    };
    let index = Arc::new(Corpus::materialize(&dataset.documents, &corpus_dir)?);

    let provider = create_provider(&config.llm)?;
    let shared = Arc::new(config.clone());
    let factory: AgentFactory = Arc::new(move |root: &Path| {
        Ok(build_agent(provider.clone(), &shared, root))
    });

    let evaluator = BatchEvaluator::new(config.eval.clone(), factory);
    let report = evaluator.evaluate(&split, dataset.queries, index).await;

    println!("{}", report.summary());
    if let Some(path) = &options.output {
        report.save(path)?;
        println!("Results saved to {}", path.display());
    }
    Ok(())
}
