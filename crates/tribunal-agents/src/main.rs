//! Historical tribunal CLI.
//!
//! ```bash
//! GOOGLE_API_KEY=... tribunal "Napoleon Bonaparte"
//! tribunal --max-rounds 2 --parallel --output-dir verdicts "Nikola Tesla"
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tribunal_agents::config::AppConfig;
use tribunal_agents::prompts::PROMPT_VERSION;
use tribunal_agents::retriever::EvidenceRetriever;
use tribunal_agents::rig_backend::RigBackend;
use tribunal_agents::sources::{DuckDuckGoSource, WikipediaClient};
use tribunal_agents::TrialOrchestrator;

const DEFAULT_LOG_FILTER: &str = "warn,tribunal_agents=info,tribunal=info,coordination=info";

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Adversarial research tribunal", long_about = None)]
struct Args {
    /// Historical figure or event to put on trial
    topic: String,

    /// Maximum research rounds (overrides TRIBUNAL_MAX_ROUNDS)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_rounds: Option<u32>,

    /// Directory for verdict files (overrides TRIBUNAL_OUTPUT_DIR)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Run both research agents concurrently
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Model name (overrides TRIBUNAL_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// OpenAI-compatible endpoint (overrides TRIBUNAL_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,
}

fn init_tracing() {
    // RUST_LOG wins; LOG_LEVEL is accepted as an alias.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::from_env()?;
    if let Some(rounds) = args.max_rounds {
        config.trial.max_rounds = rounds;
    }
    if let Some(dir) = &args.output_dir {
        config.trial.output_dir = dir.clone();
    }
    if args.parallel {
        config.trial.parallel_research = true;
    }
    if let Some(model) = &args.model {
        config.backend.model = model.clone();
    }
    if let Some(url) = &args.base_url {
        config.backend.base_url = url.clone();
    }
    Ok(config)
}

async fn run(args: Args, config: AppConfig) -> Result<()> {
    let trial = Arc::new(config.trial);
    let backend = RigBackend::new(&config.backend, trial.max_tool_turns)?;
    let wikipedia = WikipediaClient::new().context("Failed to build Wikipedia client")?;
    let retriever = EvidenceRetriever::new(Arc::new(wikipedia), trial.clone())
        .with_secondary(Arc::new(DuckDuckGoSource::new()));

    info!(
        model = %config.backend.model,
        base_url = %config.backend.base_url,
        max_rounds = trial.max_rounds,
        parallel = trial.parallel_research,
        prompt_version = PROMPT_VERSION,
        "Tribunal starting"
    );

    let orchestrator =
        TrialOrchestrator::new(Arc::new(backend), retriever, trial, &config.backend);
    let outcome = orchestrator
        .run(&args.topic)
        .await
        .with_context(|| format!("Trial on '{}' failed", args.topic))?;

    println!("{}", outcome.verdict);
    println!();
    println!(
        "[{}] rounds={} verdict saved to {}",
        outcome.decision.status_line(),
        outcome.rounds,
        outcome.verdict_path.display()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Tribunal failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
