use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod dataset;
mod inference;
mod models;
mod output;
mod retry;
mod runner;
mod scoring;

use crate::config::{Config, ModelSelector};
use crate::inference::BedrockClient;
use crate::output::OutputFormat;
use crate::runner::Runner;

/// Evaluate hosted models on ACI-Bench clinical note generation with ROUGE
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model name, or a group: "both" (gpt-oss models) or "ministral"
    #[arg(long, default_value = "both")]
    model: ModelSelector,

    /// Data split: train, valid, test1, test2 or test3
    #[arg(long, default_value = "valid")]
    data_split: String,

    /// Path to the ACI-Bench data directory
    #[arg(long, default_value = "raw_data/aci_bench/data")]
    data_dir: PathBuf,

    /// Output directory for results
    #[arg(long, default_value = "evaluation/results")]
    output_dir: PathBuf,

    /// Maximum number of samples to evaluate
    #[arg(long)]
    max_samples: Option<usize>,

    /// Optional TOML file overriding models, splits and inference settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format of the final summary: plain or json
    #[arg(short, long, default_value = "plain")]
    output: OutputFormat,

    /// Verbose output - log every API request
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.select_models(&args.model)?;

    info!(data_split = %args.data_split, "loading ACI-Bench split");
    let samples = dataset::load_split(&args.data_dir, &args.data_split, &config, args.max_samples)?;
    info!(samples = samples.len(), "loaded samples");

    let backend = BedrockClient::from_config(&config)?;
    info!(
        endpoint = %config.endpoint(),
        backoff = ?config.retry_policy().schedule(),
        "inference client ready"
    );

    let runner = Runner::new(config, backend, &args.output_dir);
    let outcome = runner.run(&args.model, &args.data_split, &samples).await?;

    output::print_results(&outcome, args.output);

    Ok(())
}
