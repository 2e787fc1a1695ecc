mod config;
mod fetch;
mod pipeline;
mod refine;
mod report;

use clap::Parser;
use std::path::PathBuf;
use tracing::{info, info_span};
use tracing_subscriber::EnvFilter;

/// PR Pipeline — snapshots the last 30 days of pull requests for a fixed set
/// of GitHub repositories into raw JSON, then flattens every snapshot into a
/// single CSV.
#[derive(Parser, Debug)]
#[command(name = "pr-pipeline", version, about)]
struct Cli {
    /// Config file to use instead of ./.pr-pipeline.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Which layers to run
    #[arg(long, value_enum, default_value_t = pipeline::Stage::All)]
    stage: pipeline::Stage,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let _main_span = info_span!("pr_pipeline", stage = ?cli.stage).entered();

    info!("loading configuration");
    let config = match cli.config.as_deref() {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };

    let api = fetch::GitHubSearch::new(&config.github);
    let outcome = pipeline::run(&config, &api, cli.stage, chrono::Utc::now()).await?;
    info!(
        raw_files = outcome.raw_files.len(),
        rows = ?outcome.summary.as_ref().map(|s| s.rows_written),
        "done"
    );

    Ok(())
}
