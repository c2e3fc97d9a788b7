mod analysis;
mod console;
mod daily_change;
mod dashboard;
mod errors;
mod models;
mod ranking;
mod report;
mod settings;
mod sources;
mod storage_utils;

use anyhow::Context;
use clap::{Parser, Subcommand};
use settings::{Provider, Settings};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Ranks the largest daily gains and losses of a commodity-tracking instrument.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML settings file (defaults to ./price-movers.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Alpha Vantage API key. Without one, synthetic sample data is used.
    #[arg(long, global = true, env = "ALPHAVANTAGE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Overrides `source.provider`.
    #[arg(long, global = true, value_enum)]
    provider: Option<Provider>,

    /// Overrides `output.dir`.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Fetch prices, rank movements and write all reports (default).
    Run,
    /// Browse the latest results in an interactive terminal view.
    Dashboard,
}

fn init_tracing(command: Commands) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    match command {
        // Log lines would tear the alternate screen apart.
        Commands::Dashboard => builder.with_writer(std::io::sink).init(),
        Commands::Run => builder.init(),
    }
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = settings::load_settings(cli.config.as_deref()).context("Invalid configuration")?;
    if let Some(provider) = cli.provider {
        settings.source.provider = provider;
    }
    if let Some(dir) = &cli.output_dir {
        settings.output.dir = dir.clone();
    }
    Ok(settings)
}

async fn run(settings: &Settings, api_key: Option<&str>) -> anyhow::Result<()> {
    let output = analysis::run_analysis_pipeline(settings, api_key).await?;

    console::print_summary(&output.document, settings.analysis.console_top);

    println!("\nResults saved to:");
    for (label, path) in output.artifacts.all() {
        println!("  - {} ({})", path.display(), label);
    }

    if output.document.metadata.synthetic {
        println!("\nTo analyze real prices, pass a free Alpha Vantage key:");
        println!("  price-movers --api-key YOUR_API_KEY");
        println!("or select the Yahoo provider: price-movers --provider yahoo");
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run);
    init_tracing(command);

    let settings = load_settings(&cli)?;
    let api_key = cli.api_key.as_deref();

    let result = match command {
        Commands::Run => run(&settings, api_key).await,
        Commands::Dashboard => dashboard::run_dashboard(&settings, api_key).await,
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
