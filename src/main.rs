use anyhow::Context;
use clap::Parser;

use ragqa::Settings;
use ragqa::cli::commands;
use ragqa::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Init writes the config file, so it runs before any config is loaded
    if let Commands::Init { force } = cli.command {
        return commands::init::run_init(force);
    }

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Settings::load().context("failed to load configuration")?,
    };

    ragqa::logging::init_with_config(&settings.logging);

    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Config => commands::init::run_config(&settings),
        Commands::Serve { bind } => ragqa::http::serve(settings, bind).await,
        Commands::Ingest { paths } => commands::ingest::run(&paths, &settings).await,
        Commands::Query {
            question,
            top_k,
            json,
        } => commands::query::run(&question, top_k, json, &settings).await,
        Commands::Clear => commands::store::run_clear(&settings),
        Commands::Stats { json } => commands::store::run_stats(&settings, json),
    }
}
