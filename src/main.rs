mod average;
mod clean;
mod cli;
mod config;
mod download;
mod parquet;
mod reading;
mod scrape;
mod storage;
#[cfg(test)]
mod test_store;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cli::{command, Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.global.log_level);

    match execute(&cli).await {
        Ok(message) => {
            println!("{}", message);
            ExitCode::SUCCESS
        }
        Err(e) => {
            let message = format!("{e:#}");
            tracing::error!(error = %message, "Command failed");
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: &Cli) -> Result<String> {
    let store_config = cli.global.store_config();
    store_config.trace_loaded();
    let store = storage::open_store(&store_config)?;

    match &cli.command {
        Commands::Fetch(args) => {
            let config = args.to_config(&cli.global)?;
            Ok(format!("Fetch: {}", command::fetch(&store, &config).await?))
        }
        Commands::Clean(args) => {
            let config = args.to_config(&cli.global);
            Ok(format!("Clean: {}", command::clean(&store, &config).await?))
        }
        Commands::Calc { age, calc } => {
            let config = calc.to_config(&cli.global, age.filter());
            Ok(format!("Calc: {}", command::calc(&store, &config).await?))
        }
        Commands::Run { clean, calc } => {
            let clean_config = clean.to_config(&cli.global);
            let calc_config = calc.to_config(&cli.global, clean_config.age_filter);
            command::run(&store, &clean_config, &calc_config).await
        }
        Commands::Export { output } => {
            let file_name = command::export(&store, output.clone()).await?;
            Ok(format!("File saved to `{}`", file_name))
        }
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
