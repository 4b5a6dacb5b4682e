mod cli;
mod error;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use ilostat_core::{CatalogStore, ConnectorConfig, IloClient, Pipeline, RawCache, RunSummary};
use ilostat_warehouse::{Warehouse, WarehouseConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(&cli).await {
        Ok(code) => code,
        Err(error) => {
            tracing::error!(exit_code = error.exit_code(), "{error}");
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

/// Logs go to stderr; stdout carries only the run summary.
fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let config = ConnectorConfig::from_env();
    tracing::debug!(
        home = %config.home.display(),
        base_url = %config.client.base_url,
        "configuration loaded"
    );

    let warehouse = Warehouse::open(WarehouseConfig::from(&config))?;
    let cache = RawCache::new(&config.raw_dir);
    let catalog = Arc::new(CatalogStore::new(cache.clone()));
    let pipeline = Pipeline::new(
        IloClient::new(config.client.clone()),
        cache,
        catalog,
        Arc::new(warehouse),
    )
    .with_run_id(config.run_id.clone());

    let summary = pipeline.run(&cli.plan()).await?;
    print_summary(&summary, cli.pretty)?;
    Ok(ExitCode::SUCCESS)
}

fn print_summary(summary: &RunSummary, pretty: bool) -> Result<(), CliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(summary)?
    } else {
        serde_json::to_string(summary)?
    };
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}")?;
    Ok(())
}
