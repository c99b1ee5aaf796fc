use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use iiq_sync_lib::application::{CustomFieldSchemaBuilder, OrchestratorSettings, SyncOrchestrator, SyncRunner};
use iiq_sync_lib::domain::{EntityKind, PersistenceGateway};
use iiq_sync_lib::infrastructure::{
    AppConfig, ConfigOverrides, DatabaseConnection, HttpClientConfig, HttpCustomFieldSource, IiqClient,
    IiqResourceProvider, SqlGateway, init_logging_with_config, log_system_info,
};

/// Full refresh of IncidentIQ assets, users, locations, tickets, rooms and teams
#[derive(Debug, Parser)]
#[command(name = "iiq-sync", version, about)]
struct Cli {
    /// Configuration file (TOML); layered over config/default.toml
    #[arg(short, long, env = "IIQ_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Sync only these kinds (repeatable), overriding sync.entity_kinds
    #[arg(long = "only", value_name = "KIND")]
    only: Vec<EntityKind>,

    /// Override sync.workers
    #[arg(short, long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.apply_overrides(ConfigOverrides {
        workers: cli.workers,
        entity_kinds: cli.only,
    });
    config.validate().context("Invalid configuration")?;

    init_logging_with_config(&config.logging).context("Failed to initialize logging")?;
    log_system_info();
    info!("Syncing {} with {} workers", config.source.instance, config.sync.workers);

    let client = Arc::new(IiqClient::new(
        &config.source.instance,
        &config.source.token,
        &HttpClientConfig {
            timeout_seconds: config.source.timeout_secs,
            ..HttpClientConfig::default()
        },
    )?);

    let pool_size = u32::try_from(config.sync.workers).unwrap_or(u32::MAX);
    let connection = DatabaseConnection::new(&config.destination.connection_string, pool_size).await?;
    let gateway: Arc<dyn PersistenceGateway> = Arc::new(SqlGateway::new(&connection, &config.destination));

    let runner = SyncRunner::new(
        Arc::new(IiqResourceProvider::new(Arc::clone(&client), config.source.page_size)),
        CustomFieldSchemaBuilder::new(Arc::new(HttpCustomFieldSource::new(client))),
        Arc::clone(&gateway),
        SyncOrchestrator::new(
            gateway,
            OrchestratorSettings {
                worker_count: config.sync.workers,
                string_length: config.destination.string_length,
            },
        ),
    );

    let report = runner.run(&config.sync.entity_kinds).await;
    match serde_json::to_string(&report) {
        Ok(summary) => info!(report = %summary, "Run report"),
        Err(e) => error!("Failed to serialize run report: {}", e),
    }
    connection.pool().close().await;

    Ok(ExitCode::from(report.exit_code()))
}
