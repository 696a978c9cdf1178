use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fleetwatch::{
    api::{ApiConfig, ApiState, spawn_api_server},
    collector::{Collector, CollectorContext},
    config::{Config, read_config_file},
    query::QueryService,
    scheduler::SchedulerHandle,
    storage::open_backend,
    telemetry::TelemetryClient,
    util::{get_bind_addr, get_config_path},
    writer::PersistenceWriter,
};
use tracing::{error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (defaults to $FLEETWATCH_CONFIG or ./fleetwatch.json)
    #[arg(short)]
    file: Option<String>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("fleetwatch", LevelFilter::TRACE),
        ("fleetwatch_hub", LevelFilter::TRACE),
        ("tower_http", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

fn api_config(config: &Config) -> ApiConfig {
    match &config.api {
        Some(api) => ApiConfig {
            bind_addr: api.bind,
            enable_cors: api.enable_cors,
        },
        None => ApiConfig {
            bind_addr: get_bind_addr(),
            enable_cors: false,
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let path = args.file.unwrap_or_else(get_config_path);
    let config = read_config_file(&path)
        .with_context(|| format!("failed to load configuration from {path}"))?;

    let registry = config.resolve_hosts()?;
    info!("monitoring {} hosts", registry.len());

    let backend = open_backend(&config.storage).await?;
    info!("{}", backend.get_stats().await?);

    let telemetry = TelemetryClient::new(config.request_timeout())?;
    let collector = Arc::new(Collector::new(CollectorContext {
        registry,
        telemetry,
        writer: PersistenceWriter::new(backend.clone()),
    }));

    let scheduler = SchedulerHandle::spawn(collector, config.interval());

    let state = ApiState::new(QueryService::new(backend.clone()));
    let addr = spawn_api_server(api_config(&config), state).await?;
    info!("query API available at http://{addr}/api");

    tokio::signal::ctrl_c().await?;
    info!("received ctrl-c, shutting down");

    if let Err(e) = scheduler.shutdown().await {
        error!("{e:#}");
    }
    backend.close().await?;

    Ok(())
}
