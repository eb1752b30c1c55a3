use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use tracing::info;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use game_analytics_service::config::Config;
use game_analytics_service::handlers::{self, AppState};
use game_analytics_service::store::{TableSources, TableStore};

#[actix_web::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    // Initialize tracing
    let json_logs = config.log_format == "json";
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    info!(
        "Starting game-analytics-service v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!(data_dir = %config.data_dir, "Configuration loaded and validated");

    // Tables are immutable snapshots, so they are read once here and shared
    let store = TableStore::new(TableSources::from_config(&config));
    let state = AppState::initialize(store, config.similar_items_limit)
        .context("Failed to load datasets")?;
    let state = web::Data::new(state);

    info!(
        "Starting HTTP server on {}:{}",
        config.http_host, config.http_port
    );

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(state.clone())
            .configure(handlers::configure)
    });

    if config.http_workers > 0 {
        server = server.workers(config.http_workers);
    }

    server
        .bind((config.http_host.as_str(), config.http_port))
        .context("Failed to bind HTTP server")?
        .run()
        .await
        .context("HTTP server error")
}
