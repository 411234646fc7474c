//! Comment service process.
//!
//! Loads configuration, connects to PostgreSQL, Redis and the post service,
//! then runs the outbox relay until Ctrl-C. On shutdown the relay finishes
//! its last batch and both worker pools drain.

use std::error::Error;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use comment_service::adapters::{HttpPostDirectory, PostgresCommentStore, RedisStreamClient};
use comment_service::config::{AppConfig, LogFormat, LoggingConfig};
use comment_service::runtime::{RuntimeSettings, ServiceRuntime};

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter.as_str()));

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_logging(&config.logging);

    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;
    let store = Arc::new(PostgresCommentStore::new(pool));
    if config.database.run_migrations {
        store.migrate().await?;
        info!("Database migrations applied");
    }

    let stream = Arc::new(RedisStreamClient::connect(&config.redis, &config.streams).await?);
    let posts = Arc::new(HttpPostDirectory::from_config(&config.post_service)?);

    let runtime = ServiceRuntime::build(&RuntimeSettings::from(&config), store, stream, posts);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let relay = runtime.relay();
    let relay_task = tokio::spawn(async move { relay.run(shutdown_rx).await });

    info!("Comment service started");
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for shutdown signal");
    }

    info!("Shutdown requested");
    let _ = shutdown_tx.send(true);
    if let Err(err) = relay_task.await {
        error!(error = %err, "Outbox relay task failed");
    }
    runtime.shutdown().await;

    info!("Comment service stopped");
    Ok(())
}
