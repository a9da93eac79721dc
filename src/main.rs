use models::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod discovery;
mod models;
mod scheduler;
mod store;

use config::{load_config, Config};
use discovery::{ChromeSessionFactory, LightFetcher};
use scheduler::Scheduler;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use store::SqliteRecordStore;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let (config, config_err) = match load_config("config.yml").await {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("email_crawler={}", config.logging.level))),
        )
        .init();

    if let Some(e) = config_err {
        warn!("Failed to load config.yml: {}. Using defaults.", e);
    }

    // A store we cannot read is fatal before any scheduling begins.
    let store = SqliteRecordStore::open(&config.store.db_path).await?;

    let fetcher = LightFetcher::new(
        Duration::from_secs(config.crawler.fetch_timeout_seconds),
        &config.crawler.user_agent,
    )?;

    let scheduler = Scheduler::new(
        &config,
        Arc::new(store),
        Arc::new(fetcher),
        Arc::new(ChromeSessionFactory),
    );

    // Ctrl+C stops intake of new records; in-flight pipelines finish and
    // every worker's browser session is released on the way out.
    let shutdown = scheduler.shutdown_handle();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    scheduler.run().await?;

    info!("Done.");
    Ok(())
}
