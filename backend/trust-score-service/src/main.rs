use anyhow::Context;
use signal_store::{PgSignalStore, SignalStore, MIGRATOR};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use trust_score_service::{Config, TrustBatchConfig, TrustBatchJob, TrustScoreEngine};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().context("Failed to load config")?;
    let batch_config = TrustBatchConfig::from_env().context("Failed to load batch config")?;
    info!(
        service = %config.service_name,
        environment = %config.environment,
        batch_size = batch_config.batch_size,
        run_once = batch_config.run_once,
        "Configuration loaded"
    );

    let db_config = db_pool::DbConfig::for_service(&config.service_name);
    db_config.log_config();
    let pool = db_pool::create_pool(db_config)
        .await
        .context("Failed to create database pool")?;

    info!("Running database migrations...");
    MIGRATOR.run(&pool).await.map_err(|e| {
        error!("Migration failed: {}", e);
        e
    })?;

    let store: Arc<dyn SignalStore> =
        Arc::new(PgSignalStore::new(pool, config.signal_store_timeout()));
    let engine = Arc::new(TrustScoreEngine::new(store.clone()));
    let job = TrustBatchJob::new(batch_config, store, engine);

    let stats = job.run().await?;
    info!(
        processed = stats.organizers_processed,
        succeeded = stats.organizers_succeeded,
        failed = stats.organizers_failed,
        "Trust batch job completed"
    );

    Ok(())
}
