use std::sync::Arc;

use engine::{ExchangeRateApi, GeminiExtractor};
use migration::{Migrator, MigratorTrait, MirrorMigrator};

mod scheduler;
mod settings;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ledgerlens={level},server={level},engine={level},audit={level}",
            level = settings.app.level
        ))
        .init();

    let db = connect::<Migrator>(&settings.server.database).await?;
    let mirror = connect::<MirrorMigrator>(&settings.mirror.database).await?;

    let extractor = GeminiExtractor::new(settings.extraction.clone())?;
    let rate_source = ExchangeRateApi::new(&settings.rates.source_url, settings.rates.timeout_secs)?;
    let engine = engine::Engine::builder()
        .database(db.clone())
        .mirror_database(mirror)
        .extractor(Arc::new(extractor))
        .rate_source(Arc::new(rate_source))
        .rate_settings(settings.rates.clone())
        .lifecycle_settings(settings.lifecycle.clone())
        .build()
        .await?;
    let seeded = engine.rates().seed_currency_catalog().await?;
    if seeded > 0 {
        tracing::info!(seeded, "currency catalog seeded");
    }
    let engine = Arc::new(engine);

    let every = scheduler::check_interval(&settings.rates);
    tasks.spawn(scheduler::run_rate_refresh(engine.clone(), every));

    let bind = settings
        .server
        .bind
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{}:{}", bind, settings.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tasks.spawn(async move {
        if let Err(err) = server::run_with_listener(engine, db, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn connect<M: MigratorTrait>(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, BoxError> {
    let database = sea_orm::Database::connect(config.url()).await?;
    M::up(&database, None).await?;
    Ok(database)
}
