use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campsite_reservations::booking::SystemClock;
use campsite_reservations::cache::{start_cache_warmer, AppCache};
use campsite_reservations::config::Config;
use campsite_reservations::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campsite_reservations=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    let db = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    tracing::info!("Database connection established");

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("failed to run migrations")?;
    tracing::info!("Database migrations applied");

    let cache = AppCache::new();
    tokio::spawn(start_cache_warmer(
        cache.clone(),
        db.clone(),
        config.cache_refresh(),
    ));

    let state = AppState {
        db,
        cache,
        clock: Arc::new(SystemClock),
        retry: config.retry_policy(),
        currency: Arc::from(config.currency.as_str()),
    };

    let app = build_router(state);

    let addr = config.server_address();
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
