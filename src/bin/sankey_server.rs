//! sankey_server: REST server for flow diagram data.
//!
//! Configuration is read from the environment (and `.env`); see
//! `sankey_flow::config` for the variables.

use std::sync::Arc;

use anyhow::Context;
use sankey_flow::api::build_router;
use sankey_flow::cache::{CacheStore, MemoryCache, RedisCache};
use sankey_flow::store::{AnalyticStore, PgAnalyticStore};
use sankey_flow::{SankeyConfig, SankeyService};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sankey_flow=debug,tower_http=debug".into()),
        )
        .init();

    let config = SankeyConfig::from_env().context("invalid configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_db_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to analytic store")?;
    tracing::info!("Connected to analytic store");

    let cache: Arc<dyn CacheStore> = match &config.redis_url {
        Some(url) => {
            tracing::info!("Using shared Redis cache");
            Arc::new(RedisCache::open(url).context("invalid SANKEY_REDIS_URL")?)
        }
        None => {
            tracing::info!(
                max_entries = config.cache_max_entries,
                "SANKEY_REDIS_URL not set, using in-process cache"
            );
            Arc::new(MemoryCache::with_max_entries(config.cache_max_entries))
        }
    };
    let store: Arc<dyn AnalyticStore> = Arc::new(PgAnalyticStore::new(pool));

    let service = Arc::new(SankeyService::from_config(store, cache, &config));
    let app = build_router(service);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;
    tracing::info!(
        top_n = config.top_n,
        max_attempts = config.retry.max_attempts,
        "sankey_server listening on {}",
        config.bind_addr
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
