// =============================================================================
// launch-sentinel — Main Entry Point
// =============================================================================
//
// Composes the Upstream Adapter, Cache, Persistence, Encryption, Pattern
// Discovery Engine, and Durable Work Scheduler, then runs them until a
// shutdown signal arrives.
// =============================================================================

mod app_state;
mod cache;
mod config;
mod discovery;
mod encryption;
mod error;
mod exchange;
mod persistence;
mod scheduler;
mod types;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::cache::{Cache, TtlConfig};
use crate::config::Config;
use crate::discovery::DiscoveryEngine;
use crate::encryption::load_api_credentials;
use crate::exchange::ExchangeClient;
use crate::persistence::memory::MemoryStore;
use crate::persistence::postgres::PostgresStore;
use crate::persistence::Store;
use crate::scheduler::Scheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("launch-sentinel starting up");

    let config = Arc::new(Config::from_env());

    // ── 2. Upstream credentials ───────────────────────────────────────────
    let credentials = load_api_credentials(&config);
    if !config.mexc_api_configured() {
        warn!("no exchange credentials configured — signed endpoints will fail");
    }

    // ── 3. Cache ───────────────────────────────────────────────────────────
    let cache = Arc::new(Cache::new(config.cache_url().map(str::to_string), TtlConfig::from_config(&config)));
    cache.start().await;

    // ── 4. Upstream adapter ─────────────────────────────────────────────────
    let exchange = Arc::new(ExchangeClient::new(
        &config,
        cache.clone(),
        credentials.api_key,
        credentials.secret_key,
    ));

    // ── 5. Persistence ───────────────────────────────────────────────────────
    let store: Arc<dyn Store> = if config.database_configured() {
        let url = config.database_url.as_deref().expect("checked by database_configured");
        match PostgresStore::connect(url).await {
            Ok(store) => {
                info!("connected to Postgres store");
                Arc::new(store)
            }
            Err(e) => {
                error!(error = %e, "failed to connect to Postgres — falling back to in-process store");
                Arc::new(MemoryStore::new())
            }
        }
    } else {
        warn!("DATABASE_URL not set — using non-durable in-process store");
        Arc::new(MemoryStore::new())
    };

    // ── 6. Pattern Discovery Engine ──────────────────────────────────────────
    let discovery = Arc::new(DiscoveryEngine::new(store.clone(), exchange.clone(), &config));

    // ── 7. Durable Work Scheduler ─────────────────────────────────────────────
    let scheduler = Arc::new(Scheduler::new(discovery.clone(), exchange.clone(), store.clone(), &config)?);

    // ── 8. Shared state ──────────────────────────────────────────────────────
    let state = Arc::new(AppState::new(
        config.clone(),
        cache.clone(),
        exchange.clone(),
        store.clone(),
        discovery.clone(),
        scheduler.clone(),
    ));

    // ── 9. Spawn background tasks ─────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let discovery_task = {
        let discovery = discovery.clone();
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move { discovery.run_background_loop(shutdown_rx).await })
    };

    let scheduler_task = {
        let scheduler = scheduler.clone();
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move { scheduler.run(shutdown_rx).await })
    };

    info!(
        environment = %state.config.environment,
        database_configured = config.database_configured(),
        redis_configured = config.redis_configured(),
        "all subsystems running — press Ctrl+C to stop"
    );

    // ── 10. Graceful shutdown ─────────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received — stopping gracefully");

    let _ = shutdown_tx.send(true);

    if let Err(e) = scheduler_task.await {
        error!(error = %e, "scheduler task panicked during shutdown");
    }
    if let Err(e) = discovery_task.await {
        error!(error = %e, "discovery task panicked during shutdown");
    }

    info!("launch-sentinel shut down complete");
    Ok(())
}
