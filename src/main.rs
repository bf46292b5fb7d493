// src/main.rs
use crypto_pair_tracker::{
    cache::{InMemorySnapshotCache, RedisSnapshotCache, SnapshotCache},
    config::Config,
    fetcher::CoinGeckoFetcher,
    history::{HistoryStore, InMemoryHistoryStore},
    orchestrator::RefreshOrchestrator,
    registry::PairRegistry,
    service::PairTrackerService,
    utils::setup_logging,
};
use log::{info, warn};
use std::{sync::Arc, time::Duration};
use tokio::sync::RwLock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging().expect("Failed to initialize logging");
    info!("Crypto pair tracker starting...");

    // --- Configuration & Initialization ---
    let config = Config::from_env();
    config.validate_and_log();

    let cache: Arc<dyn SnapshotCache> = match &config.redis_url {
        Some(url) => Arc::new(RedisSnapshotCache::new(url).await?),
        None => {
            warn!("REDIS_URL not set, using in-process snapshot cache");
            Arc::new(InMemorySnapshotCache::new())
        }
    };

    let fetcher = Arc::new(CoinGeckoFetcher::new(
        &config.coingecko_api_url,
        Duration::from_secs(config.fetch_timeout_secs),
    )?);
    let history: Arc<dyn HistoryStore> = Arc::new(InMemoryHistoryStore::new());
    let registry = Arc::new(RwLock::new(PairRegistry::new()));

    // Seed the default pair before the first refresh
    {
        let mut registry = registry.write().await;
        if registry.is_empty() {
            registry.seed_default();
        }
    }

    let orchestrator = Arc::new(RefreshOrchestrator::new(
        registry.clone(),
        fetcher,
        cache,
        history.clone(),
        config.cache_ttl_secs,
        config.fallback_window_minutes,
    ));
    let service = PairTrackerService::new(
        registry,
        orchestrator.clone(),
        history,
        config.history_default_days,
    );

    for pair in service.list_pairs().await {
        info!("Tracking pair {} ({} -> {})", pair.id, pair.from.id, pair.to.id);
    }

    // --- Scheduled refresh loop ---
    let mut interval = tokio::time::interval(Duration::from_secs(config.refresh_interval_secs));
    loop {
        interval.tick().await; // first tick fires immediately
        let (snapshot, outcome) = orchestrator.refresh().await;
        info!(
            "Refresh tick: {:?}, {} pairs, last updated {}",
            outcome,
            snapshot.pairs.len(),
            snapshot.last_updated
        );
    }
}
