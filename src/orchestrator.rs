// src/orchestrator.rs
//! Refresh Orchestrator: the state machine tying registry, fetcher, cache and
//! history together. A cycle either fetches fresh quotes, serves a fallback
//! reconstructed from recent history, or short-circuits to an empty snapshot.
//! Upstream and cache trouble never escapes this module; the worst case is a
//! possibly-stale or empty snapshot with an honest `last_updated`.

use crate::cache::SnapshotCache;
use crate::error::Result;
use crate::fetcher::RateFetcher;
use crate::history::HistoryStore;
use crate::models::{NewHistoryEntry, Snapshot};
use crate::registry::PairRegistry;
use crate::synthesizer::synthesize;
use chrono::Utc;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// How a refresh cycle produced its snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Fresh quotes fetched from upstream and persisted
    Fetched,
    /// Upstream failed; snapshot reconstructed from recent history
    Fallback,
    /// No active pairs (or no usable data at all)
    Empty,
}

pub struct RefreshOrchestrator {
    registry: Arc<RwLock<PairRegistry>>,
    fetcher: Arc<dyn RateFetcher>,
    cache: Arc<dyn SnapshotCache>,
    history: Arc<dyn HistoryStore>,
    cache_ttl_secs: u64,
    fallback_window_minutes: i64,
}

impl RefreshOrchestrator {
    pub fn new(
        registry: Arc<RwLock<PairRegistry>>,
        fetcher: Arc<dyn RateFetcher>,
        cache: Arc<dyn SnapshotCache>,
        history: Arc<dyn HistoryStore>,
        cache_ttl_secs: u64,
        fallback_window_minutes: i64,
    ) -> Self {
        Self {
            registry,
            fetcher,
            cache,
            history,
            cache_ttl_secs,
            fallback_window_minutes,
        }
    }

    /// Runs one refresh cycle. Infallible by design: upstream failure turns
    /// into a history-based fallback, total data absence into an empty
    /// snapshot. Concurrent callers each run their own cycle; refresh is
    /// idempotent at the snapshot level (last cache write wins, history rows
    /// are append-only), so in-flight cycles are deliberately not coalesced.
    pub async fn refresh(&self) -> (Snapshot, RefreshOutcome) {
        match self.try_fetch_cycle().await {
            Ok(result) => result,
            Err(e) => {
                warn!("Upstream fetch failed ({}), serving recent history", e);
                (self.reconstruct_from_history().await, RefreshOutcome::Fallback)
            }
        }
    }

    /// Registry-mutation hook: drops the cached snapshot, then refreshes
    /// immediately so a stale entry never outlives a registry change.
    pub async fn force_refresh(&self) -> (Snapshot, RefreshOutcome) {
        if let Err(e) = self.cache.invalidate().await {
            warn!("Cache invalidation failed ({}), refreshing anyway", e);
        }
        self.refresh().await
    }

    /// Read path: cache hit is served as-is; a miss runs a refresh cycle. A
    /// cache *error* is treated as a miss too, but with an extra guard — if
    /// the cycle also fails, the answer comes straight from recent history.
    pub async fn get_prices(&self) -> Snapshot {
        match self.cache.get().await {
            Ok(Some(snapshot)) => {
                debug!("Serving snapshot from cache");
                snapshot
            }
            Ok(None) => self.refresh().await.0,
            Err(e) => {
                warn!("Cache read failed ({}), refreshing without it", e);
                match self.try_fetch_cycle().await {
                    Ok((snapshot, _)) => snapshot,
                    Err(e) => {
                        warn!("Refresh failed after cache error ({}), serving recent history", e);
                        self.reconstruct_from_history().await
                    }
                }
            }
        }
    }

    /// The fetch path of a cycle. Fails only on `UpstreamUnavailable`; cache
    /// and history write errors are logged and absorbed.
    async fn try_fetch_cycle(&self) -> Result<(Snapshot, RefreshOutcome)> {
        let active_pairs = self.registry.read().await.active_pairs();
        let now = Utc::now();

        if active_pairs.is_empty() {
            debug!("No active pairs, producing empty snapshot");
            let snapshot = Snapshot::empty(now);
            self.write_cache(&snapshot).await;
            return Ok((snapshot, RefreshOutcome::Empty));
        }

        // Deduplicated union of asset ids; one upstream lookup per asset
        // however many pairs share it.
        let mut seen = HashSet::new();
        let mut asset_ids = Vec::new();
        for pair in &active_pairs {
            for id in [&pair.from.id, &pair.to.id] {
                if seen.insert(id.clone()) {
                    asset_ids.push(id.clone());
                }
            }
        }

        let raw_quotes = self.fetcher.fetch(&asset_ids).await?;
        let snapshot = synthesize(&active_pairs, &raw_quotes, now);
        info!(
            "Refreshed {} of {} active pairs from upstream",
            snapshot.pairs.len(),
            active_pairs.len()
        );

        self.write_cache(&snapshot).await;

        let entries: Vec<NewHistoryEntry> = snapshot
            .pairs
            .iter()
            .map(|(pair_key, quote)| NewHistoryEntry {
                pair_key: pair_key.clone(),
                from_symbol: quote.from_symbol.clone(),
                to_symbol: quote.to_symbol.clone(),
                price: quote.price,
                change24h: quote.change24h,
                change_percentage24h: quote.change_percentage24h,
                timestamp: now,
            })
            .collect();
        if !entries.is_empty() {
            if let Err(e) = self.history.append(entries).await {
                warn!("History append failed: {}", e);
            }
        }

        Ok((snapshot, RefreshOutcome::Fetched))
    }

    async fn write_cache(&self, snapshot: &Snapshot) {
        if let Err(e) = self.cache.set(snapshot, self.cache_ttl_secs).await {
            warn!("Cache write failed: {}", e);
        }
    }

    /// Rebuilds a snapshot from the most recent history row per pair inside
    /// the staleness window. Raw quotes are never reconstructed from history.
    async fn reconstruct_from_history(&self) -> Snapshot {
        let rows = match self.history.query_recent(self.fallback_window_minutes).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("History fallback query failed: {}", e);
                return Snapshot::empty(Utc::now());
            }
        };

        if rows.is_empty() {
            debug!(
                "No history rows within the last {} minutes",
                self.fallback_window_minutes
            );
            return Snapshot::empty(Utc::now());
        }

        let mut snapshot = Snapshot::empty(rows[0].timestamp);
        // Rows are ordered most recent first, so the first row seen per pair
        // is the one to keep.
        for row in rows {
            snapshot.last_updated = snapshot.last_updated.max(row.timestamp);
            snapshot
                .pairs
                .entry(row.pair_key.clone())
                .or_insert_with(|| crate::models::PairQuote {
                    price: row.price,
                    change24h: row.change24h,
                    change_percentage24h: row.change_percentage24h,
                    from_symbol: row.from_symbol.clone(),
                    to_symbol: row.to_symbol.clone(),
                    last_updated: row.timestamp,
                });
        }
        info!(
            "Reconstructed snapshot for {} pairs from recent history",
            snapshot.pairs.len()
        );
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemorySnapshotCache;
    use crate::history::InMemoryHistoryStore;
    use crate::error::TrackerError;
    use crate::models::{Asset, RawAssetQuote};
    use assert_approx_eq::assert_approx_eq;
    use async_trait::async_trait;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockFetcher {
        quotes: Option<HashMap<String, RawAssetQuote>>,
        calls: AtomicUsize,
    }

    impl MockFetcher {
        fn succeeding(quotes: &[(&str, f64, f64)]) -> Self {
            let quotes = quotes
                .iter()
                .map(|(id, usd, change)| {
                    (
                        id.to_string(),
                        RawAssetQuote {
                            usd: Some(*usd),
                            usd_24h_change: Some(*change),
                        },
                    )
                })
                .collect();
            Self {
                quotes: Some(quotes),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                quotes: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateFetcher for MockFetcher {
        async fn fetch(&self, _asset_ids: &[String]) -> Result<HashMap<String, RawAssetQuote>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.quotes {
                Some(quotes) => Ok(quotes.clone()),
                None => Err(TrackerError::UpstreamUnavailable(
                    "simulated outage".to_string(),
                )),
            }
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl SnapshotCache for BrokenCache {
        async fn get(&self) -> Result<Option<Snapshot>> {
            Err(TrackerError::CacheUnavailable("broken".to_string()))
        }
        async fn set(&self, _snapshot: &Snapshot, _ttl_secs: u64) -> Result<()> {
            Err(TrackerError::CacheUnavailable("broken".to_string()))
        }
        async fn invalidate(&self) -> Result<()> {
            Err(TrackerError::CacheUnavailable("broken".to_string()))
        }
    }

    fn registry_with_ton_usdt() -> Arc<RwLock<PairRegistry>> {
        let mut registry = PairRegistry::new();
        registry.add_pair(
            Asset::new("the-open-network", "TON", "Toncoin"),
            Asset::new("tether", "USDT", "Tether"),
        );
        Arc::new(RwLock::new(registry))
    }

    fn orchestrator(
        registry: Arc<RwLock<PairRegistry>>,
        fetcher: Arc<MockFetcher>,
        cache: Arc<dyn SnapshotCache>,
        history: Arc<InMemoryHistoryStore>,
    ) -> RefreshOrchestrator {
        RefreshOrchestrator::new(registry, fetcher, cache, history, 1800, 30)
    }

    #[tokio::test]
    async fn empty_registry_short_circuits_without_fetching() {
        let registry = Arc::new(RwLock::new(PairRegistry::new()));
        let fetcher = Arc::new(MockFetcher::succeeding(&[]));
        let cache = Arc::new(InMemorySnapshotCache::new());
        let history = Arc::new(InMemoryHistoryStore::new());
        let orch = orchestrator(registry, fetcher.clone(), cache.clone(), history.clone());

        let (snapshot, outcome) = orch.refresh().await;

        assert_eq!(outcome, RefreshOutcome::Empty);
        assert!(snapshot.pairs.is_empty());
        assert_eq!(fetcher.call_count(), 0);
        // Empty snapshot is still cached, but nothing is written to history
        assert_eq!(cache.get().await.unwrap(), Some(snapshot));
        assert!(history.query_recent(60).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn successful_cycle_caches_and_appends_history() {
        let registry = registry_with_ton_usdt();
        let fetcher = Arc::new(MockFetcher::succeeding(&[
            ("the-open-network", 2.50, 4.0),
            ("tether", 1.0, 0.1),
        ]));
        let cache = Arc::new(InMemorySnapshotCache::new());
        let history = Arc::new(InMemoryHistoryStore::new());
        let orch = orchestrator(registry, fetcher.clone(), cache.clone(), history.clone());

        let (snapshot, outcome) = orch.refresh().await;

        assert_eq!(outcome, RefreshOutcome::Fetched);
        // Twin pairs, one quote each
        assert_eq!(snapshot.pairs.len(), 2);
        assert_approx_eq!(snapshot.pairs["TON/USDT"].price, 2.5);
        assert_approx_eq!(snapshot.pairs["USDT/TON"].price, 0.4);
        assert_approx_eq!(snapshot.pairs["TON/USDT"].change_percentage24h, 3.9);

        assert_eq!(cache.get().await.unwrap(), Some(snapshot.clone()));
        let rows = history.query_recent(5).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.timestamp == snapshot.last_updated));
    }

    #[tokio::test]
    async fn fetch_failure_falls_back_to_most_recent_history_per_pair() {
        let registry = registry_with_ton_usdt();
        let fetcher = Arc::new(MockFetcher::failing());
        let cache = Arc::new(InMemorySnapshotCache::new());
        let history = Arc::new(InMemoryHistoryStore::new());

        let now = Utc::now();
        history
            .append(vec![
                NewHistoryEntry {
                    pair_key: "TON/USDT".to_string(),
                    from_symbol: "TON".to_string(),
                    to_symbol: "USDT".to_string(),
                    price: 2.40,
                    change24h: 0.05,
                    change_percentage24h: 2.0,
                    timestamp: now - Duration::minutes(25),
                },
                NewHistoryEntry {
                    pair_key: "TON/USDT".to_string(),
                    from_symbol: "TON".to_string(),
                    to_symbol: "USDT".to_string(),
                    price: 2.50,
                    change24h: 0.09,
                    change_percentage24h: 3.9,
                    timestamp: now - Duration::minutes(10),
                },
            ])
            .await
            .unwrap();

        let orch = orchestrator(registry, fetcher, cache, history);
        let (snapshot, outcome) = orch.refresh().await;

        assert_eq!(outcome, RefreshOutcome::Fallback);
        // Only TON/USDT had rows in the window; the most recent one wins
        assert_eq!(snapshot.pairs.len(), 1);
        assert_approx_eq!(snapshot.pairs["TON/USDT"].price, 2.50);
        assert_eq!(snapshot.last_updated, snapshot.pairs["TON/USDT"].last_updated);
        // Raw quotes are never reconstructed from history
        assert!(snapshot.raw_quotes.is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_with_no_recent_history_degrades_to_empty() {
        let registry = registry_with_ton_usdt();
        let fetcher = Arc::new(MockFetcher::failing());
        let cache = Arc::new(InMemorySnapshotCache::new());
        let history = Arc::new(InMemoryHistoryStore::new());

        // A row outside the 30-minute staleness window doesn't count
        history
            .append(vec![NewHistoryEntry {
                pair_key: "TON/USDT".to_string(),
                from_symbol: "TON".to_string(),
                to_symbol: "USDT".to_string(),
                price: 2.2,
                change24h: 0.0,
                change_percentage24h: 0.0,
                timestamp: Utc::now() - Duration::hours(2),
            }])
            .await
            .unwrap();

        let orch = orchestrator(registry, fetcher, cache, history);
        let (snapshot, outcome) = orch.refresh().await;

        assert_eq!(outcome, RefreshOutcome::Fallback);
        assert!(snapshot.pairs.is_empty());
    }

    #[tokio::test]
    async fn get_prices_serves_cache_hits_without_fetching() {
        let registry = registry_with_ton_usdt();
        let fetcher = Arc::new(MockFetcher::succeeding(&[
            ("the-open-network", 2.50, 4.0),
            ("tether", 1.0, 0.1),
        ]));
        let cache = Arc::new(InMemorySnapshotCache::new());
        let history = Arc::new(InMemoryHistoryStore::new());
        let orch = orchestrator(registry, fetcher.clone(), cache.clone(), history);

        let cached = Snapshot::empty(Utc::now());
        cache.set(&cached, 60).await.unwrap();

        let snapshot = orch.get_prices().await;
        assert_eq!(snapshot, cached);
        assert_eq!(fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn get_prices_refreshes_on_cache_miss() {
        let registry = registry_with_ton_usdt();
        let fetcher = Arc::new(MockFetcher::succeeding(&[
            ("the-open-network", 2.50, 4.0),
            ("tether", 1.0, 0.1),
        ]));
        let cache = Arc::new(InMemorySnapshotCache::new());
        let history = Arc::new(InMemoryHistoryStore::new());
        let orch = orchestrator(registry, fetcher.clone(), cache, history);

        let snapshot = orch.get_prices().await;
        assert_eq!(fetcher.call_count(), 1);
        assert_eq!(snapshot.pairs.len(), 2);
    }

    #[tokio::test]
    async fn get_prices_survives_cache_and_upstream_both_failing() {
        let registry = registry_with_ton_usdt();
        let fetcher = Arc::new(MockFetcher::failing());
        let cache: Arc<dyn SnapshotCache> = Arc::new(BrokenCache);
        let history = Arc::new(InMemoryHistoryStore::new());

        history
            .append(vec![NewHistoryEntry {
                pair_key: "TON/USDT".to_string(),
                from_symbol: "TON".to_string(),
                to_symbol: "USDT".to_string(),
                price: 2.45,
                change24h: 0.0,
                change_percentage24h: 0.0,
                timestamp: Utc::now() - Duration::minutes(5),
            }])
            .await
            .unwrap();

        let orch = RefreshOrchestrator::new(registry, fetcher, cache, history, 1800, 30);
        let snapshot = orch.get_prices().await;

        assert_eq!(snapshot.pairs.len(), 1);
        assert_approx_eq!(snapshot.pairs["TON/USDT"].price, 2.45);
    }

    #[tokio::test]
    async fn force_refresh_drops_the_cached_snapshot_first() {
        let registry = registry_with_ton_usdt();
        let fetcher = Arc::new(MockFetcher::succeeding(&[
            ("the-open-network", 2.50, 4.0),
            ("tether", 1.0, 0.1),
        ]));
        let cache = Arc::new(InMemorySnapshotCache::new());
        let history = Arc::new(InMemoryHistoryStore::new());
        let orch = orchestrator(registry, fetcher.clone(), cache.clone(), history);

        let stale = Snapshot::empty(Utc::now());
        cache.set(&stale, 3600).await.unwrap();

        let (snapshot, outcome) = orch.force_refresh().await;
        assert_eq!(outcome, RefreshOutcome::Fetched);
        assert_eq!(fetcher.call_count(), 1);
        assert_eq!(cache.get().await.unwrap(), Some(snapshot));
    }
}
