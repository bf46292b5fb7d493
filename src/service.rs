// src/service.rs
//! Service facade: the operations the HTTP layer calls. Pair mutations are
//! write-through — a successful add or deactivate invalidates the cached
//! snapshot and re-fetches immediately, so stale prices never outlive a
//! registry change.

use crate::error::Result;
use crate::history::HistoryStore;
use crate::models::{Asset, DirectedPair, HistoryEntry, Snapshot};
use crate::orchestrator::RefreshOrchestrator;
use crate::registry::PairRegistry;
use log::info;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct PairTrackerService {
    registry: Arc<RwLock<PairRegistry>>,
    orchestrator: Arc<RefreshOrchestrator>,
    history: Arc<dyn HistoryStore>,
    history_default_days: i64,
}

impl PairTrackerService {
    pub fn new(
        registry: Arc<RwLock<PairRegistry>>,
        orchestrator: Arc<RefreshOrchestrator>,
        history: Arc<dyn HistoryStore>,
        history_default_days: i64,
    ) -> Self {
        Self {
            registry,
            orchestrator,
            history,
            history_default_days,
        }
    }

    /// Current snapshot: cache, then live fetch, then recent history.
    pub async fn get_prices(&self) -> Snapshot {
        self.orchestrator.get_prices().await
    }

    /// History rows for a registered pair (active or inactive), ascending,
    /// within the last `days` days (default when `None`). `PairNotFound` for
    /// ids the registry has never seen.
    pub async fn get_historical_prices(
        &self,
        pair_id: &str,
        days: Option<i64>,
    ) -> Result<Vec<HistoryEntry>> {
        let pair_key = {
            let registry = self.registry.read().await;
            match registry.find(pair_id) {
                Some(pair) => pair.pair_key(),
                None => {
                    return Err(crate::error::TrackerError::PairNotFound(format!(
                        "trading pair '{}' is not registered",
                        pair_id
                    )))
                }
            }
        };
        self.history
            .query_range(&pair_key, days.unwrap_or(self.history_default_days))
            .await
    }

    /// All pairs, active and inactive, in insertion order.
    pub async fn list_pairs(&self) -> Vec<DirectedPair> {
        self.registry.read().await.list_pairs()
    }

    /// Registers a pair and its mirror, then forces a refresh. Returns the
    /// pairs actually created or reactivated (possibly none when both
    /// directions were already active).
    pub async fn add_pair(&self, from: Asset, to: Asset) -> Vec<DirectedPair> {
        let changed = self.registry.write().await.add_pair(from, to);
        info!("add_pair changed {} registry entries", changed.len());
        self.orchestrator.force_refresh().await;
        changed
    }

    /// Deactivates an active pair and forces a refresh. `PairNotFound`
    /// failures mutate nothing and trigger no refresh.
    pub async fn deactivate_pair(&self, id: &str) -> Result<DirectedPair> {
        let pair = self.registry.write().await.deactivate_pair(id)?;
        self.orchestrator.force_refresh().await;
        Ok(pair)
    }
}
