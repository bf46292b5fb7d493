// src/history.rs
//! History Store: append-only ledger of computed pair quotes. The storage
//! engine behind it is a collaborator concern; this module defines the
//! repository seam plus the in-memory implementation the binary and tests
//! run against.

use crate::error::Result;
use crate::models::{HistoryEntry, NewHistoryEntry};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use log::debug;
use tokio::sync::Mutex;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends one batch of rows; all rows of a refresh cycle share the same
    /// timestamp. Rows are never mutated or deleted afterwards.
    async fn append(&self, entries: Vec<NewHistoryEntry>) -> Result<()>;

    /// Rows for one pair within the last `days` days, ascending by timestamp.
    async fn query_range(&self, pair_key: &str, days: i64) -> Result<Vec<HistoryEntry>>;

    /// Rows across all pairs within the last `minutes` minutes, descending by
    /// timestamp. Used by the fallback reconstruction path.
    async fn query_recent(&self, minutes: i64) -> Result<Vec<HistoryEntry>>;
}

#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    rows: Mutex<Vec<HistoryEntry>>,
    next_id: Mutex<i64>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
        }
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, entries: Vec<NewHistoryEntry>) -> Result<()> {
        let mut next_id = self.next_id.lock().await;
        let mut rows = self.rows.lock().await;
        for entry in entries {
            rows.push(HistoryEntry {
                id: *next_id,
                pair_key: entry.pair_key,
                from_symbol: entry.from_symbol,
                to_symbol: entry.to_symbol,
                price: entry.price,
                change24h: entry.change24h,
                change_percentage24h: entry.change_percentage24h,
                timestamp: entry.timestamp,
            });
            *next_id += 1;
        }
        debug!("History now holds {} rows", rows.len());
        Ok(())
    }

    async fn query_range(&self, pair_key: &str, days: i64) -> Result<Vec<HistoryEntry>> {
        let since = Utc::now() - Duration::days(days);
        let rows = self.rows.lock().await;
        let mut matched: Vec<HistoryEntry> = rows
            .iter()
            .filter(|r| r.pair_key == pair_key && r.timestamp >= since)
            .cloned()
            .collect();
        matched.sort_by_key(|r| r.timestamp);
        Ok(matched)
    }

    async fn query_recent(&self, minutes: i64) -> Result<Vec<HistoryEntry>> {
        let since = Utc::now() - Duration::minutes(minutes);
        let rows = self.rows.lock().await;
        let mut matched: Vec<HistoryEntry> = rows
            .iter()
            .filter(|r| r.timestamp >= since)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(pair_key: &str, price: f64, age_minutes: i64) -> NewHistoryEntry {
        let (from_symbol, to_symbol) = pair_key.split_once('/').unwrap();
        NewHistoryEntry {
            pair_key: pair_key.to_string(),
            from_symbol: from_symbol.to_string(),
            to_symbol: to_symbol.to_string(),
            price,
            change24h: 0.0,
            change_percentage24h: 0.0,
            timestamp: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    #[tokio::test]
    async fn append_then_query_range_round_trips() {
        let store = InMemoryHistoryStore::new();
        store
            .append(vec![row("TON/USDT", 2.5, 60), row("TON/USDT", 2.6, 10)])
            .await
            .unwrap();

        // Window containing both rows, ascending order
        let rows = store.query_range("TON/USDT", 7).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].price, 2.5);
        assert_eq!(rows[1].price, 2.6);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[1].id, 2);

        // A window excluding the rows returns nothing
        let rows = store.query_range("TON/USDT", 0).await.unwrap();
        assert!(rows.is_empty());

        // Other pairs don't leak in
        let rows = store.query_range("USDT/TON", 7).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn query_recent_is_windowed_and_descending() {
        let store = InMemoryHistoryStore::new();
        store
            .append(vec![
                row("TON/USDT", 2.4, 25),
                row("TON/USDT", 2.5, 10),
                row("USDT/TON", 0.4, 45), // outside a 30-minute window
            ])
            .await
            .unwrap();

        let rows = store.query_recent(30).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].price, 2.5); // most recent first
        assert_eq!(rows[1].price, 2.4);
    }
}
