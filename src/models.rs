// src/models.rs
//! Shared model types: assets, directed pairs, raw upstream quotes and the
//! snapshot object the cache stores and the refresh cycle produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An underlying asset as known to the upstream price source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Upstream API id, e.g. "the-open-network"
    pub id: String,
    /// Trading symbol, e.g. "TON"
    pub symbol: String,
    /// Display name, e.g. "Toncoin"
    pub name: String,
}

impl Asset {
    pub fn new(id: &str, symbol: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
        }
    }
}

/// A directed trading pair with its lifecycle state. Pairs are always
/// registered in reciprocal twins; deactivation is per direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectedPair {
    pub id: String,
    pub from: Asset,
    pub to: Asset,
    pub active: bool,
    pub added_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl DirectedPair {
    /// Quote key for this pair, e.g. "TON/USDT".
    pub fn pair_key(&self) -> String {
        pair_key(&self.from.symbol, &self.to.symbol)
    }
}

/// Stable registry id for a directed pair, e.g. "ton-usdt".
pub fn pair_id(from_symbol: &str, to_symbol: &str) -> String {
    format!("{}-{}", from_symbol, to_symbol).to_lowercase()
}

/// Quote map key for a directed pair, e.g. "TON/USDT".
pub fn pair_key(from_symbol: &str, to_symbol: &str) -> String {
    format!("{}/{}", from_symbol, to_symbol)
}

/// Raw per-asset quote as returned by the upstream simple-price endpoint.
/// Either field may be absent for assets the upstream doesn't know.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawAssetQuote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usd_24h_change: Option<f64>,
}

/// A computed cross-rate quote for one directed pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairQuote {
    /// Cross price: from-asset USD price / to-asset USD price
    pub price: f64,
    /// Absolute 24h change, back-derived from `change_percentage24h`.
    /// An approximation, not an independently measured value.
    pub change24h: f64,
    /// Difference of the two sides' 24h USD percentage changes (not compounded)
    pub change_percentage24h: f64,
    pub from_symbol: String,
    pub to_symbol: String,
    pub last_updated: DateTime<Utc>,
}

/// The full set of currently known pair quotes. Immutable once produced;
/// each refresh cycle replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub pairs: HashMap<String, PairQuote>,
    pub last_updated: DateTime<Utc>,
    /// Raw upstream quotes this snapshot was synthesized from. Empty for
    /// snapshots reconstructed from history.
    #[serde(default)]
    pub raw_quotes: HashMap<String, RawAssetQuote>,
}

impl Snapshot {
    pub fn empty(last_updated: DateTime<Utc>) -> Self {
        Self {
            pairs: HashMap::new(),
            last_updated,
            raw_quotes: HashMap::new(),
        }
    }
}

/// A persisted history row, one per pair per successful refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub pair_key: String,
    pub from_symbol: String,
    pub to_symbol: String,
    pub price: f64,
    pub change24h: f64,
    pub change_percentage24h: f64,
    pub timestamp: DateTime<Utc>,
}

/// A history row before the store has assigned its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub pair_key: String,
    pub from_symbol: String,
    pub to_symbol: String,
    pub price: f64,
    pub change24h: f64,
    pub change_percentage24h: f64,
    pub timestamp: DateTime<Utc>,
}
