// src/registry.rs
//! Pair Registry: owns the lifecycle of tracked directed trading pairs.
//! Pairs are always added in reciprocal twins and listed in insertion order.
//! No other component mutates pair state.

use crate::error::{Result, TrackerError};
use crate::models::{pair_id, Asset, DirectedPair};
use chrono::Utc;
use log::info;

#[derive(Debug, Default)]
pub struct PairRegistry {
    pairs: Vec<DirectedPair>,
}

impl PairRegistry {
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// All pairs, active and inactive, in insertion order.
    pub fn list_pairs(&self) -> Vec<DirectedPair> {
        self.pairs.clone()
    }

    /// Active pairs only, in insertion order.
    pub fn active_pairs(&self) -> Vec<DirectedPair> {
        self.pairs.iter().filter(|p| p.active).cloned().collect()
    }

    pub fn find(&self, id: &str) -> Option<&DirectedPair> {
        self.pairs.iter().find(|p| p.id == id)
    }

    /// Registers the forward pair and its mirror. For each direction: absent
    /// pairs are created active, inactive pairs are reactivated, active pairs
    /// are left untouched. Returns only the pairs that were actually created
    /// or reactivated.
    pub fn add_pair(&mut self, from: Asset, to: Asset) -> Vec<DirectedPair> {
        let mut changed = Vec::new();
        if let Some(pair) = self.upsert(from.clone(), to.clone()) {
            changed.push(pair);
        }
        if let Some(pair) = self.upsert(to, from) {
            changed.push(pair);
        }
        changed
    }

    fn upsert(&mut self, from: Asset, to: Asset) -> Option<DirectedPair> {
        let id = pair_id(&from.symbol, &to.symbol);
        if let Some(idx) = self.pairs.iter().position(|p| p.id == id) {
            let existing = &mut self.pairs[idx];
            if existing.active {
                return None;
            }
            existing.active = true;
            existing.deactivated_at = None;
            info!("Reactivated trading pair {}", existing.id);
            return Some(existing.clone());
        }

        let pair = DirectedPair {
            id: id.clone(),
            from,
            to,
            active: true,
            added_at: Utc::now(),
            deactivated_at: None,
        };
        info!("Added trading pair {}", id);
        self.pairs.push(pair.clone());
        Some(pair)
    }

    /// Deactivates an active pair. Missing ids and already-inactive pairs
    /// both report `PairNotFound`; nothing is mutated in those cases.
    pub fn deactivate_pair(&mut self, id: &str) -> Result<DirectedPair> {
        match self.pairs.iter_mut().find(|p| p.id == id && p.active) {
            Some(pair) => {
                pair.active = false;
                pair.deactivated_at = Some(Utc::now());
                info!("Deactivated trading pair {}", id);
                Ok(pair.clone())
            }
            None => Err(TrackerError::PairNotFound(format!(
                "trading pair '{}' not found or already deactivated",
                id
            ))),
        }
    }

    /// Seeds the canonical default pair (TON/USDT and its mirror) when the
    /// registry is empty at startup, so the first refresh has work to do.
    pub fn seed_default(&mut self) {
        if !self.pairs.is_empty() {
            return;
        }
        let ton = Asset::new("the-open-network", "TON", "Toncoin");
        let usdt = Asset::new("tether", "USDT", "Tether");
        self.add_pair(ton, usdt);
        info!("Seeded default TON/USDT pair");
    }
}
