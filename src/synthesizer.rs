// src/synthesizer.rs
//! Rate Synthesizer: combines raw per-asset USD quotes into directed pair
//! quotes. Pure function over already-validated inputs; any failure in here
//! would be a logic bug, so it cannot return an error.

use crate::models::{DirectedPair, PairQuote, RawAssetQuote, Snapshot};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Builds the snapshot for one refresh cycle. Pairs where either side is
/// missing from `raw_quotes` or reports a zero/non-finite USD price are
/// silently omitted; a missing 24h change counts as 0.0.
pub fn synthesize(
    active_pairs: &[DirectedPair],
    raw_quotes: &HashMap<String, RawAssetQuote>,
    now: DateTime<Utc>,
) -> Snapshot {
    let mut pairs = HashMap::new();

    for pair in active_pairs {
        let from_price = usable_price(raw_quotes.get(&pair.from.id));
        let to_price = usable_price(raw_quotes.get(&pair.to.id));
        let (from_price, to_price) = match (from_price, to_price) {
            (Some(f), Some(t)) => (f, t),
            _ => continue,
        };

        let from_change = change_or_zero(raw_quotes.get(&pair.from.id));
        let to_change = change_or_zero(raw_quotes.get(&pair.to.id));

        let price = from_price / to_price;
        let change_percentage = from_change - to_change;
        // Back-derive the absolute move from the percentage difference of two
        // independently-changing assets. An approximation; kept as-is.
        let price_yesterday = price / (1.0 + change_percentage / 100.0);
        let price_change = price - price_yesterday;

        pairs.insert(
            pair.pair_key(),
            PairQuote {
                price,
                change24h: price_change,
                change_percentage24h: change_percentage,
                from_symbol: pair.from.symbol.clone(),
                to_symbol: pair.to.symbol.clone(),
                last_updated: now,
            },
        );
    }

    Snapshot {
        pairs,
        last_updated: now,
        raw_quotes: raw_quotes.clone(),
    }
}

fn usable_price(quote: Option<&RawAssetQuote>) -> Option<f64> {
    quote
        .and_then(|q| q.usd)
        .filter(|p| *p != 0.0 && p.is_finite())
}

fn change_or_zero(quote: Option<&RawAssetQuote>) -> f64 {
    quote.and_then(|q| q.usd_24h_change).unwrap_or(0.0)
}
