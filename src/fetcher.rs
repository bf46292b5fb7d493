// src/fetcher.rs
//! Rate Fetcher: one batched call to the upstream price source for the USD
//! price and 24h change of a set of asset ids. The upstream is treated as
//! untrusted and unreliable; any transport, status or payload problem maps to
//! `UpstreamUnavailable` and the caller decides the fallback. No retry here —
//! retry policy would belong to the orchestrator, and none is configured.

use crate::error::{Result, TrackerError};
use crate::models::RawAssetQuote;
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::time::Duration;

#[async_trait]
pub trait RateFetcher: Send + Sync {
    /// Fetches raw USD quotes for the given asset ids in a single batched
    /// request. Assets the upstream doesn't know are simply absent from the
    /// returned map.
    async fn fetch(&self, asset_ids: &[String]) -> Result<HashMap<String, RawAssetQuote>>;
}

/// CoinGecko-style `/simple/price` client.
pub struct CoinGeckoFetcher {
    http: reqwest::Client,
    base_url: String,
}

impl CoinGeckoFetcher {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::ConfigError(format!("HTTP client build failed: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RateFetcher for CoinGeckoFetcher {
    async fn fetch(&self, asset_ids: &[String]) -> Result<HashMap<String, RawAssetQuote>> {
        let ids = asset_ids.join(",");
        let url = format!("{}/simple/price", self.base_url);
        debug!("Fetching upstream quotes for ids: {}", ids);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("ids", ids.as_str()),
                ("vs_currencies", "usd"),
                ("include_24hr_change", "true"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TrackerError::UpstreamUnavailable(format!(
                "price API returned status {}",
                response.status()
            )));
        }

        let quotes = response
            .json::<HashMap<String, RawAssetQuote>>()
            .await
            .map_err(|e| TrackerError::UpstreamUnavailable(format!("malformed payload: {}", e)))?;
        debug!("Upstream returned quotes for {} assets", quotes.len());
        Ok(quotes)
    }
}
