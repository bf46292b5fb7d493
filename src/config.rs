// src/config.rs
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub coingecko_api_url: String,
    pub redis_url: Option<String>,
    pub cache_ttl_secs: u64,
    pub refresh_interval_secs: u64,
    pub fallback_window_minutes: i64,
    pub fetch_timeout_secs: u64,
    pub history_default_days: i64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok(); // Load .env file if present, ignore errors

        Config {
            coingecko_api_url: env::var("COINGECKO_API_URL")
                .unwrap_or_else(|_| "https://api.coingecko.com/api/v3".to_string()),
            redis_url: env::var("REDIS_URL").ok(),
            cache_ttl_secs: env::var("CACHE_TTL_SECS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse()
                .unwrap_or(1800),
            refresh_interval_secs: env::var("REFRESH_INTERVAL_SECS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse()
                .unwrap_or(1800),
            fallback_window_minutes: env::var("FALLBACK_WINDOW_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            fetch_timeout_secs: env::var("FETCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            history_default_days: env::var("HISTORY_DEFAULT_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .unwrap_or(7),
        }
    }

    pub fn validate_and_log(&self) {
        log::info!("Application Configuration Loaded: {:?}", self);
        if self.coingecko_api_url.is_empty() {
            log::error!("COINGECKO_API_URL cannot be empty.");
        }
        if self.fetch_timeout_secs >= self.refresh_interval_secs {
            log::warn!(
                "FETCH_TIMEOUT_SECS ({}) is not short relative to REFRESH_INTERVAL_SECS ({}); \
                 overlapping cache misses may pile up",
                self.fetch_timeout_secs,
                self.refresh_interval_secs
            );
        }
    }
}
