// src/cache.rs
//! Price Cache: short-TTL store for the latest full snapshot under a single
//! well-known key. The Redis implementation uses a `ConnectionManager` for
//! automatic reconnection; the in-memory one backs tests and redis-less runs.

use crate::error::{Result, TrackerError};
use crate::models::Snapshot;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use redis::{aio::ConnectionManager, AsyncCommands};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const SNAPSHOT_KEY: &str = "crypto:pairs:prices";

#[async_trait]
pub trait SnapshotCache: Send + Sync {
    async fn get(&self) -> Result<Option<Snapshot>>;
    async fn set(&self, snapshot: &Snapshot, ttl_secs: u64) -> Result<()>;
    async fn invalidate(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct RedisSnapshotCache {
    conn_manager: ConnectionManager,
    redis_url: String, // Stored for debug output only
}

// Manual Debug impl; ConnectionManager is not Debug
impl fmt::Debug for RedisSnapshotCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSnapshotCache")
            .field("redis_url", &self.redis_url)
            .field("conn_manager", &"<ConnectionManager instance>")
            .finish()
    }
}

impl RedisSnapshotCache {
    pub async fn new(redis_url: &str) -> Result<Self> {
        info!("Initializing Redis connection manager for URL: {}", redis_url);
        let client = redis::Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to create Redis ConnectionManager: {}", e);
            TrackerError::CacheUnavailable(format!("Redis ConnectionManager: {}", e))
        })?;
        info!("Redis ConnectionManager initialized successfully.");
        Ok(Self {
            conn_manager,
            redis_url: redis_url.to_string(),
        })
    }
}

#[async_trait]
impl SnapshotCache for RedisSnapshotCache {
    async fn get(&self) -> Result<Option<Snapshot>> {
        let mut conn = self.conn_manager.clone();
        match conn.get::<_, Option<String>>(SNAPSHOT_KEY).await {
            Ok(Some(value_str)) => {
                debug!("Cache HIT for key: {}", SNAPSHOT_KEY);
                match serde_json::from_str::<Snapshot>(&value_str) {
                    Ok(snapshot) => Ok(Some(snapshot)),
                    Err(e) => {
                        warn!("Failed to deserialize cached snapshot: {}", e);
                        Err(TrackerError::CacheUnavailable(format!(
                            "cache deserialization error: {}",
                            e
                        )))
                    }
                }
            }
            Ok(None) => {
                debug!("Cache MISS for key: {}", SNAPSHOT_KEY);
                Ok(None)
            }
            Err(e) => {
                error!("Redis GET error for key {}: {}", SNAPSHOT_KEY, e);
                Err(TrackerError::CacheUnavailable(format!("Redis GET error: {}", e)))
            }
        }
    }

    async fn set(&self, snapshot: &Snapshot, ttl_secs: u64) -> Result<()> {
        let value_str = serde_json::to_string(snapshot)?;
        let mut conn = self.conn_manager.clone();
        match conn
            .set_ex::<_, _, ()>(SNAPSHOT_KEY, value_str, ttl_secs)
            .await
        {
            Ok(_) => {
                debug!(
                    "Cache SETEX success for key: {} with TTL: {}s",
                    SNAPSHOT_KEY, ttl_secs
                );
                Ok(())
            }
            Err(e) => {
                warn!("Failed to SETEX key '{}' in Redis: {}", SNAPSHOT_KEY, e);
                Err(TrackerError::CacheUnavailable(format!("Redis SETEX error: {}", e)))
            }
        }
    }

    async fn invalidate(&self) -> Result<()> {
        debug!("Attempting to DEL cache for key: {}", SNAPSHOT_KEY);
        let mut conn = self.conn_manager.clone();
        conn.del::<_, i32>(SNAPSHOT_KEY)
            .await
            .map_err(|e| {
                error!("Redis DEL error for key {}: {}", SNAPSHOT_KEY, e);
                TrackerError::CacheUnavailable(format!("Redis DEL error: {}", e))
            })
            .map(|_| ())
    }
}

/// Process-local cache slot with TTL expiry.
#[derive(Debug, Default)]
pub struct InMemorySnapshotCache {
    slot: Mutex<Option<(Snapshot, Instant)>>,
}

impl InMemorySnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotCache for InMemorySnapshotCache {
    async fn get(&self) -> Result<Option<Snapshot>> {
        let mut slot = self.slot.lock().await;
        match slot.as_ref() {
            Some((snapshot, expires_at)) if Instant::now() < *expires_at => {
                Ok(Some(snapshot.clone()))
            }
            Some(_) => {
                *slot = None; // expired
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, snapshot: &Snapshot, ttl_secs: u64) -> Result<()> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        *self.slot.lock().await = Some((snapshot.clone(), expires_at));
        Ok(())
    }

    async fn invalidate(&self) -> Result<()> {
        *self.slot.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn in_memory_cache_set_get_invalidate() {
        let cache = InMemorySnapshotCache::new();
        assert_eq!(cache.get().await.unwrap(), None);

        let snapshot = Snapshot::empty(Utc::now());
        cache.set(&snapshot, 60).await.unwrap();
        assert_eq!(cache.get().await.unwrap(), Some(snapshot.clone()));

        cache.invalidate().await.unwrap();
        assert_eq!(cache.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn in_memory_cache_expires_entries() {
        let cache = InMemorySnapshotCache::new();
        let snapshot = Snapshot::empty(Utc::now());
        cache.set(&snapshot, 0).await.unwrap();
        assert_eq!(cache.get().await.unwrap(), None);
    }
}
