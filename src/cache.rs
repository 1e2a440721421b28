//! Query result cache port
//!
//! Entries are keyed by the normalized query text (plus a digest of the bound
//! parameters) and expire at a timestamp shared by every write of a request.
//! Storage, eviction and TTL enforcement belong to the cache store.
//!
//! A `CacheSession` is opened per request and released when dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::error::CacheError;
use crate::planner::SqlQuery;

pub const CACHE_KEY_PREFIX: &str = "sql:";

/// Cache key for a query: prefix + normalized text, plus the hex SHA-256 of
/// the JSON-encoded parameters when the query has any.
pub fn cache_key(query: &SqlQuery) -> String {
    if query.params.is_empty() {
        return format!("{CACHE_KEY_PREFIX}{}", query.text);
    }
    let encoded = serde_json::to_vec(&query.params).unwrap_or_default();
    let digest = Sha256::digest(&encoded);
    format!("{CACHE_KEY_PREFIX}{}#{}", query.text, hex::encode(digest))
}

/// End of the cache period containing `now`, as Unix seconds. Periods are
/// aligned to the epoch, so every request in one period shares an expiry.
pub fn period_end(now: DateTime<Utc>, period_secs: u64) -> i64 {
    let period = i64::try_from(period_secs.max(1)).unwrap_or(i64::MAX);
    (now.timestamp().div_euclid(period) + 1) * period
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open a session for one request.
    async fn connect(&self) -> Result<Box<dyn CacheSession>, CacheError>;
}

#[async_trait]
pub trait CacheSession: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` under `key` until the Unix timestamp `expires_at`.
    async fn set_until(&self, key: &str, value: &str, expires_at: i64) -> Result<(), CacheError>;
}

// ============================================================================
// In-process cache
// ============================================================================

type Entries = Arc<RwLock<HashMap<String, (String, i64)>>>;

/// Default entry cap of the in-process cache.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Process-local cache, used when no shared cache is configured.
///
/// Bounded: expired entries are purged whenever a new key is written, and
/// once `max_entries` live entries are held the one expiring soonest is
/// evicted to make room.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Entries,
    max_entries: usize,
    open_sessions: Arc<AtomicUsize>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: Entries::default(),
            max_entries: max_entries.max(1),
            open_sessions: Arc::default(),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Number of sessions currently held open.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Number of stored entries, expired ones not yet purged included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn connect(&self) -> Result<Box<dyn CacheSession>, CacheError> {
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            entries: Arc::clone(&self.entries),
            max_entries: self.max_entries,
            open_sessions: Arc::clone(&self.open_sessions),
        }))
    }
}

struct MemorySession {
    entries: Entries,
    max_entries: usize,
    open_sessions: Arc<AtomicUsize>,
}

#[async_trait]
impl CacheSession for MemorySession {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Utc::now().timestamp();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(value, _)| value.clone()))
    }

    async fn set_until(&self, key: &str, value: &str, expires_at: i64) -> Result<(), CacheError> {
        let now = Utc::now().timestamp();
        let mut entries = self.entries.write().await;

        if !entries.contains_key(key) {
            let before = entries.len();
            entries.retain(|_, (_, expires)| *expires > now);
            let purged = before - entries.len();

            let mut evicted = 0;
            while entries.len() >= self.max_entries {
                let soonest = entries
                    .iter()
                    .min_by_key(|(_, (_, expires))| *expires)
                    .map(|(k, _)| k.clone());
                let Some(old_key) = soonest else {
                    break;
                };
                entries.remove(&old_key);
                evicted += 1;
            }
            if purged + evicted > 0 {
                tracing::debug!(purged, evicted, held = entries.len(), "memory cache trimmed");
            }
        }

        entries.insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Redis
// ============================================================================

#[cfg(feature = "database")]
pub use redis_store::RedisCache;

#[cfg(feature = "database")]
mod redis_store {
    use super::*;
    use redis::aio::MultiplexedConnection;

    /// Shared Redis cache. Each request opens its own multiplexed connection.
    #[derive(Clone)]
    pub struct RedisCache {
        client: redis::Client,
    }

    impl RedisCache {
        pub fn open(url: &str) -> Result<Self, CacheError> {
            Ok(Self {
                client: redis::Client::open(url)?,
            })
        }
    }

    #[async_trait]
    impl CacheStore for RedisCache {
        async fn connect(&self) -> Result<Box<dyn CacheSession>, CacheError> {
            let conn = self.client.get_multiplexed_async_connection().await?;
            Ok(Box::new(RedisSession { conn }))
        }
    }

    struct RedisSession {
        conn: MultiplexedConnection,
    }

    #[async_trait]
    impl CacheSession for RedisSession {
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            let mut conn = self.conn.clone();
            let raw: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
            Ok(raw)
        }

        async fn set_until(
            &self,
            key: &str,
            value: &str,
            expires_at: i64,
        ) -> Result<(), CacheError> {
            let mut conn = self.conn.clone();
            let _: () = redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("EXAT")
                .arg(expires_at)
                .query_async(&mut conn)
                .await?;
            Ok(())
        }
    }
}
