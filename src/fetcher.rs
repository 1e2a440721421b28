//! Cache-aside fetcher
//!
//! `fetch` reads the cache first and only executes the query on a miss,
//! writing the encoded result back with the request's shared expiry.
//! Execution failures are retried a bounded number of times with a fixed
//! delay; when the budget is spent the caller gets `Unavailable` for that
//! query instead of an error that would sink its siblings.
//!
//! The cache is best-effort: a failed or undecodable read counts as a miss,
//! a failed write is logged, and a fetcher built without a session goes
//! straight to the store.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{cache_key, CacheSession};
use crate::error::{StoreError, Unavailable};
use crate::planner::SqlQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total executions per query, first attempt included
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(100),
        }
    }
}

pub struct CacheAsideFetcher {
    session: Option<Box<dyn CacheSession>>,
    expires_at: i64,
    retry: RetryPolicy,
}

impl CacheAsideFetcher {
    pub fn new(
        session: Option<Box<dyn CacheSession>>,
        expires_at: i64,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            session,
            expires_at,
            retry,
        }
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Get-or-compute-and-store for one query.
    pub async fn fetch<T, F, Fut>(&self, query: &SqlQuery, execute: F) -> Result<T, Unavailable>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let key = cache_key(query);

        if let Some(hit) = self.lookup::<T>(&key).await {
            tracing::debug!(key = %key, "cache hit");
            return Ok(hit);
        }
        tracing::debug!(key = %key, "cache miss");

        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match execute().await {
                Ok(value) => {
                    self.write_back(&key, &value).await;
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        query = %query.text,
                        "query failed: {e}"
                    );
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.retry.delay).await;
                    }
                }
            }
        }

        tracing::warn!(query = %query.text, "query unavailable after {attempts} attempt(s)");
        Err(Unavailable {
            query: query.text.clone(),
            attempts,
            last_error,
        })
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let session = self.session.as_ref()?;
        let raw = match session.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(key, "cache read failed, treating as miss: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, "undecodable cache entry, treating as miss: {e}");
                None
            }
        }
    }

    async fn write_back<T: Serialize>(&self, key: &str, value: &T) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(key, "failed to encode result for cache: {e}");
                return;
            }
        };
        if let Err(e) = session.set_until(key, &encoded, self.expires_at).await {
            tracing::warn!(key, "cache write failed: {e}");
        }
    }
}
