//! Known-good cache gateway with per-call timeouts and freshness checks
//!
//! The cache is a pure optimization, never a correctness dependency: every
//! timeout or transport failure degrades to "not found" on lookup and a
//! logged drop on write. Nothing here ever propagates an error into the
//! pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::CheckStatus;

/// A previously confirmed verdict held by the cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedVerdict {
    pub status: CheckStatus,
    pub sub_status: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// Cache transport failures; always absorbed by the gateway
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache transport error: {0}")]
    Transport(String),
}

/// Contract for the persistent key-value store behind the gateway
///
/// Implementations must tolerate being unavailable; the gateway treats any
/// error or timeout as a miss.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CachedVerdict>, CacheError>;
    async fn set(&self, key: &str, verdict: &CachedVerdict, ttl: Duration)
        -> Result<(), CacheError>;
}

/// Gateway wrapping a cache store with a sub-timeout and freshness window
pub struct CacheGateway {
    store: Arc<dyn CacheStore>,
    call_timeout: Duration,
    freshness: chrono::Duration,
}

impl CacheGateway {
    pub fn new(store: Arc<dyn CacheStore>, call_timeout: Duration, freshness_days: u32) -> Self {
        Self {
            store,
            call_timeout,
            freshness: chrono::Duration::days(i64::from(freshness_days)),
        }
    }

    /// Look up a fresh cached verdict for an address
    ///
    /// Returns `None` on miss, stale hit, store error, or timeout. Never
    /// blocks longer than the configured per-call timeout or the caller's
    /// remaining budget, whichever is smaller.
    pub async fn lookup(&self, address: &str, budget: Duration) -> Option<CachedVerdict> {
        let call_timeout = self.call_timeout.min(budget);
        let outcome = tokio::time::timeout(call_timeout, self.store.get(address)).await;
        match outcome {
            Ok(Ok(Some(verdict))) => {
                let age = Utc::now().signed_duration_since(verdict.checked_at);
                if age <= self.freshness {
                    debug!("Cache hit for {} ({}h old)", address, age.num_hours());
                    Some(verdict)
                } else {
                    debug!("Cache hit for {} is stale, ignoring", address);
                    None
                }
            }
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                warn!("Cache lookup failed for {}: {}", address, e);
                None
            }
            Err(_) => {
                warn!("Cache lookup timed out for {}", address);
                None
            }
        }
    }

    /// Best-effort write of a verdict within the caller's remaining budget;
    /// failures are logged and dropped
    pub async fn store(&self, address: &str, verdict: &CachedVerdict, budget: Duration) {
        let call_timeout = self.call_timeout.min(budget);
        let ttl = Duration::from_secs(self.freshness.num_seconds().max(0) as u64);
        let outcome =
            tokio::time::timeout(call_timeout, self.store.set(address, verdict, ttl)).await;
        match outcome {
            Ok(Ok(())) => debug!("Cached verdict for {}", address),
            Ok(Err(e)) => warn!("Cache write failed for {}: {}", address, e),
            Err(_) => warn!("Cache write timed out for {}", address),
        }
    }
}

/// In-memory cache store for tests and single-process deployments
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, (CachedVerdict, Instant)>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live entries (test helper)
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CachedVerdict>, CacheError> {
        let entries = self.entries.lock().await;
        Ok(entries.get(key).and_then(|(verdict, expires_at)| {
            if Instant::now() < *expires_at {
                Some(verdict.clone())
            } else {
                None
            }
        }))
    }

    async fn set(
        &self,
        key: &str,
        verdict: &CachedVerdict,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), (verdict.clone(), Instant::now() + ttl));
        Ok(())
    }
}
