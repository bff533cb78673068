//! Read-through TTL cache for the public listings.
//!
//! Entries are replaced wholesale and never invalidated by admin writes, so a
//! listing may lag behind the catalog by at most one TTL.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::common::constants::DEFAULT_CACHE_TTL_MINUTES;
use crate::common::error::Result;
use crate::observability::metrics;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: DateTime<Utc>,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.timestamp < self.ttl
    }
}

pub struct ListCache<T> {
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
    clock: Arc<dyn Clock>,
}

impl<T: Clone + Send + Sync> ListCache<T> {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Fresh data for `key`, evicting the entry if it has expired.
    pub async fn get(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_fresh(now) => return Some(entry.data.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().await;
        // another writer may have refreshed it between the two locks
        if let Some(entry) = entries.get(key) {
            if entry.is_fresh(now) {
                return Some(entry.data.clone());
            }
            debug!(key, "Evicting expired cache entry");
            entries.remove(key);
        }
        None
    }

    pub async fn set(&self, key: &str, data: T, ttl_minutes: i64) {
        let ttl = match Duration::try_minutes(ttl_minutes) {
            Some(ttl) if ttl_minutes > 0 => ttl,
            _ => {
                warn!(key, ttl_minutes, "Unusable cache TTL, using the default");
                Duration::minutes(DEFAULT_CACHE_TTL_MINUTES)
            }
        };
        let entry = CacheEntry {
            data,
            timestamp: self.clock.now(),
            ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
    }

    /// Cached data, or the fetcher's result stored under `key`. A failed fetch
    /// leaves the key unset and returns the error.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, ttl_minutes: i64, fetch: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(data) = self.get(key).await {
            metrics::cache::hit(key);
            return Ok(data);
        }
        metrics::cache::miss(key);

        match fetch().await {
            Ok(data) => {
                self.set(key, data.clone(), ttl_minutes).await;
                Ok(data)
            }
            Err(e) => {
                warn!(key, "Cache fetch failed: {}", e);
                metrics::cache::fetch_error(key);
                Err(e)
            }
        }
    }
}

impl<T: Clone + Send + Sync> Default for ListCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
