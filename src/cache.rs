//! Per-metric staleness cache
//!
//! Every [`MetricKey`] owns one entry with its own refresh timestamp. A
//! request asks the cache to make the keys it needs fresh; only stale keys
//! are pulled from the chain, and concurrent callers of the same stale key
//! wait for the single in-flight refresh instead of issuing their own.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use alloy_primitives::U256;
use chrono::Utc;
use futures::future::join_all;
use parking_lot::RwLock;
use tokio::{sync::Mutex, time::timeout};
use tracing::{debug, info, warn};

use crate::{cache_keys::MetricKey, error::Error, provider::ChainReader};

/// Source of the current unix time, in seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// A cached on-chain value and the time it was last refreshed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub value: U256,
    /// Unix seconds; never decreases for a given key
    pub last_refreshed_at: i64,
    /// Whether any refresh has ever succeeded
    pub fetched: bool,
    /// Set by [`MetricCache::force_invalidate_all`], cleared by a refresh
    pub invalidated: bool,
}

/// Values of every key, read in one pass over the cache
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricValues([U256; MetricKey::COUNT]);

impl MetricValues {
    pub fn get(&self, key: MetricKey) -> U256 {
        self.0[key.index()]
    }

    pub fn set(&mut self, key: MetricKey, value: U256) {
        self.0[key.index()] = value;
    }

    pub fn with(mut self, key: MetricKey, value: U256) -> Self {
        self.set(key, value);
        self
    }
}

#[derive(Default)]
struct Slot {
    entry: RwLock<CacheEntry>,
    /// Held for the whole upstream fetch of this key
    refresh: Mutex<()>,
    /// Completed refresh attempts, successful or not
    attempts: AtomicU64,
    last_attempt: RwLock<Attempt>,
}

/// Outcome of the most recent refresh attempt of a slot
#[derive(Debug, Default, Clone)]
struct Attempt {
    /// Invalidation generation the attempt started under
    generation: u64,
    failure: Option<String>,
}

pub struct MetricCache {
    slots: [Slot; MetricKey::COUNT],
    /// Keys covered by `refresh_all`
    keys: Vec<MetricKey>,
    /// Bumped by every `force_invalidate_all`
    invalidations: AtomicU64,
    reader: Arc<dyn ChainReader>,
    clock: Arc<dyn Clock>,
    refresh_delay: i64,
    timeout: Duration,
}

impl MetricCache {
    /// Create a cache with every value zeroed and every timestamp at epoch,
    /// so the first request for any key goes to the chain.
    pub fn new(
        reader: Arc<dyn ChainReader>,
        clock: Arc<dyn Clock>,
        refresh_delay: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            slots: std::array::from_fn(|_| Slot::default()),
            keys: MetricKey::ALL.to_vec(),
            invalidations: AtomicU64::new(0),
            reader,
            clock,
            refresh_delay: i64::try_from(refresh_delay.as_secs())
                .unwrap_or(i64::MAX),
            timeout,
        }
    }

    /// Restrict `refresh_all` to `keys`.
    pub fn with_keys(mut self, keys: Vec<MetricKey>) -> Self {
        self.keys = keys;
        self
    }

    pub fn keys(&self) -> &[MetricKey] {
        &self.keys
    }

    fn slot(&self, key: MetricKey) -> &Slot {
        &self.slots[key.index()]
    }

    pub fn entry(&self, key: MetricKey) -> CacheEntry {
        *self.slot(key).entry.read()
    }

    /// Current cached value; does not trigger a refresh.
    pub fn value_of(&self, key: MetricKey) -> U256 {
        self.slot(key).entry.read().value
    }

    pub fn snapshot(&self) -> MetricValues {
        let mut values = MetricValues::default();
        for key in MetricKey::ALL {
            values.set(key, self.value_of(key));
        }
        values
    }

    pub fn is_stale(&self, key: MetricKey) -> bool {
        let entry = self.entry(key);
        entry.invalidated
            || self.clock.now()
                >= entry.last_refreshed_at.saturating_add(self.refresh_delay)
    }

    /// Refresh `key` from the chain if it is stale.
    ///
    /// Callers that queue behind an in-flight refresh of the same key share
    /// its outcome instead of fetching again, unless the cache was
    /// invalidated after that refresh started. On failure the entry keeps its
    /// previous value and timestamp, so the next call tries again right away.
    pub async fn ensure_fresh(&self, key: MetricKey) -> Result<(), Error> {
        if !self.is_stale(key) {
            debug!("Cache hit: {}", key);
            return Ok(());
        }

        let slot = self.slot(key);
        let seen = slot.attempts.load(Ordering::Acquire);
        let _refresh = slot.refresh.lock().await;
        let generation = self.invalidations.load(Ordering::Acquire);

        if slot.attempts.load(Ordering::Acquire) != seen {
            let last = slot.last_attempt.read().clone();
            if last.generation == generation {
                debug!("Cache {} settled by a concurrent refresh", key);
                return match last.failure {
                    None => Ok(()),
                    Some(reason) => Err(Error::UpstreamFetch { key, reason }),
                };
            }
        }

        // refreshed by the caller that held the lock before us
        if !self.is_stale(key) {
            debug!("Cache {} refreshed by a concurrent request", key);
            return Ok(());
        }

        let result = self.fetch_with_retry(key).await;

        *slot.last_attempt.write() = Attempt {
            generation,
            failure: result.as_ref().err().cloned(),
        };
        slot.attempts.fetch_add(1, Ordering::Release);

        let value =
            result.map_err(|reason| Error::UpstreamFetch { key, reason })?;
        let now = self.clock.now();

        {
            let mut entry = slot.entry.write();
            entry.value = value;
            entry.last_refreshed_at = entry.last_refreshed_at.max(now);
            entry.fetched = true;
            // an invalidation that raced this fetch still applies
            if self.invalidations.load(Ordering::Acquire) == generation {
                entry.invalidated = false;
            }
        }

        info!("Refreshed cache {}: {}", key, value);
        Ok(())
    }

    /// Refresh every stale tracked key concurrently. All keys are attempted
    /// even if some fail; the first failure is returned.
    pub async fn refresh_all(&self) -> Result<(), Error> {
        let results =
            join_all(self.keys.iter().map(|key| self.ensure_fresh(*key)))
                .await;

        let mut first_error = None;
        for (key, result) in self.keys.iter().zip(results) {
            if let Err(e) = result {
                warn!("Failed to refresh cache {}: {}", key, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Mark every entry stale. Each following `ensure_fresh` refetches its
    /// key once; cached values stay available as a fallback.
    pub fn force_invalidate_all(&self) {
        self.invalidations.fetch_add(1, Ordering::AcqRel);
        for slot in &self.slots {
            slot.entry.write().invalidated = true;
        }
        info!("Invalidated all {} cache entries", MetricKey::COUNT);
    }

    /// One attempt plus one retry; the error is the reason of the last
    /// failed attempt.
    async fn fetch_with_retry(&self, key: MetricKey) -> Result<U256, String> {
        match self.fetch_once(key).await {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!("Fetch of {} failed, retrying once: {}", key, e);
                self.fetch_once(key).await.map_err(|e| e.to_string())
            },
        }
    }

    async fn fetch_once(&self, key: MetricKey) -> Result<U256, Error> {
        timeout(self.timeout, self.reader.fetch(key)).await?
    }
}

impl fmt::Debug for MetricCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricCache")
            .field("keys", &self.keys)
            .field("refresh_delay", &self.refresh_delay)
            .field("timeout", &self.timeout)
            .finish()
    }
}
