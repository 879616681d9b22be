//! Expiring Cache Module
//!
//! The public cache facade: input validation, default TTL policy, lazy expiry
//! on read, and the Open -> Closing -> Closed lifecycle. Background eviction
//! is delegated to the sweeper in `crate::tasks`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::info;

use crate::backend::{CacheBackend, GetManyResult};
use crate::cache::{CacheEntry, CacheStats, CacheStore, StatsCounters};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_sweeper, SweeperHandle};

const STATE_OPEN: u8 = 0;
const STATE_CLOSING: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// Lifecycle state of a cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Open,
    Closing,
    Closed,
}

// == Shared Internals ==
/// State shared between the facade and its sweeper.
#[derive(Debug)]
pub(crate) struct CacheInner<V> {
    store: CacheStore<V>,
    stats: StatsCounters,
    state: AtomicU8,
}

impl<V> CacheInner<V> {
    pub(crate) fn new(capacity_hint_bytes: u64) -> Self {
        Self {
            store: CacheStore::new(capacity_hint_bytes),
            stats: StatsCounters::new(),
            state: AtomicU8::new(STATE_OPEN),
        }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &CacheStore<V> {
        &self.store
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_OPEN
    }

    /// Removes every entry that is expired as of the start of the pass.
    ///
    /// Stops as soon as the cache leaves the Open state so nothing touches
    /// the store once it is being torn down.
    pub(crate) fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.store.range(|key, entry| {
            if !self.is_open() {
                return false;
            }
            if entry.is_expired_at(now) && self.store.remove_if_same(key, entry) {
                removed += 1;
            }
            true
        });

        self.stats.record_expired(removed as u64);
        removed
    }
}

// == Expiring Cache ==
/// In-process key-value cache with per-entry TTL.
///
/// Values are stored as-is (no serialization) and cloned out on read; wrap
/// large values in `Arc` to make reads cheap.
#[derive(Debug)]
pub struct ExpiringCache<V> {
    inner: Arc<CacheInner<V>>,
    sweeper: Mutex<Option<SweeperHandle>>,
    config: CacheConfig,
}

impl<V> ExpiringCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache and, if cleaning is enabled, starts its sweeper.
    ///
    /// The sweeper is a Tokio task, so a cache with cleaning enabled must be
    /// built from inside a Tokio runtime.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let inner = Arc::new(CacheInner::new(config.capacity_hint_bytes));

        let sweeper = if config.cleaning_enabled {
            Some(spawn_sweeper(Arc::downgrade(&inner), config.cleaning_interval)?)
        } else {
            None
        };

        info!(
            capacity_hint_bytes = config.capacity_hint_bytes,
            cleaning_enabled = config.cleaning_enabled,
            cleaning_interval_ms = config.cleaning_interval.as_millis() as u64,
            "Expiring cache ready"
        );

        Ok(Self {
            inner,
            sweeper: Mutex::new(sweeper),
            config,
        })
    }

    /// The configuration this cache was built from.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn state(&self) -> CacheState {
        match self.inner.state.load(Ordering::Acquire) {
            STATE_OPEN => CacheState::Open,
            STATE_CLOSING => CacheState::Closing,
            _ => CacheState::Closed,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.inner.is_open() {
            Ok(())
        } else {
            Err(CacheError::Closed)
        }
    }

    fn effective_ttl(&self, ttl: Duration) -> Duration {
        if ttl.is_zero() {
            self.config.default_ttl
        } else {
            ttl
        }
    }

    /// Looks up a live value and records the hit or miss.
    fn lookup(&self, key: &str, now: Instant) -> Option<V> {
        let live = self
            .inner
            .store
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value.clone());

        match live {
            Some(_) => self.inner.stats.record_hit(),
            None => self.inner.stats.record_miss(),
        }
        live
    }

    // == Set ==
    /// Stores `value` under `key`; a zero `ttl` means the default TTL.
    pub fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        self.ensure_open()?;
        validate_key(key)?;

        let entry = CacheEntry::new(value, self.effective_ttl(ttl));
        self.inner.store.put(key, entry)
    }

    // == Get ==
    /// Returns the live value for `key`, or `None` if absent or expired.
    pub fn get(&self, key: &str) -> Result<Option<V>> {
        self.ensure_open()?;
        validate_key(key)?;

        Ok(self.lookup(key, Instant::now()))
    }

    // == Get Many ==
    /// Looks up every key, partitioning them into found and not found.
    pub fn get_many(&self, keys: &[&str]) -> Result<GetManyResult<V>> {
        self.ensure_open()?;
        if keys.is_empty() {
            return Err(CacheError::InvalidArgument(
                "keys must not be empty".to_string(),
            ));
        }

        let now = Instant::now();
        let mut found = HashMap::with_capacity(keys.len());
        let mut not_found = Vec::new();

        for key in keys {
            if found.contains_key(*key) || not_found.iter().any(|k| k == key) {
                continue;
            }
            match self.lookup(key, now) {
                Some(value) => {
                    found.insert(key.to_string(), value);
                }
                None => not_found.push(key.to_string()),
            }
        }

        Ok(GetManyResult { found, not_found })
    }

    // == Update ==
    /// Replaces value and expiry of a live entry.
    pub fn update(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        self.ensure_open()?;
        validate_key(key)?;

        let entry = CacheEntry::new(value, self.effective_ttl(ttl));
        let now = Instant::now();
        if self
            .inner
            .store
            .replace_if(key, entry, |current| !current.is_expired_at(now))?
        {
            Ok(())
        } else {
            Err(CacheError::NotFound(key.to_string()))
        }
    }

    // == Delete ==
    /// Removes a live entry; fails with `NotFound` if there is none.
    ///
    /// An expired entry still physically present is reclaimed here but the
    /// call reports `NotFound`, matching what `get` would have said.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.ensure_open()?;
        validate_key(key)?;

        match self.inner.store.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.inner.store.remove(key);
                Ok(())
            }
            Some(expired) => {
                if self.inner.store.remove_if_same(key, &expired) {
                    self.inner.stats.record_expired(1);
                }
                Err(CacheError::NotFound(key.to_string()))
            }
            None => Err(CacheError::NotFound(key.to_string())),
        }
    }

    // == Range ==
    /// Visits every live entry until `visit` returns false.
    pub fn range<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&str, &V) -> bool,
    {
        self.ensure_open()?;

        let now = Instant::now();
        self.inner.store.range(|key, entry| {
            if entry.is_expired_at(now) {
                return true;
            }
            visit(key, &entry.value)
        });
        Ok(())
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn number_of_records(&self) -> usize {
        self.inner.store.len()
    }

    /// Best-effort size of the stored data in bytes.
    pub fn capacity(&self) -> Result<i64> {
        self.ensure_open()?;
        Ok(self.inner.store.approx_size_bytes())
    }

    pub fn stats(&self) -> Result<CacheStats> {
        self.ensure_open()?;
        Ok(self.inner.stats.snapshot(
            self.inner.store.len(),
            self.inner.store.approx_size_bytes(),
        ))
    }

    // == Close ==
    /// Stops the sweeper and tears down the store.
    ///
    /// Writers racing with close either land before the store is sealed (and
    /// are dropped with it) or fail with `Closed`.
    ///
    /// Does not wait for a sweep already in progress; that sweep notices the
    /// state change and stops before its next store access.
    pub fn close(&self) -> Result<()> {
        self.inner
            .state
            .compare_exchange(STATE_OPEN, STATE_CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CacheError::Closed)?;

        if let Some(sweeper) = self.sweeper.lock().as_ref() {
            sweeper.stop();
        }

        self.inner.store.seal();
        self.inner.state.store(STATE_CLOSED, Ordering::Release);
        info!("Expiring cache closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        !self.inner.is_open()
    }

    /// Whether a background sweeper task is still alive.
    pub fn sweeper_running(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|sweeper| !sweeper.is_finished())
    }
}

impl<V> Drop for ExpiringCache<V> {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get_mut().as_ref() {
            sweeper.stop();
        }
    }
}

impl<V> CacheBackend<V> for ExpiringCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        ExpiringCache::set(self, key, value, ttl)
    }

    fn get(&self, key: &str) -> Result<Option<V>> {
        ExpiringCache::get(self, key)
    }

    fn get_many(&self, keys: &[&str]) -> Result<GetManyResult<V>> {
        ExpiringCache::get_many(self, keys)
    }

    fn update(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        ExpiringCache::update(self, key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<()> {
        ExpiringCache::delete(self, key)
    }

    fn range(&self, visit: &mut dyn FnMut(&str, &V) -> bool) -> Result<()> {
        ExpiringCache::range(self, visit)
    }

    fn number_of_records(&self) -> usize {
        ExpiringCache::number_of_records(self)
    }

    fn capacity(&self) -> Result<i64> {
        ExpiringCache::capacity(self)
    }

    fn stats(&self) -> Result<CacheStats> {
        ExpiringCache::stats(self)
    }

    fn close(&self) -> Result<()> {
        ExpiringCache::close(self)
    }

    fn is_closed(&self) -> bool {
        ExpiringCache::is_closed(self)
    }
}

/// Rejects the empty key shared by every keyed operation.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        Err(CacheError::InvalidArgument(
            "key must not be empty".to_string(),
        ))
    } else {
        Ok(())
    }
}
