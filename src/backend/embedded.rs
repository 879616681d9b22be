//! Embedded cache backend built on moka.
//!
//! moka tracks expiry itself through a per-entry [`Expiry`] policy, so this
//! adapter has no sweeper of its own; expired entries are dropped during
//! moka's housekeeping, which `number_of_records` and `capacity` trigger.

use std::collections::HashMap;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::notification::RemovalCause;
use moka::ops::compute::{CompResult, Op};
use moka::sync::Cache;
use moka::Expiry;
use tracing::info;

use crate::backend::{CacheBackend, GetManyResult};
use crate::cache::{validate_key, CacheStats, StatsCounters};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// Value plus the TTL it was written with.
#[derive(Debug, Clone)]
struct TimedValue<V> {
    value: V,
    ttl: Duration,
}

/// Expires each entry `ttl` after its last write; reads do not extend it.
struct PerEntryTtl;

impl<V> Expiry<String, TimedValue<V>> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &TimedValue<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &TimedValue<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

// == Embedded Cache ==
/// Adapter exposing a moka cache through the common contract.
pub struct EmbeddedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    cache: Cache<String, TimedValue<V>>,
    stats: Arc<StatsCounters>,
    closed: AtomicBool,
    default_ttl: Duration,
}

impl<V> EmbeddedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let stats = Arc::new(StatsCounters::new());
        let expirations = Arc::clone(&stats);
        let base_weight = mem::size_of::<TimedValue<V>>();
        let initial_capacity = (config.capacity_hint_bytes / base_weight.max(1) as u64)
            .min(1 << 16) as usize;

        let cache = Cache::builder()
            .initial_capacity(initial_capacity)
            .weigher(move |key: &String, _value: &TimedValue<V>| -> u32 {
                u32::try_from(key.len() + base_weight).unwrap_or(u32::MAX)
            })
            .expire_after(PerEntryTtl)
            .eviction_listener(move |_key, _value, cause| {
                if cause == RemovalCause::Expired {
                    expirations.record_expired(1);
                }
            })
            .build();

        info!(
            capacity_hint_bytes = config.capacity_hint_bytes,
            "Embedded cache ready"
        );

        Ok(Self {
            cache,
            stats,
            closed: AtomicBool::new(false),
            default_ttl: config.default_ttl,
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }

    fn timed(&self, value: V, ttl: Duration) -> TimedValue<V> {
        let ttl = if ttl.is_zero() { self.default_ttl } else { ttl };
        TimedValue { value, ttl }
    }

    fn lookup(&self, key: &str) -> Option<V> {
        let value = self.cache.get(key).map(|timed| timed.value);
        match value {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        value
    }
}

impl<V> CacheBackend<V> for EmbeddedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        self.ensure_open()?;
        validate_key(key)?;

        self.cache.insert(key.to_string(), self.timed(value, ttl));
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<V>> {
        self.ensure_open()?;
        validate_key(key)?;

        Ok(self.lookup(key))
    }

    fn get_many(&self, keys: &[&str]) -> Result<GetManyResult<V>> {
        self.ensure_open()?;
        if keys.is_empty() {
            return Err(CacheError::InvalidArgument(
                "keys must not be empty".to_string(),
            ));
        }

        let mut found = HashMap::with_capacity(keys.len());
        let mut not_found = Vec::new();
        for key in keys {
            if found.contains_key(*key) || not_found.iter().any(|k| k == key) {
                continue;
            }
            match self.lookup(key) {
                Some(value) => {
                    found.insert(key.to_string(), value);
                }
                None => not_found.push(key.to_string()),
            }
        }

        Ok(GetManyResult { found, not_found })
    }

    fn update(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        self.ensure_open()?;
        validate_key(key)?;

        // Existence check and write happen under moka's per-key lock
        let timed = self.timed(value, ttl);
        let result = self
            .cache
            .entry_by_ref(key)
            .and_compute_with(|current| match current {
                Some(_) => Op::Put(timed),
                None => Op::Nop,
            });

        match result {
            CompResult::ReplacedWith(_) => Ok(()),
            _ => Err(CacheError::NotFound(key.to_string())),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.ensure_open()?;
        validate_key(key)?;

        let result = self
            .cache
            .entry_by_ref(key)
            .and_compute_with(|current| match current {
                Some(_) => Op::Remove,
                None => Op::Nop,
            });

        match result {
            CompResult::Removed(_) => Ok(()),
            _ => Err(CacheError::NotFound(key.to_string())),
        }
    }

    fn range(&self, visit: &mut dyn FnMut(&str, &V) -> bool) -> Result<()> {
        self.ensure_open()?;

        for (key, timed) in self.cache.iter() {
            if !visit(key.as_str(), &timed.value) {
                break;
            }
        }
        Ok(())
    }

    fn number_of_records(&self) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.cache.run_pending_tasks();
        self.cache.entry_count() as usize
    }

    fn capacity(&self) -> Result<i64> {
        self.ensure_open()?;
        self.cache.run_pending_tasks();
        Ok(self.cache.weighted_size() as i64)
    }

    fn stats(&self) -> Result<CacheStats> {
        self.ensure_open()?;
        self.cache.run_pending_tasks();
        Ok(self.stats.snapshot(
            self.cache.entry_count() as usize,
            self.cache.weighted_size() as i64,
        ))
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(CacheError::Closed);
        }
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
        info!("Embedded cache closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
