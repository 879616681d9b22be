//! Remote key-value backend adapter.
//!
//! Values cross the boundary as JSON bytes. The network client itself lives
//! outside this crate; anything implementing [`RemoteClient`] can be plugged
//! in, and its errors must already be mapped onto `CacheError`.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::backend::{CacheBackend, CacheValue, GetManyResult};
use crate::cache::{validate_key, CacheStats, StatsCounters};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Remote Client ==
/// Minimal byte-oriented contract of a remote key-value service.
///
/// The service is expected to expire keys on its own once their TTL passes.
pub trait RemoteClient: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Returns whether the key existed.
    fn delete(&self, key: &str) -> Result<bool>;

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Batched read; the default issues one `get` per key.
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Vec<u8>>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    fn keys(&self) -> Result<Vec<String>>;

    fn len(&self) -> Result<usize>;

    fn memory_usage(&self) -> Result<u64>;

    fn close(&self) -> Result<()>;
}

// == Remote Backend ==
/// Adapter exposing a [`RemoteClient`] through the common contract.
pub struct RemoteBackend<V> {
    client: Arc<dyn RemoteClient>,
    stats: StatsCounters,
    closed: AtomicBool,
    default_ttl: Duration,
    _value: PhantomData<fn() -> V>,
}

impl<V: CacheValue> RemoteBackend<V> {
    pub fn new(client: Arc<dyn RemoteClient>, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        info!("Remote cache adapter ready");

        Ok(Self {
            client,
            stats: StatsCounters::new(),
            closed: AtomicBool::new(false),
            default_ttl: config.default_ttl,
            _value: PhantomData,
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }

    fn encode(value: &V) -> Result<Vec<u8>> {
        let json = serde_json::to_value(value)?;
        if json.is_null() {
            return Err(CacheError::InvalidArgument(
                "value must not be null".to_string(),
            ));
        }
        Ok(serde_json::to_vec(&json)?)
    }

    fn decode(bytes: &[u8]) -> Result<V> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn write(&self, key: &str, value: &V, ttl: Duration) -> Result<()> {
        let ttl = if ttl.is_zero() { self.default_ttl } else { ttl };
        self.client.set(key, Self::encode(value)?, ttl)
    }

    fn record(&self, hit: bool) {
        if hit {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
    }
}

impl<V: CacheValue> CacheBackend<V> for RemoteBackend<V> {
    fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        self.ensure_open()?;
        validate_key(key)?;
        self.write(key, &value, ttl)
    }

    fn get(&self, key: &str) -> Result<Option<V>> {
        self.ensure_open()?;
        validate_key(key)?;

        let value = self
            .client
            .get(key)?
            .map(|bytes| Self::decode(&bytes))
            .transpose()?;
        self.record(value.is_some());
        Ok(value)
    }

    fn get_many(&self, keys: &[&str]) -> Result<GetManyResult<V>> {
        self.ensure_open()?;
        if keys.is_empty() {
            return Err(CacheError::InvalidArgument(
                "keys must not be empty".to_string(),
            ));
        }

        let raw = self.client.get_many(keys)?;
        if raw.len() != keys.len() {
            return Err(CacheError::Internal(format!(
                "remote returned {} values for {} keys",
                raw.len(),
                keys.len()
            )));
        }

        let mut found = HashMap::with_capacity(keys.len());
        let mut not_found = Vec::new();
        for (key, bytes) in keys.iter().zip(raw) {
            if found.contains_key(*key) || not_found.iter().any(|k| k == key) {
                continue;
            }
            match bytes {
                Some(bytes) => {
                    found.insert(key.to_string(), Self::decode(&bytes)?);
                    self.record(true);
                }
                None => {
                    not_found.push(key.to_string());
                    self.record(false);
                }
            }
        }

        Ok(GetManyResult { found, not_found })
    }

    fn update(&self, key: &str, value: V, ttl: Duration) -> Result<()> {
        self.ensure_open()?;
        validate_key(key)?;

        if !self.client.exists(key)? {
            return Err(CacheError::NotFound(key.to_string()));
        }
        self.write(key, &value, ttl)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.ensure_open()?;
        validate_key(key)?;

        if self.client.delete(key)? {
            Ok(())
        } else {
            Err(CacheError::NotFound(key.to_string()))
        }
    }

    fn range(&self, visit: &mut dyn FnMut(&str, &V) -> bool) -> Result<()> {
        self.ensure_open()?;

        for key in self.client.keys()? {
            // Keys can expire between listing and reading
            let Some(bytes) = self.client.get(&key)? else {
                continue;
            };
            let value = Self::decode(&bytes)?;
            if !visit(&key, &value) {
                break;
            }
        }
        Ok(())
    }

    /// Falls back to zero when the remote cannot be asked.
    fn number_of_records(&self) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.client.len().unwrap_or(0)
    }

    fn capacity(&self) -> Result<i64> {
        self.ensure_open()?;
        let bytes = self.client.memory_usage()?;
        Ok(i64::try_from(bytes).unwrap_or(i64::MAX))
    }

    fn stats(&self) -> Result<CacheStats> {
        self.ensure_open()?;
        let total_entries = self.client.len()?;
        Ok(self.stats.snapshot(total_entries, self.capacity()?))
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(CacheError::Closed);
        }
        info!("Remote cache adapter closed");
        self.client.close()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    /// Remote stand-in that records the TTL it was handed.
    #[derive(Default)]
    struct FakeRemote {
        data: Mutex<BTreeMap<String, (Vec<u8>, Duration)>>,
        closed: AtomicBool,
    }

    impl RemoteClient for FakeRemote {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.data.lock().get(key).map(|(bytes, _)| bytes.clone()))
        }

        fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
            self.data.lock().insert(key.to_string(), (value, ttl));
            Ok(())
        }

        fn delete(&self, key: &str) -> Result<bool> {
            Ok(self.data.lock().remove(key).is_some())
        }

        fn keys(&self) -> Result<Vec<String>> {
            Ok(self.data.lock().keys().cloned().collect())
        }

        fn len(&self) -> Result<usize> {
            Ok(self.data.lock().len())
        }

        fn memory_usage(&self) -> Result<u64> {
            Ok(self.data.lock().values().map(|(b, _)| b.len() as u64).sum())
        }

        fn close(&self) -> Result<()> {
            self.closed.store(true, Ordering::Release);
            Ok(())
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Session {
        user: String,
        roles: Vec<String>,
    }

    fn backend<V: CacheValue>(remote: &Arc<FakeRemote>) -> RemoteBackend<V> {
        let client: Arc<dyn RemoteClient> = remote.clone();
        RemoteBackend::new(client, CacheConfig::default()).unwrap()
    }

    #[test]
    fn test_values_round_trip_through_json() {
        let remote = Arc::new(FakeRemote::default());
        let cache = backend::<Session>(&remote);
        let session = Session {
            user: "ana".to_string(),
            roles: vec!["admin".to_string()],
        };

        cache.set("s1", session.clone(), Duration::from_secs(30)).unwrap();
        assert_eq!(cache.get("s1").unwrap(), Some(session));

        let stored = remote.data.lock().get("s1").cloned().unwrap();
        assert_eq!(stored.1, Duration::from_secs(30));
        assert!(serde_json::from_slice::<serde_json::Value>(&stored.0).is_ok());
    }

    #[test]
    fn test_zero_ttl_sends_default() {
        let remote = Arc::new(FakeRemote::default());
        let cache = backend::<u32>(&remote);

        cache.set("k", 7, Duration::ZERO).unwrap();
        assert_eq!(remote.data.lock()["k"].1, crate::config::DEFAULT_TTL);
    }

    #[test]
    fn test_null_value_rejected() {
        let remote = Arc::new(FakeRemote::default());
        let cache = backend::<Option<u32>>(&remote);

        assert!(matches!(
            cache.set("k", None, Duration::from_secs(1)),
            Err(CacheError::InvalidArgument(_))
        ));
        cache.set("k", Some(1), Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn test_update_and_delete_require_existence() {
        let remote = Arc::new(FakeRemote::default());
        let cache = backend::<String>(&remote);

        assert!(cache.update("k", "v".to_string(), Duration::from_secs(1)).unwrap_err().is_not_found());
        assert!(cache.delete("k").unwrap_err().is_not_found());

        cache.set("k", "v".to_string(), Duration::from_secs(1)).unwrap();
        cache.update("k", "v2".to_string(), Duration::from_secs(1)).unwrap();
        assert_eq!(cache.get("k").unwrap(), Some("v2".to_string()));
        cache.delete("k").unwrap();
        assert_eq!(cache.get("k").unwrap(), None);
    }

    #[test]
    fn test_get_many_range_and_counts() {
        let remote = Arc::new(FakeRemote::default());
        let cache = backend::<u32>(&remote);
        cache.set("a", 1, Duration::from_secs(60)).unwrap();
        cache.set("b", 2, Duration::from_secs(60)).unwrap();

        let result = cache.get_many(&["a", "b", "z"]).unwrap();
        assert_eq!(result.found.len(), 2);
        assert_eq!(result.not_found, vec!["z".to_string()]);

        let mut sum = 0;
        cache
            .range(&mut |_, value| {
                sum += *value;
                true
            })
            .unwrap();
        assert_eq!(sum, 3);

        assert_eq!(cache.number_of_records(), 2);
        assert!(cache.capacity().unwrap() > 0);
    }

    #[test]
    fn test_close_forwards_to_client() {
        let remote = Arc::new(FakeRemote::default());
        let cache = backend::<u32>(&remote);

        cache.close().unwrap();
        assert!(remote.closed.load(Ordering::Acquire));
        assert_eq!(cache.close(), Err(CacheError::Closed));
        assert_eq!(cache.get("a"), Err(CacheError::Closed));
        assert_eq!(cache.number_of_records(), 0);
    }
}
