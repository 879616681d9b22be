//! Integration Tests for the cache contract
//!
//! Exercises every backend through the public factory and registry.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mini_ttl_cache::{
    new_backend, BackendKind, CacheBackend, CacheConfig, CacheError, CacheHandle, CacheRegistry,
    ExpiringCache, RemoteClient, Result,
};
use parking_lot::Mutex;

const HOUR: Duration = Duration::from_secs(3600);

// == Helper Functions ==

fn lazy_config() -> CacheConfig {
    CacheConfig::default().with_cleaning(false, Duration::ZERO)
}

fn sweeping_config(interval_ms: u64) -> CacheConfig {
    CacheConfig::default().with_cleaning(true, Duration::from_millis(interval_ms))
}

/// Remote stand-in with no expiry of its own; good enough for contract checks.
#[derive(Default)]
struct MapRemote {
    data: Mutex<BTreeMap<String, Vec<u8>>>,
    closed: AtomicBool,
}

impl RemoteClient for MapRemote {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Vec<u8>, _ttl: Duration) -> Result<()> {
        self.data.lock().insert(key.to_string(), value);
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
        Ok(self.data.lock().values().map(|v| v.len() as u64).sum())
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

fn all_backends() -> Vec<(&'static str, CacheHandle<String>)> {
    let remote: Arc<dyn RemoteClient> = Arc::new(MapRemote::default());
    vec![
        ("custom", new_backend(BackendKind::Custom, &lazy_config()).unwrap()),
        ("embedded", new_backend(BackendKind::Embedded, &lazy_config()).unwrap()),
        ("remote", new_backend(BackendKind::Remote(remote), &lazy_config()).unwrap()),
    ]
}

// == Contract Tests (every backend) ==

#[test]
fn test_set_then_get() {
    for (name, cache) in all_backends() {
        cache.set("key", "value".to_string(), HOUR).unwrap();
        assert_eq!(cache.get("key").unwrap(), Some("value".to_string()), "{}", name);
    }
}

#[test]
fn test_update_requires_existence() {
    for (name, cache) in all_backends() {
        let result = cache.update("missing-key", "v".to_string(), HOUR);
        assert!(matches!(result, Err(CacheError::NotFound(_))), "{}", name);

        cache.set("key", "old".to_string(), HOUR).unwrap();
        cache.update("key", "new".to_string(), HOUR).unwrap();
        assert_eq!(cache.get("key").unwrap(), Some("new".to_string()), "{}", name);
    }
}

#[test]
fn test_delete_requires_existence() {
    for (name, cache) in all_backends() {
        let result = cache.delete("missing-key");
        assert!(matches!(result, Err(CacheError::NotFound(_))), "{}", name);

        cache.set("key", "v".to_string(), HOUR).unwrap();
        cache.delete("key").unwrap();
        assert_eq!(cache.get("key").unwrap(), None, "{}", name);
    }
}

#[test]
fn test_get_many_partitioning() {
    for (name, cache) in all_backends() {
        for key in ["k1", "k2", "k3"] {
            cache.set(key, key.to_string(), HOUR).unwrap();
        }

        let result = cache.get_many(&["k1", "k2", "k3", "m1", "m2"]).unwrap();

        let mut found: Vec<&String> = result.found.keys().collect();
        found.sort();
        assert_eq!(found, vec!["k1", "k2", "k3"], "{}", name);
        assert_eq!(result.not_found, vec!["m1".to_string(), "m2".to_string()], "{}", name);
        assert!(result.not_found.iter().all(|k| !result.found.contains_key(k)));

        assert!(matches!(cache.get_many(&[]), Err(CacheError::InvalidArgument(_))));
    }
}

#[test]
fn test_empty_key_is_invalid() {
    for (name, cache) in all_backends() {
        assert!(
            matches!(cache.set("", "v".to_string(), HOUR), Err(CacheError::InvalidArgument(_))),
            "{}",
            name
        );
        assert!(matches!(cache.get(""), Err(CacheError::InvalidArgument(_))), "{}", name);
    }
}

#[test]
fn test_close_then_everything_fails() {
    for (name, cache) in all_backends() {
        cache.set("key", "v".to_string(), HOUR).unwrap();

        cache.close().unwrap();
        assert!(cache.is_closed(), "{}", name);
        assert_eq!(cache.close(), Err(CacheError::Closed), "{}", name);
        assert_eq!(cache.get("key"), Err(CacheError::Closed), "{}", name);
        assert_eq!(cache.delete("key"), Err(CacheError::Closed), "{}", name);
        assert!(matches!(cache.range(&mut |_, _| true), Err(CacheError::Closed)));
    }
}

// == Expiry ==

#[test]
fn test_expiry_without_sweeper() {
    for kind in [BackendKind::Custom, BackendKind::Embedded] {
        let cache: CacheHandle<String> = new_backend(kind.clone(), &lazy_config()).unwrap();
        cache.set("key", "v".to_string(), Duration::from_millis(100)).unwrap();

        thread::sleep(Duration::from_millis(200));

        assert_eq!(cache.get("key").unwrap(), None, "{:?}", kind);
    }
}

#[tokio::test]
async fn test_expiry_with_sweeper() {
    let cache: CacheHandle<String> = new_backend(BackendKind::Custom, &sweeping_config(50)).unwrap();
    cache.set("key", "v".to_string(), Duration::from_millis(100)).unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(cache.get("key").unwrap(), None);
    cache.close().unwrap();
}

#[tokio::test]
async fn test_sweeper_reclaims_without_being_asked() {
    let cache: CacheHandle<String> = new_backend(BackendKind::Custom, &sweeping_config(50)).unwrap();
    cache.set("short", "v".to_string(), Duration::from_millis(10)).unwrap();
    cache.set("long", "v".to_string(), HOUR).unwrap();
    let before = cache.number_of_records();

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(before, 2);
    assert_eq!(cache.number_of_records(), 1);
    cache.close().unwrap();
}

#[tokio::test]
async fn test_close_stops_background_task() {
    let cache = ExpiringCache::<String>::new(sweeping_config(20)).unwrap();
    assert!(cache.sweeper_running());

    cache.close().unwrap();
    assert!(matches!(cache.close(), Err(CacheError::Closed)));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!cache.sweeper_running());
    assert_eq!(cache.number_of_records(), 0);
}

// == Concurrency ==

#[test]
fn test_concurrent_writers_threads() {
    let cache: CacheHandle<usize> = new_backend(BackendKind::Custom, &lazy_config()).unwrap();

    let handles: Vec<_> = (0..128)
        .map(|i| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.set(&format!("key-{}", i), i, HOUR))
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(cache.number_of_records(), 128);
    for i in 0..128 {
        assert_eq!(cache.get(&format!("key-{}", i)).unwrap(), Some(i));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_tasks() {
    let cache: CacheHandle<usize> = new_backend(BackendKind::Custom, &sweeping_config(10)).unwrap();

    let tasks: Vec<_> = (0..200)
        .map(|i| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.set(&format!("task-{}", i), i * 2, HOUR) })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    for i in 0..200 {
        assert_eq!(cache.get(&format!("task-{}", i)).unwrap(), Some(i * 2));
    }
    cache.close().unwrap();
}

#[test]
fn test_concurrent_readers_and_writers_same_key() {
    let cache: CacheHandle<u64> = new_backend(BackendKind::Custom, &lazy_config()).unwrap();
    cache.set("shared", 0, HOUR).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for n in 0..500u64 {
                    if t % 2 == 0 {
                        cache.set("shared", n, HOUR).unwrap();
                    } else {
                        // Always a complete value, never a miss
                        assert!(cache.get("shared").unwrap().is_some());
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(cache.get("shared").unwrap(), Some(499));
}

// == Registry ==

#[test]
fn test_registry_singleton_per_config() {
    let registry = CacheRegistry::new();

    let a: CacheHandle<String> = registry.open(BackendKind::Custom, &lazy_config()).unwrap();
    let b: CacheHandle<String> = registry.open(BackendKind::Custom, &lazy_config()).unwrap();
    let other: CacheHandle<String> = registry
        .open(BackendKind::Custom, &lazy_config().with_capacity_hint(1))
        .unwrap();

    a.set("key", "shared".to_string(), HOUR).unwrap();
    assert_eq!(b.get("key").unwrap(), Some("shared".to_string()));
    assert_eq!(other.get("key").unwrap(), None);
}

#[test]
fn test_remote_backend_is_never_shared() {
    let registry = CacheRegistry::new();
    let remote: Arc<dyn RemoteClient> = Arc::new(MapRemote::default());

    let a: CacheHandle<String> = registry
        .open(BackendKind::Remote(Arc::clone(&remote)), &lazy_config())
        .unwrap();
    let b: CacheHandle<String> = registry
        .open(BackendKind::Remote(remote), &lazy_config())
        .unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert!(registry.is_empty());

    // Same client underneath, so data is visible through both adapters
    a.set("key", "v".to_string(), HOUR).unwrap();
    assert_eq!(b.get("key").unwrap(), Some("v".to_string()));
}

// == Token gate usage ==

#[test]
fn test_token_lookup_accepts_known_and_rejects_unknown() {
    let cache: CacheHandle<String> = new_backend(BackendKind::Custom, &lazy_config()).unwrap();
    cache.set("hash-of-valid-token", "user-1".to_string(), HOUR).unwrap();

    let accept = |token_hash: &str| matches!(cache.get(token_hash), Ok(Some(v)) if !v.is_empty());

    assert!(accept("hash-of-valid-token"));
    assert!(!accept("hash-of-unknown-token"));
}
