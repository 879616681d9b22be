//! Cache registry - one running instance per (backend kind, configuration).
//!
//! Opening the same kind with a configuration that serializes identically
//! returns the handle already running instead of starting a second sweeper
//! over the same logical cache.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::debug;

use crate::backend::{new_backend, BackendKind, CacheHandle, CacheValue};
use crate::config::CacheConfig;
use crate::error::Result;

static GLOBAL: Lazy<CacheRegistry> = Lazy::new(CacheRegistry::new);

/// Registry key: backend tag, config fingerprint, and value type.
type RegistryKey = (&'static str, String, TypeId);

/// Concurrency-safe get-or-create map of running caches.
///
/// ## Example
///
/// ```rust
/// use std::time::Duration;
/// use mini_ttl_cache::{BackendKind, CacheBackend, CacheConfig, CacheRegistry};
///
/// let registry = CacheRegistry::new();
/// let config = CacheConfig::default().with_cleaning(false, Duration::ZERO);
///
/// let a = registry.open::<String>(BackendKind::Custom, &config).unwrap();
/// let b = registry.open::<String>(BackendKind::Custom, &config).unwrap();
/// a.set("k", "v".to_string(), Duration::from_secs(60)).unwrap();
/// assert_eq!(b.get("k").unwrap(), Some("v".to_string()));
/// ```
pub struct CacheRegistry {
    instances: Mutex<HashMap<RegistryKey, Box<dyn Any + Send + Sync>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Process-wide registry, created on first use and kept until exit.
    pub fn global() -> &'static CacheRegistry {
        &GLOBAL
    }

    fn key<V: 'static>(kind: &BackendKind, config: &CacheConfig) -> Result<RegistryKey> {
        Ok((kind.tag(), config.fingerprint()?, TypeId::of::<V>()))
    }

    /// Returns the running cache for `kind` and `config`, creating it on first use.
    ///
    /// A registered instance that has since been closed is replaced. Remote
    /// backends are never registered: their identity is the client, so each
    /// call builds a new adapter.
    pub fn open<V: CacheValue>(&self, kind: BackendKind, config: &CacheConfig) -> Result<CacheHandle<V>> {
        if matches!(kind, BackendKind::Remote(_)) {
            return new_backend(kind, config);
        }

        let key = Self::key::<V>(&kind, config)?;
        // Held across construction so two racing opens cannot both build
        let mut instances = self.instances.lock();

        if let Some(existing) = instances
            .get(&key)
            .and_then(|boxed| boxed.downcast_ref::<CacheHandle<V>>())
        {
            if !existing.is_closed() {
                debug!("Reusing {} cache {}", key.0, &key.1[..12]);
                return Ok(existing.clone());
            }
            debug!("Replacing closed {} cache {}", key.0, &key.1[..12]);
        }

        let handle: CacheHandle<V> = new_backend(kind, config)?;
        debug!("Registered {} cache {}", key.0, &key.1[..12]);
        instances.insert(key, Box::new(handle.clone()));
        Ok(handle)
    }

    /// Forgets the instance for `kind` and `config` without closing it.
    ///
    /// Returns true if an instance was registered.
    pub fn unregister<V: CacheValue>(&self, kind: &BackendKind, config: &CacheConfig) -> Result<bool> {
        let key = Self::key::<V>(kind, config)?;
        Ok(self.instances.lock().remove(&key).is_some())
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("instance_count", &self.len())
            .finish()
    }
}

/// Opens a cache through the process-wide registry.
pub fn open<V: CacheValue>(kind: BackendKind, config: &CacheConfig) -> Result<CacheHandle<V>> {
    CacheRegistry::global().open(kind, config)
}
