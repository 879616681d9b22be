//! Backend Module
//!
//! The cache contract every backend implements, and the factory that picks a
//! concrete backend for a given kind and configuration.
//!
//! # Backends
//! - `Custom`: the in-process expiring cache from `crate::cache`
//! - `Embedded`: an adapter over the moka cache library
//! - `Remote`: an adapter over a caller-supplied remote key-value client

mod embedded;
mod registry;
mod remote;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{CacheStats, ExpiringCache};
use crate::config::CacheConfig;
use crate::error::Result;

pub use embedded::EmbeddedCache;
pub use registry::{open, CacheRegistry};
pub use remote::{RemoteBackend, RemoteClient};

// == Cache Value ==
/// Bound shared by every value type a backend can hold.
///
/// Serde bounds are needed because the remote backend serializes; the
/// in-process backends never do.
pub trait CacheValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

// == Get Many Result ==
/// Outcome of a multi-key lookup. Every requested key lands in exactly one
/// of the two halves.
#[derive(Debug, Clone, PartialEq)]
pub struct GetManyResult<V> {
    pub found: HashMap<String, V>,
    pub not_found: Vec<String>,
}

// == Cache Backend ==
/// The operation set shared by every backend.
///
/// `get` reports absent and expired keys alike as `Ok(None)`; `update` and
/// `delete` report them as `CacheError::NotFound`. After `close` every
/// fallible operation returns `CacheError::Closed`.
pub trait CacheBackend<V>: Send + Sync {
    /// Stores `value` under `key`. A zero `ttl` selects the default TTL.
    fn set(&self, key: &str, value: V, ttl: Duration) -> Result<()>;

    fn get(&self, key: &str) -> Result<Option<V>>;

    fn get_many(&self, keys: &[&str]) -> Result<GetManyResult<V>>;

    /// Replaces value and TTL of an existing, unexpired key.
    fn update(&self, key: &str, value: V, ttl: Duration) -> Result<()>;

    /// Removes an existing, unexpired key.
    fn delete(&self, key: &str) -> Result<()>;

    /// Visits live entries until `visit` returns false.
    fn range(&self, visit: &mut dyn FnMut(&str, &V) -> bool) -> Result<()>;

    /// Stored entry count; may include expired entries not yet reclaimed.
    fn number_of_records(&self) -> usize;

    /// Best-effort size of the stored data in bytes.
    fn capacity(&self) -> Result<i64>;

    fn stats(&self) -> Result<CacheStats>;

    fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// Shared handle to any backend.
pub type CacheHandle<V> = Arc<dyn CacheBackend<V>>;

// == Backend Kind ==
/// Which implementation backs a cache handle.
#[derive(Clone)]
pub enum BackendKind {
    /// In-process expiring cache with its own sweeper
    Custom,
    /// In-process cache built on the moka library
    Embedded,
    /// Remote key-value service reached through the given client
    Remote(Arc<dyn RemoteClient>),
}

impl BackendKind {
    /// Stable name used in registry keys and logs.
    pub fn tag(&self) -> &'static str {
        match self {
            BackendKind::Custom => "custom",
            BackendKind::Embedded => "embedded",
            BackendKind::Remote(_) => "remote",
        }
    }
}

impl fmt::Debug for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// == Factory ==
/// Builds a fresh backend of the given kind, bypassing the registry.
///
/// Prefer [`open`] when identical configurations should share one instance.
pub fn new_backend<V: CacheValue>(kind: BackendKind, config: &CacheConfig) -> Result<CacheHandle<V>> {
    let handle: CacheHandle<V> = match kind {
        BackendKind::Custom => Arc::new(ExpiringCache::new(config.clone())?),
        BackendKind::Embedded => Arc::new(EmbeddedCache::new(config.clone())?),
        BackendKind::Remote(client) => Arc::new(RemoteBackend::new(client, config.clone())?),
    };
    Ok(handle)
}
