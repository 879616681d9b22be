//! Mini TTL Cache - an in-process expiring key-value cache
//!
//! Values live under string keys with independent time-to-live. Expired
//! entries are hidden on read and reclaimed by a background sweeper. The same
//! contract is offered by an embedded (moka) backend and a remote adapter,
//! selected through [`new_backend`] or the configuration-keyed [`open`].
//!
//! ```rust
//! use std::time::Duration;
//! use mini_ttl_cache::{CacheConfig, ExpiringCache};
//!
//! let config = CacheConfig::default().with_cleaning(false, Duration::ZERO);
//! let cache = ExpiringCache::new(config).unwrap();
//!
//! cache.set("token:abc", "user-42".to_string(), Duration::from_secs(60)).unwrap();
//! assert_eq!(cache.get("token:abc").unwrap(), Some("user-42".to_string()));
//! cache.close().unwrap();
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod shell;
pub mod tasks;

pub use backend::{
    new_backend, open, BackendKind, CacheBackend, CacheHandle, CacheRegistry, CacheValue,
    EmbeddedCache, GetManyResult, RemoteBackend, RemoteClient,
};
pub use cache::{CacheState, CacheStats, ExpiringCache};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
