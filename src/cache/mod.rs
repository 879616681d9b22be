//! Cache Module
//!
//! Provides the in-process expiring key-value cache: entries, the concurrent
//! store, statistics, and the public facade.

mod entry;
mod expiring;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use expiring::{CacheState, ExpiringCache};
pub use stats::{CacheStats, StatsCounters};
pub use store::CacheStore;

pub(crate) use expiring::{validate_key, CacheInner};
