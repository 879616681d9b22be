//! Background Tasks Module
//!
//! Contains background tasks that run periodically for the lifetime of a cache.
//!
//! # Tasks
//! - Expiry Sweeper: removes expired cache entries at the configured interval

mod sweeper;

pub(crate) use sweeper::spawn_sweeper;
pub use sweeper::SweeperHandle;
