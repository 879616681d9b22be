//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

/// TTL applied when a caller passes a zero TTL and no other default is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const DEFAULT_CAPACITY_HINT_BYTES: u64 = 64 * 1024 * 1024;
const DEFAULT_CLEANING_INTERVAL: Duration = Duration::from_secs(1);

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
/// Two configurations that serialize identically are the same logical cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Expected memory footprint in bytes, used to pre-size the store
    pub capacity_hint_bytes: u64,
    /// Whether the background sweeper runs
    pub cleaning_enabled: bool,
    /// Time between two sweeper passes
    pub cleaning_interval: Duration,
    /// TTL substituted when a caller passes zero
    pub default_ttl: Duration,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY_BYTES` - Capacity hint in bytes (default: 64 MiB)
    /// - `CACHE_CLEANING_ENABLED` - Run the background sweeper (default: true)
    /// - `CACHE_CLEANING_INTERVAL_MS` - Sweeper interval in milliseconds (default: 1000)
    /// - `CACHE_DEFAULT_TTL_SECS` - Default TTL in seconds (default: 86400)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity_hint_bytes: env_parse("CACHE_CAPACITY_BYTES")
                .unwrap_or(defaults.capacity_hint_bytes),
            cleaning_enabled: env_parse("CACHE_CLEANING_ENABLED")
                .unwrap_or(defaults.cleaning_enabled),
            cleaning_interval: env_parse("CACHE_CLEANING_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.cleaning_interval),
            default_ttl: env_parse("CACHE_DEFAULT_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_ttl),
        }
    }

    pub fn with_capacity_hint(mut self, bytes: u64) -> Self {
        self.capacity_hint_bytes = bytes;
        self
    }

    pub fn with_cleaning(mut self, enabled: bool, interval: Duration) -> Self {
        self.cleaning_enabled = enabled;
        self.cleaning_interval = interval;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    // == Validate ==
    /// Rejects configurations the sweeper or the TTL policy cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.cleaning_enabled && self.cleaning_interval.is_zero() {
            return Err(CacheError::InvalidArgument(
                "cleaning interval must be greater than zero when cleaning is enabled".to_string(),
            ));
        }
        if self.default_ttl.is_zero() {
            return Err(CacheError::InvalidArgument(
                "default TTL must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    // == Fingerprint ==
    /// Content hash of the serialized configuration, in lowercase hex.
    ///
    /// This is the identity the registry uses to hand out one instance per
    /// configuration.
    pub fn fingerprint(&self) -> Result<String> {
        let serialized = serde_json::to_vec(self)?;
        let digest = Sha256::digest(&serialized);
        Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity_hint_bytes: DEFAULT_CAPACITY_HINT_BYTES,
            cleaning_enabled: true,
            cleaning_interval: DEFAULT_CLEANING_INTERVAL,
            default_ttl: DEFAULT_TTL,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
