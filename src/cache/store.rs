//! Cache Store Module
//!
//! Thread-safe key to entry storage. The store knows nothing about expiry
//! policy; it hands expired entries back like any other so the sweeper can
//! see them.

use std::collections::HashMap;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};

/// Fixed per-entry overhead added to every weight (map slot, Arc header).
const ENTRY_OVERHEAD_BYTES: usize = 48;

/// Upper bound on slots pre-allocated from the capacity hint.
const MAX_PREALLOCATED_SLOTS: usize = 1 << 16;

// == Cache Store ==
/// Main storage behind a single readers-writer lock.
///
/// Entries are kept behind `Arc` so `range` can snapshot them cheaply and run
/// the visitor without holding the lock.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    entries: RwLock<HashMap<String, Arc<CacheEntry<V>>>>,
    /// Running approximate size in bytes
    size_bytes: AtomicI64,
    /// Set by `seal`; only read or written while the entries lock is held
    sealed: AtomicBool,
}

impl<V> CacheStore<V> {
    // == Constructor ==
    /// Creates a new store pre-sized from a capacity hint in bytes.
    pub fn new(capacity_hint_bytes: u64) -> Self {
        let per_entry = Self::base_weight() as u64;
        let slots = (capacity_hint_bytes / per_entry).min(MAX_PREALLOCATED_SLOTS as u64) as usize;
        Self {
            entries: RwLock::new(HashMap::with_capacity(slots)),
            size_bytes: AtomicI64::new(0),
            sealed: AtomicBool::new(false),
        }
    }

    fn base_weight() -> usize {
        mem::size_of::<CacheEntry<V>>() + ENTRY_OVERHEAD_BYTES
    }

    fn weight(key: &str) -> i64 {
        (key.len() + Self::base_weight()) as i64
    }

    // == Put ==
    /// Inserts or overwrites the entry for `key`.
    ///
    /// Fails with `Closed` once the store has been sealed.
    pub fn put(&self, key: &str, entry: CacheEntry<V>) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::InvalidArgument(
                "key must not be empty".to_string(),
            ));
        }

        let entry = Arc::new(entry);
        let previous = {
            let mut entries = self.entries.write();
            if self.sealed.load(Ordering::Relaxed) {
                return Err(CacheError::Closed);
            }
            entries.insert(key.to_string(), entry)
        };

        if previous.is_none() {
            self.size_bytes.fetch_add(Self::weight(key), Ordering::Relaxed);
        }
        Ok(())
    }

    /// Overwrites the entry for `key` only if one exists and `predicate`
    /// accepts it. Check and write happen under one write lock.
    pub fn replace_if<P>(&self, key: &str, entry: CacheEntry<V>, predicate: P) -> Result<bool>
    where
        P: FnOnce(&CacheEntry<V>) -> bool,
    {
        let mut entries = self.entries.write();
        if self.sealed.load(Ordering::Relaxed) {
            return Err(CacheError::Closed);
        }
        match entries.get_mut(key) {
            Some(current) if predicate(current) => {
                *current = Arc::new(entry);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // == Get ==
    /// Returns the entry for `key`, expired or not.
    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry<V>>> {
        self.entries.read().get(key).cloned()
    }

    // == Remove ==
    /// Deletes the entry for `key`, returning it if it was present.
    pub fn remove(&self, key: &str) -> Option<Arc<CacheEntry<V>>> {
        let removed = self.entries.write().remove(key);
        if removed.is_some() {
            self.size_bytes.fetch_sub(Self::weight(key), Ordering::Relaxed);
        }
        removed
    }

    /// Removes `key` only if it still holds exactly `expected`.
    ///
    /// The sweeper uses this so that an entry refreshed after the scan
    /// snapshot was taken is left alone.
    pub fn remove_if_same(&self, key: &str, expected: &Arc<CacheEntry<V>>) -> bool {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(current) if Arc::ptr_eq(current, expected) => {
                entries.remove(key);
                drop(entries);
                self.size_bytes.fetch_sub(Self::weight(key), Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    // == Range ==
    /// Visits every entry until `visit` returns false.
    ///
    /// The visitor runs over a snapshot taken under the read lock, so it may
    /// call back into the store (including `remove`) without deadlocking.
    /// Entries inserted during the walk are not observed.
    pub fn range<F>(&self, mut visit: F)
    where
        F: FnMut(&str, &Arc<CacheEntry<V>>) -> bool,
    {
        let snapshot: Vec<(String, Arc<CacheEntry<V>>)> = self
            .entries
            .read()
            .iter()
            .map(|(key, entry)| (key.clone(), Arc::clone(entry)))
            .collect();

        for (key, entry) in &snapshot {
            if !visit(key, entry) {
                break;
            }
        }
    }

    // == Length ==
    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Best-effort size of the stored data in bytes.
    pub fn approx_size_bytes(&self) -> i64 {
        self.size_bytes.load(Ordering::Relaxed).max(0)
    }

    /// Drops every entry and resets the size counter.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.clear();
        entries.shrink_to_fit();
        self.size_bytes.store(0, Ordering::Relaxed);
    }

    /// Clears the store and rejects every later write.
    ///
    /// A writer that already passed its own open check but had not yet taken
    /// the lock sees the seal and fails instead of repopulating the store.
    pub fn seal(&self) {
        let mut entries = self.entries.write();
        self.sealed.store(true, Ordering::Relaxed);
        entries.clear();
        entries.shrink_to_fit();
        self.size_bytes.store(0, Ordering::Relaxed);
    }

    pub fn is_sealed(&self) -> bool {
        let _entries = self.entries.read();
        self.sealed.load(Ordering::Relaxed)
    }
}
