//! Bounded in-memory cache tier
//!
//! Holds at most `max_entries` entries; inserting beyond capacity evicts the
//! oldest-inserted entry first. Re-inserting an existing key counts as a new
//! insertion for ordering purposes. Expiry is enforced on read.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::domain::cache::CacheEntry;

/// A resident entry plus the logical key it was stored under. The logical
/// key is kept only here; the disk tier knows hashes alone.
#[derive(Debug, Clone)]
pub struct MemoryRecord {
    pub logical_key: String,
    pub entry: CacheEntry,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, MemoryRecord>,
    /// Hashed keys, oldest insertion at the front.
    order: VecDeque<String>,
}

#[derive(Debug)]
pub struct MemoryTier {
    max_entries: usize,
    inner: Mutex<Inner>,
}

impl MemoryTier {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Returns the live entry for a hashed key, dropping it if expired.
    pub fn get(&self, hashed_key: &str) -> Option<CacheEntry> {
        let mut inner = self.inner.lock().unwrap();
        match inner.entries.get(hashed_key) {
            Some(record) if record.entry.is_expired() => {
                inner.entries.remove(hashed_key);
                inner.order.retain(|k| k != hashed_key);
                None
            }
            Some(record) => Some(record.entry.clone()),
            None => None,
        }
    }

    /// Inserts an entry, evicting oldest-inserted entries to stay within
    /// capacity. Returns the number of evictions performed.
    pub fn insert(&self, logical_key: impl Into<String>, entry: CacheEntry) -> u64 {
        let hashed_key = entry.key.clone();
        let mut inner = self.inner.lock().unwrap();

        if inner.entries.remove(&hashed_key).is_some() {
            inner.order.retain(|k| k != &hashed_key);
        }

        let mut evictions = 0;
        while inner.entries.len() >= self.max_entries {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                    evictions += 1;
                }
                None => break,
            }
        }

        inner.order.push_back(hashed_key.clone());
        inner.entries.insert(
            hashed_key,
            MemoryRecord {
                logical_key: logical_key.into(),
                entry,
            },
        );
        evictions
    }

    pub fn remove(&self, hashed_key: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let existed = inner.entries.remove(hashed_key).is_some();
        if existed {
            inner.order.retain(|k| k != hashed_key);
        }
        existed
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (logical key, hashed key) pairs of resident entries, for pattern
    /// invalidation.
    pub fn resident_keys(&self) -> Vec<(String, String)> {
        self.inner
            .lock()
            .unwrap()
            .entries
            .values()
            .map(|r| (r.logical_key.clone(), r.entry.key.clone()))
            .collect()
    }
}
