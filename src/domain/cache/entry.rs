//! Cache entry model shared by the memory and disk tiers

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

/// A single cached value with its expiry metadata.
///
/// `key` is the one-way hash of the logical cache key; the logical key itself
/// is never persisted. The disk tier serializes this struct verbatim, one
/// file per key, so `expires_at` on disk is authoritative for the entry's
/// lifetime. A copy promoted into the memory tier carries the same
/// `expires_at` and can therefore never outlive the disk copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: String,
    /// Declared content tag for the opaque payload (e.g. "application/json").
    #[serde(default = "default_content_type")]
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// True when `payload` is gzip-compressed and base64-encoded.
    #[serde(default)]
    pub compressed: bool,
}

fn default_content_type() -> String {
    "application/json".to_string()
}

impl CacheEntry {
    pub fn new(
        key: impl Into<String>,
        payload: impl Into<String>,
        ttl: std::time::Duration,
    ) -> Self {
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(0));
        Self {
            key: key.into(),
            payload: payload.into(),
            content_type: default_content_type(),
            created_at: now,
            expires_at: now + ttl,
            compressed: false,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Remaining lifetime, or `None` once expired.
    pub fn remaining_ttl(&self) -> Option<std::time::Duration> {
        let remaining = self.expires_at - Utc::now();
        remaining.to_std().ok()
    }
}

/// Point-in-time counters reported by the cache manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub memory_entries: usize,
    pub disk_entries: usize,
    pub evictions: u64,
    pub expired_swept: u64,
    pub corrupt_swept: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}
