//! Tiered cache manager
//!
//! Serves reads memory-first with disk fallback and promotion; writes go to
//! both tiers unless asked for memory-only. Disk failures degrade to
//! memory-only behavior and are logged, never surfaced to callers.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::cache::{hash_logical_key, Cache, CacheEntry, CacheStats, SetOptions};
use crate::domain::DomainError;
use crate::infrastructure::cache::{DiskTier, DiskTierConfig, MemoryTier, SweepOutcome};

#[derive(Debug, Clone)]
pub struct CacheManagerConfig {
    pub directory: PathBuf,
    pub default_ttl: Duration,
    /// Per-provider TTL overrides; sources that change faster get shorter
    /// lifetimes.
    pub provider_ttl: HashMap<String, Duration>,
    pub max_memory_entries: usize,
    pub compression_threshold: usize,
    pub sweep_interval: Duration,
}

impl Default for CacheManagerConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(".cache"),
            default_ttl: Duration::from_secs(3600),
            provider_ttl: HashMap::new(),
            max_memory_entries: 1000,
            compression_threshold: 4096,
            sweep_interval: Duration::from_secs(300),
        }
    }
}

#[derive(Debug)]
pub struct CacheManager {
    memory: MemoryTier,
    disk: DiskTier,
    config: CacheManagerConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired_swept: AtomicU64,
    corrupt_swept: AtomicU64,
}

impl CacheManager {
    pub fn new(config: CacheManagerConfig) -> Self {
        let disk = DiskTier::new(
            DiskTierConfig::new(config.directory.clone())
                .with_compression_threshold(config.compression_threshold),
        );
        Self {
            memory: MemoryTier::new(config.max_memory_entries),
            disk,
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expired_swept: AtomicU64::new(0),
            corrupt_swept: AtomicU64::new(0),
        }
    }

    /// Creates the cache directory and runs the startup sweep.
    pub async fn init(&self) -> Result<(), DomainError> {
        self.disk.init().await?;
        let outcome = self.sweep().await?;
        info!(
            expired = outcome.expired,
            corrupt = outcome.corrupt,
            "cache startup sweep finished"
        );
        Ok(())
    }

    /// TTL resolution order: explicit option, provider override, default.
    pub fn effective_ttl(&self, options: &SetOptions) -> Duration {
        if let Some(ttl) = options.ttl {
            return ttl;
        }
        if let Some(provider) = &options.provider {
            if let Some(ttl) = self.config.provider_ttl.get(provider) {
                return *ttl;
            }
        }
        self.config.default_ttl
    }

    /// Deletes expired and corrupt disk files, updating sweep counters.
    pub async fn sweep(&self) -> Result<SweepOutcome, DomainError> {
        let outcome = self.disk.sweep().await?;
        self.expired_swept.fetch_add(outcome.expired, Ordering::Relaxed);
        self.corrupt_swept.fetch_add(outcome.corrupt, Ordering::Relaxed);
        Ok(outcome)
    }

    /// Spawns the periodic sweep loop. The task runs until the manager is
    /// dropped by every holder.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        let interval = manager.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick fires immediately; the startup sweep already ran.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match manager.sweep().await {
                    Ok(outcome) if outcome.expired > 0 || outcome.corrupt > 0 => {
                        debug!(
                            expired = outcome.expired,
                            corrupt = outcome.corrupt,
                            "periodic cache sweep"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "periodic cache sweep failed"),
                }
            }
        })
    }

    // Backup/restore surface. These bypass the degradation policy: the
    // backup manager records per-component failures itself.

    pub async fn snapshot_files(&self) -> Result<Vec<(String, String)>, DomainError> {
        self.disk.dump_files().await
    }

    pub async fn snapshot_files_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, DomainError> {
        self.disk.dump_files_since(since).await
    }

    pub async fn stats_snapshot(&self) -> CacheStats {
        let disk_entries = self.disk.count().await.unwrap_or(0);
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            memory_entries: self.memory.len(),
            disk_entries,
            evictions: self.evictions.load(Ordering::Relaxed),
            expired_swept: self.expired_swept.load(Ordering::Relaxed),
            corrupt_swept: self.corrupt_swept.load(Ordering::Relaxed),
        }
    }

    /// Clears both tiers and rewrites disk files verbatim from a backup.
    pub async fn restore_files(&self, files: &[(String, String)]) -> Result<usize, DomainError> {
        self.memory.clear();
        self.disk.clear().await?;
        for (name, contents) in files {
            self.disk.restore_file(name, contents).await?;
        }
        Ok(files.len())
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl Cache for CacheManager {
    async fn get_raw(&self, logical_key: &str) -> Result<Option<String>, DomainError> {
        let hashed = hash_logical_key(logical_key);

        if let Some(entry) = self.memory.get(&hashed) {
            self.record_hit();
            return Ok(Some(entry.payload));
        }

        // Disk fallback; I/O failures degrade to a miss.
        let from_disk = match self.disk.read(&hashed).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = logical_key, error = %e, "disk tier read failed, degrading to miss");
                None
            }
        };

        match from_disk {
            Some(entry) => {
                let evicted = self.memory.insert(logical_key, entry.clone());
                self.evictions.fetch_add(evicted, Ordering::Relaxed);
                self.record_hit();
                Ok(Some(entry.payload))
            }
            None => {
                self.record_miss();
                Ok(None)
            }
        }
    }

    async fn set_raw(
        &self,
        logical_key: &str,
        payload: &str,
        options: SetOptions,
    ) -> Result<(), DomainError> {
        let ttl = self.effective_ttl(&options);
        let hashed = hash_logical_key(logical_key);
        let mut entry = CacheEntry::new(hashed, payload, ttl);
        if let Some(content_type) = &options.content_type {
            entry = entry.with_content_type(content_type.clone());
        }

        let evicted = self.memory.insert(logical_key, entry.clone());
        self.evictions.fetch_add(evicted, Ordering::Relaxed);

        if !options.memory_only {
            if let Err(e) = self.disk.write(&entry).await {
                warn!(
                    key = logical_key,
                    error = %e,
                    "disk tier write failed, memory copy remains authoritative"
                );
            }
        }

        Ok(())
    }

    async fn delete(&self, logical_key: &str) -> Result<bool, DomainError> {
        let hashed = hash_logical_key(logical_key);
        let in_memory = self.memory.remove(&hashed);
        let on_disk = match self.disk.remove(&hashed).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(key = logical_key, error = %e, "disk tier delete failed");
                false
            }
        };
        Ok(in_memory || on_disk)
    }

    /// Matches the `*` glob against logical keys of memory-resident entries
    /// and removes the matches from both tiers. Entries resident only on
    /// disk are unaffected; the sweep retires them at expiry.
    async fn invalidate_pattern(&self, pattern: &str) -> Result<usize, DomainError> {
        let regex_pattern = format!("^{}$", regex::escape(pattern).replace("\\*", ".*"));
        let regex = regex::Regex::new(&regex_pattern)
            .map_err(|e| DomainError::cache(format!("invalid pattern '{}': {}", pattern, e)))?;

        let mut removed = 0;
        for (logical, hashed) in self.memory.resident_keys() {
            if regex.is_match(&logical) {
                self.memory.remove(&hashed);
                if let Err(e) = self.disk.remove(&hashed).await {
                    warn!(key = logical, error = %e, "disk tier delete failed");
                }
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.memory.clear();
        if let Err(e) = self.disk.clear().await {
            warn!(error = %e, "disk tier clear failed");
        }
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, DomainError> {
        Ok(self.stats_snapshot().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::CacheExt;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> CacheManagerConfig {
        CacheManagerConfig {
            directory: dir.path().to_path_buf(),
            default_ttl: Duration::from_secs(60),
            max_memory_entries: 4,
            compression_threshold: 256,
            ..Default::default()
        }
    }

    async fn manager(dir: &TempDir) -> CacheManager {
        let manager = CacheManager::new(config(dir));
        manager.init().await.unwrap();
        manager
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let dir = TempDir::new().unwrap();
        let cache = manager(&dir).await;

        cache
            .set_raw("gemini:models", "payload", SetOptions::new())
            .await
            .unwrap();
        assert_eq!(
            cache.get_raw("gemini:models").await.unwrap(),
            Some("payload".to_string())
        );

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[tokio::test]
    async fn test_miss_counts() {
        let dir = TempDir::new().unwrap();
        let cache = manager(&dir).await;

        assert!(cache.get_raw("absent").await.unwrap().is_none());
        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_disk_fallback_repopulates_memory() {
        let dir = TempDir::new().unwrap();
        let cache = manager(&dir).await;

        cache
            .set_raw("keep:me", "payload", SetOptions::new())
            .await
            .unwrap();

        // Push the entry out of the 4-slot memory tier.
        for i in 0..4 {
            cache
                .set_raw(&format!("filler:{}", i), "x", SetOptions::new())
                .await
                .unwrap();
        }
        assert_eq!(cache.stats().await.unwrap().memory_entries, 4);

        // Served from disk and promoted back into memory.
        assert_eq!(
            cache.get_raw("keep:me").await.unwrap(),
            Some("payload".to_string())
        );
        let hashed = hash_logical_key("keep:me");
        assert!(cache.memory.get(&hashed).is_some());
    }

    #[tokio::test]
    async fn test_memory_only_entry_not_on_disk() {
        let dir = TempDir::new().unwrap();
        let cache = manager(&dir).await;

        cache
            .set_raw("volatile", "payload", SetOptions::new().memory_only())
            .await
            .unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.disk_entries, 0);
        assert_eq!(stats.memory_entries, 1);
    }

    #[tokio::test]
    async fn test_provider_ttl_override_applies() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.provider_ttl
            .insert("artificialanalysis".to_string(), Duration::from_secs(5));
        let cache = CacheManager::new(cfg);

        let provider_ttl = cache.effective_ttl(&SetOptions::new().for_provider("artificialanalysis"));
        assert_eq!(provider_ttl, Duration::from_secs(5));

        let unknown = cache.effective_ttl(&SetOptions::new().for_provider("unknown"));
        assert_eq!(unknown, Duration::from_secs(60));

        let explicit = cache.effective_ttl(
            &SetOptions::new()
                .for_provider("artificialanalysis")
                .with_ttl(Duration::from_secs(1)),
        );
        assert_eq!(explicit, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_expired_entry_absent_and_swept() {
        let dir = TempDir::new().unwrap();
        let cache = manager(&dir).await;

        cache
            .set_raw(
                "gemini:ask:hello",
                "answer",
                SetOptions::new().with_ttl(Duration::from_millis(50)),
            )
            .await
            .unwrap();
        assert_eq!(
            cache.get_raw("gemini:ask:hello").await.unwrap(),
            Some("answer".to_string())
        );

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.get_raw("gemini:ask:hello").await.unwrap().is_none());

        let outcome = cache.sweep().await.unwrap();
        assert_eq!(outcome.expired, 1);
        assert_eq!(cache.stats().await.unwrap().disk_entries, 0);
    }

    #[tokio::test]
    async fn test_delete_is_tolerant_of_absence() {
        let dir = TempDir::new().unwrap();
        let cache = manager(&dir).await;

        assert!(!cache.delete("never:set").await.unwrap());

        cache
            .set_raw("some:key", "payload", SetOptions::new())
            .await
            .unwrap();
        assert!(cache.delete("some:key").await.unwrap());
        assert!(cache.get_raw("some:key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_pattern_removes_both_tiers() {
        let dir = TempDir::new().unwrap();
        let cache = manager(&dir).await;

        cache
            .set_raw("gemini:models:1", "a", SetOptions::new())
            .await
            .unwrap();
        cache
            .set_raw("gemini:models:2", "b", SetOptions::new())
            .await
            .unwrap();
        cache
            .set_raw("openai:models:1", "c", SetOptions::new())
            .await
            .unwrap();

        let removed = cache.invalidate_pattern("gemini:*").await.unwrap();
        assert_eq!(removed, 2);
        assert!(cache.get_raw("gemini:models:1").await.unwrap().is_none());
        assert!(cache.get_raw("openai:models:1").await.unwrap().is_some());
        assert_eq!(cache.stats().await.unwrap().disk_entries, 1);
    }

    #[tokio::test]
    async fn test_typed_helpers_roundtrip() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct ModelInfo {
            name: String,
            context_window: u32,
        }

        let dir = TempDir::new().unwrap();
        let cache = manager(&dir).await;

        let value = ModelInfo {
            name: "gemini-pro".to_string(),
            context_window: 32768,
        };
        cache
            .set_json("models:gemini-pro", &value, SetOptions::new())
            .await
            .unwrap();

        let back: Option<ModelInfo> = cache.get_json("models:gemini-pro").await.unwrap();
        assert_eq!(back, Some(value));
    }

    #[tokio::test]
    async fn test_snapshot_and_restore_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cache = manager(&dir).await;

        cache
            .set_raw("k:1", "payload-1", SetOptions::new())
            .await
            .unwrap();
        cache
            .set_raw("k:2", &"z".repeat(1024), SetOptions::new())
            .await
            .unwrap();

        let snapshot = cache.snapshot_files().await.unwrap();
        assert_eq!(snapshot.len(), 2);

        cache.clear().await.unwrap();
        assert!(cache.get_raw("k:1").await.unwrap().is_none());

        cache.restore_files(&snapshot).await.unwrap();
        assert_eq!(
            cache.get_raw("k:1").await.unwrap(),
            Some("payload-1".to_string())
        );
        assert_eq!(
            cache.get_raw("k:2").await.unwrap(),
            Some("z".repeat(1024))
        );
    }
}
