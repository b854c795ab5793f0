//! Persistent disk cache tier
//!
//! One JSON file per hashed key under the cache directory. Payloads above
//! the compression threshold are gzip-compressed and base64-encoded before
//! serialization; readers see the decompressed payload. The tier is not
//! size-bounded; expired and unparseable files are removed by `sweep`.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, warn};

use crate::domain::cache::CacheEntry;
use crate::domain::DomainError;

const ENTRY_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct DiskTierConfig {
    pub directory: PathBuf,
    /// Payloads at or above this many bytes are compressed before persisting.
    pub compression_threshold: usize,
}

impl DiskTierConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            compression_threshold: 4096,
        }
    }

    pub fn with_compression_threshold(mut self, threshold: usize) -> Self {
        self.compression_threshold = threshold;
        self
    }
}

/// Result of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub expired: u64,
    pub corrupt: u64,
}

#[derive(Debug)]
pub struct DiskTier {
    config: DiskTierConfig,
}

impl DiskTier {
    pub fn new(config: DiskTierConfig) -> Self {
        Self { config }
    }

    pub async fn init(&self) -> Result<(), DomainError> {
        tokio::fs::create_dir_all(&self.config.directory)
            .await
            .map_err(|e| {
                DomainError::cache(format!(
                    "failed to create cache directory '{}': {}",
                    self.config.directory.display(),
                    e
                ))
            })
    }

    fn path_for(&self, hashed_key: &str) -> PathBuf {
        self.config
            .directory
            .join(format!("{}.{}", hashed_key, ENTRY_EXTENSION))
    }

    /// Reads a live entry with its payload decompressed. Unparseable files
    /// are removed and reported as absent; expired entries are reported as
    /// absent but left for the sweep.
    pub async fn read(&self, hashed_key: &str) -> Result<Option<CacheEntry>, DomainError> {
        let path = self.path_for(hashed_key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DomainError::cache(format!(
                    "failed to read cache file '{}': {}",
                    path.display(),
                    e
                )))
            }
        };

        let mut entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "removing corrupt cache file");
                let _ = tokio::fs::remove_file(&path).await;
                return Ok(None);
            }
        };

        if entry.is_expired() {
            return Ok(None);
        }

        if entry.compressed {
            match decompress_payload(&entry.payload) {
                Ok(payload) => {
                    entry.payload = payload;
                    entry.compressed = false;
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "removing undecodable cache file");
                    let _ = tokio::fs::remove_file(&path).await;
                    return Ok(None);
                }
            }
        }

        Ok(Some(entry))
    }

    /// Persists an entry, compressing the payload when it crosses the
    /// threshold. Same-key writes are last-writer-wins.
    pub async fn write(&self, entry: &CacheEntry) -> Result<(), DomainError> {
        let mut stored = entry.clone();
        if stored.payload.len() >= self.config.compression_threshold {
            stored.payload = compress_payload(&stored.payload)?;
            stored.compressed = true;
        }

        let serialized = serde_json::to_string(&stored)
            .map_err(|e| DomainError::cache(format!("failed to serialize cache entry: {}", e)))?;

        let path = self.path_for(&stored.key);
        tokio::fs::write(&path, serialized).await.map_err(|e| {
            DomainError::cache(format!(
                "failed to write cache file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    pub async fn remove(&self, hashed_key: &str) -> Result<bool, DomainError> {
        let path = self.path_for(hashed_key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DomainError::cache(format!(
                "failed to remove cache file '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    pub async fn clear(&self) -> Result<(), DomainError> {
        for path in self.entry_paths().await? {
            tokio::fs::remove_file(&path).await.map_err(|e| {
                DomainError::cache(format!(
                    "failed to remove cache file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    pub async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.entry_paths().await?.len())
    }

    /// Deletes every file whose entry has expired and every file that fails
    /// to parse.
    pub async fn sweep(&self) -> Result<SweepOutcome, DomainError> {
        let mut outcome = SweepOutcome::default();

        for path in self.entry_paths().await? {
            let raw = match tokio::fs::read_to_string(&path).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "unreadable cache file during sweep");
                    continue;
                }
            };

            match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) if entry.is_expired() => {
                    if tokio::fs::remove_file(&path).await.is_ok() {
                        outcome.expired += 1;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(file = %path.display(), error = %e, "sweeping corrupt cache file");
                    if tokio::fs::remove_file(&path).await.is_ok() {
                        outcome.corrupt += 1;
                    }
                }
            }
        }

        Ok(outcome)
    }

    /// Verbatim (file name, contents) pairs for backup.
    pub async fn dump_files(&self) -> Result<Vec<(String, String)>, DomainError> {
        let mut files = Vec::new();
        for path in self.entry_paths().await? {
            let name = file_name_of(&path)?;
            let contents = tokio::fs::read_to_string(&path).await.map_err(|e| {
                DomainError::cache(format!(
                    "failed to read cache file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            files.push((name, contents));
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    /// Like `dump_files`, but only entries created after `since`. Files that
    /// fail to parse are skipped (the sweep will claim them).
    pub async fn dump_files_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, DomainError> {
        let mut files = Vec::new();
        for (name, contents) in self.dump_files().await? {
            match serde_json::from_str::<CacheEntry>(&contents) {
                Ok(entry) if entry.created_at > since => files.push((name, contents)),
                Ok(_) => {}
                Err(_) => {}
            }
        }
        Ok(files)
    }

    /// Rewrites a file verbatim, as captured by `dump_files`. File names are
    /// validated against traversal.
    pub async fn restore_file(&self, file_name: &str, contents: &str) -> Result<(), DomainError> {
        if file_name.contains(['/', '\\']) || file_name.contains("..") {
            return Err(DomainError::validation(format!(
                "invalid cache file name '{}'",
                file_name
            )));
        }
        let path = self.config.directory.join(file_name);
        tokio::fs::write(&path, contents).await.map_err(|e| {
            DomainError::cache(format!(
                "failed to restore cache file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    async fn entry_paths(&self) -> Result<Vec<PathBuf>, DomainError> {
        let mut paths = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.config.directory).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(paths),
            Err(e) => {
                return Err(DomainError::cache(format!(
                    "failed to list cache directory '{}': {}",
                    self.config.directory.display(),
                    e
                )))
            }
        };

        while let Some(item) = dir.next_entry().await.map_err(|e| {
            DomainError::cache(format!("failed to iterate cache directory: {}", e))
        })? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION) {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

fn file_name_of(path: &Path) -> Result<String, DomainError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .ok_or_else(|| DomainError::cache(format!("non-utf8 cache file name: {}", path.display())))
}

fn compress_payload(payload: &str) -> Result<String, DomainError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(payload.as_bytes())
        .and_then(|_| encoder.finish())
        .map(|bytes| BASE64.encode(bytes))
        .map_err(|e| DomainError::cache(format!("failed to compress payload: {}", e)))
}

fn decompress_payload(payload: &str) -> Result<String, DomainError> {
    let bytes = BASE64
        .decode(payload)
        .map_err(|e| DomainError::cache(format!("failed to decode compressed payload: {}", e)))?;
    let mut decoder = GzDecoder::new(bytes.as_slice());
    let mut decompressed = String::new();
    decoder
        .read_to_string(&mut decompressed)
        .map_err(|e| DomainError::cache(format!("failed to decompress payload: {}", e)))?;
    Ok(decompressed)
}
