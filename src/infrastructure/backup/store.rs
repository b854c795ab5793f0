//! Backup archive persistence
//!
//! Archives live under the backup root, one subdirectory per backup type.
//! An archive file is the JSON-serialized `BackupArchive` (manifest plus
//! payload), optionally gzip-compressed (`.json` vs `.json.gz`). Retention
//! prunes each bucket to its configured maximum, oldest manifest first.

use std::io::{Read, Write};
use std::path::PathBuf;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::domain::backup::{BackupArchive, BackupManifest, BackupType};
use crate::domain::DomainError;

/// Hex sha256 over the serialized payload, the value stored in and verified
/// against the manifest.
pub fn payload_checksum(payload_bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload_bytes);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct ArchiveStoreConfig {
    pub root: PathBuf,
    pub max_per_type: usize,
    pub compress: bool,
}

impl ArchiveStoreConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_per_type: 10,
            compress: false,
        }
    }

    pub fn with_max_per_type(mut self, max: usize) -> Self {
        self.max_per_type = max.max(1);
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

#[derive(Debug)]
pub struct ArchiveStore {
    config: ArchiveStoreConfig,
}

impl ArchiveStore {
    pub fn new(config: ArchiveStoreConfig) -> Self {
        Self { config }
    }

    pub fn compress(&self) -> bool {
        self.config.compress
    }

    pub async fn init(&self) -> Result<(), DomainError> {
        for backup_type in BackupType::all() {
            let bucket = self.bucket_dir(backup_type);
            tokio::fs::create_dir_all(&bucket).await.map_err(|e| {
                DomainError::configuration(format!(
                    "failed to create backup bucket '{}': {}",
                    bucket.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    fn bucket_dir(&self, backup_type: BackupType) -> PathBuf {
        self.config.root.join(backup_type.bucket())
    }

    fn archive_path(&self, backup_type: BackupType, id: &str, compressed: bool) -> PathBuf {
        let extension = if compressed { "json.gz" } else { "json" };
        self.bucket_dir(backup_type).join(format!("{}.{}", id, extension))
    }

    /// Persists an archive into its type bucket and prunes the bucket to the
    /// retention maximum. Write failures here are fatal to the backup run.
    pub async fn write_archive(&self, archive: &BackupArchive) -> Result<PathBuf, DomainError> {
        let serialized = serde_json::to_vec(archive)
            .map_err(|e| DomainError::backup(format!("failed to serialize archive: {}", e)))?;

        let bytes = if archive.manifest.compressed {
            gzip_bytes(&serialized)?
        } else {
            serialized
        };

        let path = self.archive_path(
            archive.manifest.backup_type,
            &archive.manifest.id,
            archive.manifest.compressed,
        );
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            DomainError::backup(format!(
                "failed to write archive '{}': {}",
                path.display(),
                e
            ))
        })?;

        self.prune_bucket(archive.manifest.backup_type).await?;
        Ok(path)
    }

    /// Loads an archive by id, searching every bucket.
    pub async fn read_archive(&self, id: &str) -> Result<BackupArchive, DomainError> {
        for backup_type in BackupType::all() {
            for compressed in [false, true] {
                let path = self.archive_path(backup_type, id, compressed);
                let bytes = match tokio::fs::read(&path).await {
                    Ok(bytes) => bytes,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => {
                        return Err(DomainError::backup(format!(
                            "failed to read archive '{}': {}",
                            path.display(),
                            e
                        )))
                    }
                };

                let decoded = if compressed { gunzip_bytes(&bytes)? } else { bytes };
                return serde_json::from_slice(&decoded).map_err(|e| {
                    DomainError::backup(format!(
                        "failed to parse archive '{}': {}",
                        path.display(),
                        e
                    ))
                });
            }
        }
        Err(DomainError::not_found(format!("backup '{}' not found", id)))
    }

    /// All persisted manifests, newest first. Unreadable archives are
    /// skipped with a log record rather than failing the listing.
    pub async fn list_manifests(&self) -> Result<Vec<BackupManifest>, DomainError> {
        let mut manifests = Vec::new();

        for backup_type in BackupType::all() {
            let bucket = self.bucket_dir(backup_type);
            let mut dir = match tokio::fs::read_dir(&bucket).await {
                Ok(dir) => dir,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(DomainError::backup(format!(
                        "failed to list bucket '{}': {}",
                        bucket.display(),
                        e
                    )))
                }
            };

            while let Some(item) = dir.next_entry().await.map_err(|e| {
                DomainError::backup(format!("failed to iterate bucket: {}", e))
            })? {
                let path = item.path();
                let name = match path.file_name().and_then(|n| n.to_str()) {
                    Some(name) => name,
                    None => continue,
                };
                let (id, compressed) = match name.strip_suffix(".json.gz") {
                    Some(id) => (id, true),
                    None => match name.strip_suffix(".json") {
                        Some(id) => (id, false),
                        None => continue,
                    },
                };

                match self.read_manifest_at(&path, compressed).await {
                    Ok(manifest) => manifests.push(manifest),
                    Err(e) => {
                        warn!(archive = id, error = %e, "skipping unreadable archive");
                    }
                }
            }
        }

        manifests.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(manifests)
    }

    async fn read_manifest_at(
        &self,
        path: &std::path::Path,
        compressed: bool,
    ) -> Result<BackupManifest, DomainError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DomainError::backup(format!("failed to read archive: {}", e)))?;
        let decoded = if compressed { gunzip_bytes(&bytes)? } else { bytes };
        let archive: BackupArchive = serde_json::from_slice(&decoded)
            .map_err(|e| DomainError::backup(format!("failed to parse archive: {}", e)))?;
        Ok(archive.manifest)
    }

    /// Removes the oldest archives of a type beyond the retention maximum.
    pub async fn prune_bucket(&self, backup_type: BackupType) -> Result<Vec<String>, DomainError> {
        let mut manifests: Vec<BackupManifest> = self
            .list_manifests()
            .await?
            .into_iter()
            .filter(|m| m.backup_type == backup_type)
            .collect();

        // Newest first; everything past the maximum goes.
        let mut removed = Vec::new();
        while manifests.len() > self.config.max_per_type {
            let Some(oldest) = manifests.pop() else { break };
            self.delete_archive(&oldest.id).await?;
            info!(backup_id = %oldest.id, backup_type = %backup_type, "pruned backup beyond retention limit");
            removed.push(oldest.id);
        }
        Ok(removed)
    }

    pub async fn delete_archive(&self, id: &str) -> Result<(), DomainError> {
        for backup_type in BackupType::all() {
            for compressed in [false, true] {
                let path = self.archive_path(backup_type, id, compressed);
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => return Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => {
                        return Err(DomainError::backup(format!(
                            "failed to delete archive '{}': {}",
                            path.display(),
                            e
                        )))
                    }
                }
            }
        }
        Err(DomainError::not_found(format!("backup '{}' not found", id)))
    }
}

fn gzip_bytes(bytes: &[u8]) -> Result<Vec<u8>, DomainError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .and_then(|_| encoder.finish())
        .map_err(|e| DomainError::backup(format!("failed to compress archive: {}", e)))
}

fn gunzip_bytes(bytes: &[u8]) -> Result<Vec<u8>, DomainError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut decoded = Vec::new();
    decoder
        .read_to_end(&mut decoded)
        .map_err(|e| DomainError::backup(format!("failed to decompress archive: {}", e)))?;
    Ok(decoded)
}
