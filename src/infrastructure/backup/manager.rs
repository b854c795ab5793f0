//! Backup orchestration
//!
//! Fans out to the cache, vector store, configuration, and model-metadata
//! stores to build a snapshot archive, and fans back in to restore one.
//! Component failures are isolated and recorded; only archive-level problems
//! (unwritable bucket, checksum mismatch) fail a whole run. Exactly one run
//! may be in flight; a second request is rejected immediately as busy.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::backup::{
    BackupArchive, BackupManifest, BackupPayload, BackupState, BackupType, CacheFileDump,
    CacheSnapshot, CollectionDump, ComponentRestoreOutcome, ComponentSummary, DatabaseSnapshot,
    MetadataFileDump, MetadataSnapshot, RestoreReport,
};
use crate::domain::DomainError;
use crate::infrastructure::backup::store::{payload_checksum, ArchiveStore, ArchiveStoreConfig};
use crate::infrastructure::cache::CacheManager;
use crate::infrastructure::metadata::MetadataFileStore;
use crate::infrastructure::vector_store::VectorStoreManager;

/// File written to the metadata directory on restore of a config component.
/// Config snapshots are redacted, so they are surfaced for operator review
/// instead of overwriting live settings.
const RESTORED_CONFIG_FILE: &str = "restored_config.json";

#[derive(Debug, Clone)]
pub struct BackupManagerConfig {
    pub directory: PathBuf,
    pub max_backups_per_type: usize,
    pub compress: bool,
    /// Page size used when scrolling collections for a database snapshot.
    pub database_page_size: usize,
}

impl Default for BackupManagerConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("backups"),
            max_backups_per_type: 10,
            compress: false,
            database_page_size: 256,
        }
    }
}

/// Per-run options. The token is checked between component steps, so a
/// cancelled run stops at the next boundary.
#[derive(Debug, Clone, Default)]
pub struct BackupRunOptions {
    pub cancellation: CancellationToken,
}

impl BackupRunOptions {
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self { cancellation }
    }
}

#[derive(Debug)]
pub struct BackupManager {
    store: ArchiveStore,
    cache: Arc<CacheManager>,
    vector_store: Arc<VectorStoreManager>,
    metadata: Arc<MetadataFileStore>,
    /// Redacted process configuration, captured at construction.
    config_snapshot: serde_json::Value,
    config: BackupManagerConfig,
    state: Mutex<BackupState>,
}

impl BackupManager {
    pub fn new(
        config: BackupManagerConfig,
        cache: Arc<CacheManager>,
        vector_store: Arc<VectorStoreManager>,
        metadata: Arc<MetadataFileStore>,
        config_snapshot: serde_json::Value,
    ) -> Self {
        let store = ArchiveStore::new(
            ArchiveStoreConfig::new(config.directory.clone())
                .with_max_per_type(config.max_backups_per_type)
                .with_compression(config.compress),
        );
        Self {
            store,
            cache,
            vector_store,
            metadata,
            config_snapshot,
            config,
            state: Mutex::new(BackupState::Idle),
        }
    }

    pub async fn init(&self) -> Result<(), DomainError> {
        self.store.init().await
    }

    pub fn state(&self) -> BackupState {
        *self.state.lock().unwrap()
    }

    /// Claims the single run slot or rejects immediately; never queues.
    fn begin_run(&self, what: &str) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        if *state == BackupState::Running {
            return Err(DomainError::busy(format!(
                "cannot start {}: a backup or restore is already running",
                what
            )));
        }
        *state = BackupState::Running;
        Ok(())
    }

    fn finish_run(&self, outcome: BackupState) {
        *self.state.lock().unwrap() = outcome;
    }

    fn check_cancelled(options: &BackupRunOptions, what: &str) -> Result<(), DomainError> {
        if options.cancellation.is_cancelled() {
            Err(DomainError::backup(format!("{} cancelled", what)))
        } else {
            Ok(())
        }
    }

    pub async fn create_full_backup(
        &self,
        options: BackupRunOptions,
    ) -> Result<BackupManifest, DomainError> {
        self.begin_run("full backup")?;
        let result = self.run_snapshot(BackupType::Full, None, &options).await;
        self.conclude("full backup", result)
    }

    /// Captures changes since the most recent prior backup of any type.
    pub async fn create_incremental_backup(
        &self,
        options: BackupRunOptions,
    ) -> Result<BackupManifest, DomainError> {
        self.begin_run("incremental backup")?;
        let result = async {
            let base = self
                .store
                .list_manifests()
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    DomainError::backup("no prior backup exists to base an incremental on")
                })?;
            self.run_snapshot(BackupType::Incremental, Some(base), &options)
                .await
        }
        .await;
        self.conclude("incremental backup", result)
    }

    /// Lightweight backup of the redacted configuration only.
    pub async fn create_config_backup(
        &self,
        options: BackupRunOptions,
    ) -> Result<BackupManifest, DomainError> {
        self.begin_run("config backup")?;
        let result = async {
            Self::check_cancelled(&options, "config backup")?;
            let payload = BackupPayload {
                config: Some(self.config_snapshot.clone()),
                ..Default::default()
            };
            let components = vec![ComponentSummary::complete("config", 1)];
            self.persist(BackupType::Config, None, components, payload)
                .await
        }
        .await;
        self.conclude("config backup", result)
    }

    fn conclude(
        &self,
        what: &str,
        result: Result<BackupManifest, DomainError>,
    ) -> Result<BackupManifest, DomainError> {
        match result {
            Ok(manifest) => {
                self.finish_run(BackupState::Completed);
                info!(
                    backup_id = %manifest.id,
                    backup_type = %manifest.backup_type,
                    total_size = manifest.total_size,
                    "{} completed",
                    what
                );
                Ok(manifest)
            }
            Err(e) => {
                self.finish_run(BackupState::Failed);
                error!(error = %e, "{} failed", what);
                Err(e)
            }
        }
    }

    async fn run_snapshot(
        &self,
        backup_type: BackupType,
        base: Option<BackupManifest>,
        options: &BackupRunOptions,
    ) -> Result<BackupManifest, DomainError> {
        let since = base.as_ref().map(|b| b.timestamp);
        let base_id = base.map(|b| b.id);
        let mut components = Vec::new();
        let mut payload = BackupPayload::default();

        Self::check_cancelled(options, "backup")?;
        let (database, summary) = self.gather_database(since).await;
        payload.database = database;
        components.push(summary);

        Self::check_cancelled(options, "backup")?;
        let (cache, summary) = self.gather_cache(since).await;
        payload.cache = cache;
        components.push(summary);

        Self::check_cancelled(options, "backup")?;
        payload.config = Some(self.config_snapshot.clone());
        components.push(ComponentSummary::complete("config", 1));

        Self::check_cancelled(options, "backup")?;
        let (metadata, summary) = self.gather_metadata(since).await;
        payload.metadata = metadata;
        components.push(summary);

        Self::check_cancelled(options, "backup")?;
        self.persist(backup_type, base_id, components, payload).await
    }

    /// Serializes the payload, stamps the manifest, writes the archive, and
    /// prunes the retention bucket.
    async fn persist(
        &self,
        backup_type: BackupType,
        base_backup_id: Option<String>,
        components: Vec<ComponentSummary>,
        payload: BackupPayload,
    ) -> Result<BackupManifest, DomainError> {
        let payload_bytes = serde_json::to_vec(&payload)
            .map_err(|e| DomainError::backup(format!("failed to serialize payload: {}", e)))?;

        let manifest = BackupManifest {
            id: Uuid::new_v4().to_string(),
            backup_type,
            timestamp: Utc::now(),
            base_backup_id,
            components,
            total_size: payload_bytes.len() as u64,
            checksum: payload_checksum(&payload_bytes),
            compressed: self.store.compress(),
        };

        let archive = BackupArchive {
            manifest: manifest.clone(),
            payload,
        };
        self.store.write_archive(&archive).await?;
        Ok(manifest)
    }

    /// Scrolls every required collection. A single collection's failure is
    /// logged and marked partial instead of aborting the snapshot.
    async fn gather_database(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> (Option<DatabaseSnapshot>, ComponentSummary) {
        let mut snapshot = DatabaseSnapshot::default();
        let mut any_partial = false;

        for descriptor in self.vector_store.required_collections() {
            match self
                .vector_store
                .scroll_all_points(&descriptor.name, self.config.database_page_size)
                .await
            {
                Ok(points) => {
                    let (points, filter_note) = match since {
                        Some(since) => filter_points_since(points, since),
                        None => (points, None),
                    };
                    if filter_note.is_some() {
                        any_partial = true;
                    }
                    snapshot.collections.push(CollectionDump {
                        descriptor: descriptor.clone(),
                        points,
                        partial: filter_note.is_some(),
                        partial_reason: filter_note,
                    });
                }
                Err(e) => {
                    warn!(collection = %descriptor.name, error = %e, "collection snapshot failed, marking partial");
                    any_partial = true;
                    snapshot.collections.push(CollectionDump {
                        descriptor: descriptor.clone(),
                        points: Vec::new(),
                        partial: true,
                        partial_reason: Some(e.to_string()),
                    });
                }
            }
        }

        let items = snapshot.point_count();
        let summary = if any_partial {
            ComponentSummary::partial("database", items, "one or more collections partial")
        } else {
            ComponentSummary::complete("database", items)
        };
        (Some(snapshot), summary)
    }

    async fn gather_cache(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> (Option<CacheSnapshot>, ComponentSummary) {
        let files = match since {
            Some(since) => self.cache.snapshot_files_since(since).await,
            None => self.cache.snapshot_files().await,
        };

        match files {
            Ok(files) => {
                let stats = self.cache.stats_snapshot().await;
                let count = files.len() as u64;
                let snapshot = CacheSnapshot {
                    files: files
                        .into_iter()
                        .map(|(file_name, contents)| CacheFileDump {
                            file_name,
                            contents,
                        })
                        .collect(),
                    stats,
                };
                (Some(snapshot), ComponentSummary::complete("cache", count))
            }
            Err(e) => {
                warn!(error = %e, "cache snapshot failed");
                (None, ComponentSummary::failed("cache", e.to_string()))
            }
        }
    }

    async fn gather_metadata(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> (Option<MetadataSnapshot>, ComponentSummary) {
        let files = match since {
            Some(since) => self.metadata.dump_files_since(since).await,
            None => self.metadata.dump_files().await,
        };

        match files {
            Ok(files) => {
                let count = files.len() as u64;
                let snapshot = MetadataSnapshot {
                    files: files
                        .into_iter()
                        .map(|(file_name, contents)| MetadataFileDump {
                            file_name,
                            contents,
                        })
                        .collect(),
                };
                (Some(snapshot), ComponentSummary::complete("metadata", count))
            }
            Err(e) => {
                warn!(error = %e, "metadata snapshot failed");
                (None, ComponentSummary::failed("metadata", e.to_string()))
            }
        }
    }

    /// Loads and verifies an archive, then restores each included component
    /// independently. The checksum is verified before any component is
    /// touched; a mismatch aborts the whole restore.
    pub async fn restore_from_backup(
        &self,
        id: &str,
        options: BackupRunOptions,
    ) -> Result<RestoreReport, DomainError> {
        self.begin_run("restore")?;
        let result = self.run_restore(id, &options).await;
        match result {
            Ok(report) => {
                self.finish_run(BackupState::Completed);
                info!(
                    backup_id = id,
                    failed = report.failed_components().len(),
                    "restore completed"
                );
                Ok(report)
            }
            Err(e) => {
                self.finish_run(BackupState::Failed);
                error!(backup_id = id, error = %e, "restore failed");
                Err(e)
            }
        }
    }

    async fn run_restore(
        &self,
        id: &str,
        options: &BackupRunOptions,
    ) -> Result<RestoreReport, DomainError> {
        let archive = self.store.read_archive(id).await?;

        let payload_bytes = serde_json::to_vec(&archive.payload)
            .map_err(|e| DomainError::backup(format!("failed to serialize payload: {}", e)))?;
        let computed = payload_checksum(&payload_bytes);
        if computed != archive.manifest.checksum {
            return Err(DomainError::integrity(format!(
                "backup '{}' checksum mismatch: manifest {}, computed {}",
                id, archive.manifest.checksum, computed
            )));
        }

        let mut report = RestoreReport {
            backup_id: id.to_string(),
            components: Vec::new(),
        };

        if let Some(cache) = &archive.payload.cache {
            Self::check_cancelled(options, "restore")?;
            report.components.push(self.restore_cache(cache).await);
        }

        if let Some(database) = &archive.payload.database {
            Self::check_cancelled(options, "restore")?;
            report.components.push(self.restore_database(database).await);
        }

        if let Some(config) = &archive.payload.config {
            Self::check_cancelled(options, "restore")?;
            report.components.push(self.restore_config(config).await);
        }

        if let Some(metadata) = &archive.payload.metadata {
            Self::check_cancelled(options, "restore")?;
            report.components.push(self.restore_metadata(metadata).await);
        }

        Ok(report)
    }

    async fn restore_cache(&self, snapshot: &CacheSnapshot) -> ComponentRestoreOutcome {
        let files: Vec<(String, String)> = snapshot
            .files
            .iter()
            .map(|f| (f.file_name.clone(), f.contents.clone()))
            .collect();

        match self.cache.restore_files(&files).await {
            Ok(count) => ComponentRestoreOutcome {
                component: "cache".to_string(),
                success: true,
                items: count as u64,
                detail: None,
            },
            Err(e) => {
                warn!(error = %e, "cache restore failed");
                ComponentRestoreOutcome {
                    component: "cache".to_string(),
                    success: false,
                    items: 0,
                    detail: Some(e.to_string()),
                }
            }
        }
    }

    async fn restore_database(&self, snapshot: &DatabaseSnapshot) -> ComponentRestoreOutcome {
        let mut restored = 0u64;
        let mut failures = Vec::new();

        for dump in &snapshot.collections {
            let result = async {
                self.vector_store.ensure_collection(&dump.descriptor).await?;
                for chunk in dump.points.chunks(self.config.database_page_size) {
                    self.vector_store
                        .upsert_points(&dump.descriptor.name, chunk)
                        .await?;
                }
                Ok::<usize, DomainError>(dump.points.len())
            }
            .await;

            match result {
                Ok(count) => restored += count as u64,
                Err(e) => {
                    warn!(collection = %dump.descriptor.name, error = %e, "collection restore failed");
                    failures.push(format!("{}: {}", dump.descriptor.name, e));
                }
            }
        }

        ComponentRestoreOutcome {
            component: "database".to_string(),
            success: failures.is_empty(),
            items: restored,
            detail: if failures.is_empty() {
                None
            } else {
                Some(failures.join("; "))
            },
        }
    }

    async fn restore_config(&self, snapshot: &serde_json::Value) -> ComponentRestoreOutcome {
        let rendered = match serde_json::to_string_pretty(snapshot) {
            Ok(rendered) => rendered,
            Err(e) => {
                return ComponentRestoreOutcome {
                    component: "config".to_string(),
                    success: false,
                    items: 0,
                    detail: Some(e.to_string()),
                }
            }
        };

        match self.metadata.write_file(RESTORED_CONFIG_FILE, &rendered).await {
            Ok(()) => ComponentRestoreOutcome {
                component: "config".to_string(),
                success: true,
                items: 1,
                detail: Some(format!("written to {} for review", RESTORED_CONFIG_FILE)),
            },
            Err(e) => ComponentRestoreOutcome {
                component: "config".to_string(),
                success: false,
                items: 0,
                detail: Some(e.to_string()),
            },
        }
    }

    async fn restore_metadata(&self, snapshot: &MetadataSnapshot) -> ComponentRestoreOutcome {
        let mut restored = 0u64;
        let mut failures = Vec::new();

        for file in &snapshot.files {
            match self.metadata.write_file(&file.file_name, &file.contents).await {
                Ok(()) => restored += 1,
                Err(e) => {
                    warn!(file = %file.file_name, error = %e, "metadata file restore failed");
                    failures.push(format!("{}: {}", file.file_name, e));
                }
            }
        }

        ComponentRestoreOutcome {
            component: "metadata".to_string(),
            success: failures.is_empty(),
            items: restored,
            detail: if failures.is_empty() {
                None
            } else {
                Some(failures.join("; "))
            },
        }
    }

    pub async fn list_backups(&self) -> Result<Vec<BackupManifest>, DomainError> {
        self.store.list_manifests().await
    }

    pub async fn get_last_backup(&self) -> Result<Option<BackupManifest>, DomainError> {
        Ok(self.list_backups().await?.into_iter().next())
    }

    pub async fn delete_backup(&self, id: &str) -> Result<(), DomainError> {
        self.store.delete_archive(id).await
    }
}

/// Keeps points whose payload `updated_at` is after `since`. Points without
/// a parseable `updated_at` are kept and reported, erring toward
/// over-capture.
fn filter_points_since(
    points: Vec<crate::domain::vector_store::PointRecord>,
    since: DateTime<Utc>,
) -> (Vec<crate::domain::vector_store::PointRecord>, Option<String>) {
    let mut kept = Vec::new();
    let mut untracked = 0usize;

    for point in points {
        match point
            .payload
            .get("updated_at")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        {
            Some(updated_at) => {
                if updated_at.with_timezone(&Utc) > since {
                    kept.push(point);
                }
            }
            None => {
                untracked += 1;
                kept.push(point);
            }
        }
    }

    let note = if untracked > 0 {
        Some(format!(
            "{} point(s) without change tracking included in full",
            untracked
        ))
    } else {
        None
    };
    (kept, note)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::{Cache, SetOptions};
    use crate::domain::vector_store::client::mock::MockVectorStoreClient;
    use crate::domain::vector_store::{CollectionDescriptor, DistanceMetric, PointRecord};
    use crate::infrastructure::cache::CacheManagerConfig;
    use crate::infrastructure::vector_store::VectorStoreManagerConfig;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _dirs: (TempDir, TempDir, TempDir),
        cache: Arc<CacheManager>,
        client: Arc<MockVectorStoreClient>,
        metadata: Arc<MetadataFileStore>,
        manager: BackupManager,
    }

    fn descriptor(name: &str) -> CollectionDescriptor {
        CollectionDescriptor::new(name, 4, DistanceMetric::Cosine)
    }

    fn point(id: &str, updated_at: Option<&str>) -> PointRecord {
        let payload = match updated_at {
            Some(ts) => serde_json::json!({"model": id, "updated_at": ts}),
            None => serde_json::json!({"model": id}),
        };
        PointRecord {
            id: id.to_string(),
            vector: vec![0.1, 0.2, 0.3, 0.4],
            payload,
        }
    }

    async fn fixture_with(client: Arc<MockVectorStoreClient>, max_backups: usize) -> Fixture {
        let cache_dir = TempDir::new().unwrap();
        let backup_dir = TempDir::new().unwrap();
        let metadata_dir = TempDir::new().unwrap();

        let cache = Arc::new(CacheManager::new(CacheManagerConfig {
            directory: cache_dir.path().to_path_buf(),
            default_ttl: Duration::from_secs(3600),
            max_memory_entries: 16,
            ..Default::default()
        }));
        cache.init().await.unwrap();

        let vector_store = Arc::new(VectorStoreManager::new(
            client.clone(),
            VectorStoreManagerConfig {
                connect_max_attempts: 1,
                connect_base_delay: Duration::from_millis(1),
                required_collections: vec![descriptor("model_metadata")],
            },
        ));

        let metadata = Arc::new(MetadataFileStore::new(metadata_dir.path()));
        metadata.init().await.unwrap();

        let manager = BackupManager::new(
            BackupManagerConfig {
                directory: backup_dir.path().to_path_buf(),
                max_backups_per_type: max_backups,
                compress: false,
                database_page_size: 2,
            },
            cache.clone(),
            vector_store,
            metadata.clone(),
            serde_json::json!({"vector_store": {"url": "http://localhost:6333", "api_key": "***"}}),
        );
        manager.init().await.unwrap();

        Fixture {
            _dirs: (cache_dir, backup_dir, metadata_dir),
            cache,
            client,
            metadata,
            manager,
        }
    }

    async fn fixture() -> Fixture {
        let client = Arc::new(
            MockVectorStoreClient::new()
                .with_collection(descriptor("model_metadata"))
                .with_points(
                    "model_metadata",
                    vec![point("p1", None), point("p2", None), point("p3", None)],
                ),
        );
        fixture_with(client, 10).await
    }

    #[tokio::test]
    async fn test_full_backup_captures_all_components() {
        let f = fixture().await;
        f.cache
            .set_raw("gemini:models", "payload", SetOptions::new())
            .await
            .unwrap();
        f.metadata
            .write_file("gemini-pro.json", r#"{"name":"gemini-pro"}"#)
            .await
            .unwrap();

        let manifest = f
            .manager
            .create_full_backup(BackupRunOptions::default())
            .await
            .unwrap();

        assert_eq!(manifest.backup_type, BackupType::Full);
        assert_eq!(
            manifest.component_names(),
            vec!["database", "cache", "config", "metadata"]
        );
        assert_eq!(manifest.component("database").unwrap().items, 3);
        assert_eq!(manifest.component("cache").unwrap().items, 1);
        assert_eq!(manifest.checksum.len(), 64);
        assert!(manifest.total_size > 0);
        assert_eq!(f.manager.state(), BackupState::Completed);
    }

    #[tokio::test]
    async fn test_backup_restore_roundtrip_is_byte_identical() {
        let f = fixture().await;
        f.cache
            .set_raw("gemini:models", "payload-1", SetOptions::new())
            .await
            .unwrap();
        f.cache
            .set_raw("openai:models", &"big".repeat(4096), SetOptions::new())
            .await
            .unwrap();

        let before = f.cache.snapshot_files().await.unwrap();
        let manifest = f
            .manager
            .create_full_backup(BackupRunOptions::default())
            .await
            .unwrap();

        // Clobber the live cache, then restore.
        f.cache.clear().await.unwrap();
        f.cache
            .set_raw("stray:key", "junk", SetOptions::new())
            .await
            .unwrap();

        let report = f
            .manager
            .restore_from_backup(&manifest.id, BackupRunOptions::default())
            .await
            .unwrap();
        assert!(report.all_succeeded());

        let after = f.cache.snapshot_files().await.unwrap();
        assert_eq!(before, after);
        assert_eq!(
            f.cache.get_raw("gemini:models").await.unwrap(),
            Some("payload-1".to_string())
        );
        assert!(f.cache.get_raw("stray:key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupted_payload_fails_before_any_mutation() {
        let f = fixture().await;
        f.cache
            .set_raw("gemini:models", "payload-1", SetOptions::new())
            .await
            .unwrap();

        let manifest = f
            .manager
            .create_full_backup(BackupRunOptions::default())
            .await
            .unwrap();

        // Flip one byte inside the archived payload, keeping valid JSON.
        let path = f
            ._dirs
            .1
            .path()
            .join("full")
            .join(format!("{}.json", manifest.id));
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("payload-1"));
        std::fs::write(&path, contents.replace("payload-1", "payload-X")).unwrap();

        let before = f.cache.snapshot_files().await.unwrap();
        let err = f
            .manager
            .restore_from_backup(&manifest.id, BackupRunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Integrity { .. }));
        assert_eq!(f.manager.state(), BackupState::Failed);

        // The live cache was never touched.
        assert_eq!(f.cache.snapshot_files().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_collection_failure_marks_database_partial() {
        let client = Arc::new(
            MockVectorStoreClient::new()
                .with_collection(descriptor("model_metadata"))
                .failing_collection("model_metadata"),
        );
        let f = fixture_with(client, 10).await;

        let manifest = f
            .manager
            .create_full_backup(BackupRunOptions::default())
            .await
            .unwrap();

        let database = manifest.component("database").unwrap();
        assert_eq!(database.status, crate::domain::backup::ComponentStatus::Partial);
        assert_eq!(database.items, 0);
        assert_eq!(f.manager.state(), BackupState::Completed);
    }

    #[tokio::test]
    async fn test_second_backup_while_running_is_busy() {
        let client = Arc::new(
            MockVectorStoreClient::new()
                .with_collection(descriptor("model_metadata"))
                .with_scroll_delay(Duration::from_millis(200)),
        );
        let f = Arc::new(fixture_with(client, 10).await);

        let first = {
            let f = Arc::clone(&f);
            tokio::spawn(async move {
                f.manager.create_full_backup(BackupRunOptions::default()).await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = f
            .manager
            .create_full_backup(BackupRunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Busy { .. }));

        first.await.unwrap().unwrap();
        assert_eq!(f.manager.state(), BackupState::Completed);
    }

    #[tokio::test]
    async fn test_retention_keeps_only_configured_maximum() {
        let f = {
            let client = Arc::new(
                MockVectorStoreClient::new().with_collection(descriptor("model_metadata")),
            );
            fixture_with(client, 2).await
        };

        let mut ids = Vec::new();
        for _ in 0..4 {
            let manifest = f
                .manager
                .create_full_backup(BackupRunOptions::default())
                .await
                .unwrap();
            ids.push(manifest.id);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let remaining: Vec<String> = f
            .manager
            .list_backups()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(remaining, vec![ids[3].clone(), ids[2].clone()]);
    }

    #[tokio::test]
    async fn test_incremental_references_base_and_filters_cache() {
        let f = fixture().await;
        f.cache
            .set_raw("old:entry", "before-base", SetOptions::new())
            .await
            .unwrap();

        let base = f
            .manager
            .create_full_backup(BackupRunOptions::default())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        f.cache
            .set_raw("new:entry", "after-base", SetOptions::new())
            .await
            .unwrap();

        let incremental = f
            .manager
            .create_incremental_backup(BackupRunOptions::default())
            .await
            .unwrap();

        assert_eq!(incremental.backup_type, BackupType::Incremental);
        assert_eq!(incremental.base_backup_id, Some(base.id));
        assert_eq!(incremental.component("cache").unwrap().items, 1);
    }

    #[tokio::test]
    async fn test_incremental_filters_points_by_updated_at() {
        let client = Arc::new(
            MockVectorStoreClient::new()
                .with_collection(descriptor("model_metadata"))
                .with_points(
                    "model_metadata",
                    vec![point("stale", Some("2020-01-01T00:00:00Z"))],
                ),
        );
        let f = fixture_with(client, 10).await;

        f.manager
            .create_full_backup(BackupRunOptions::default())
            .await
            .unwrap();

        let incremental = f
            .manager
            .create_incremental_backup(BackupRunOptions::default())
            .await
            .unwrap();
        assert_eq!(incremental.component("database").unwrap().items, 0);
    }

    #[tokio::test]
    async fn test_incremental_without_base_fails() {
        let f = fixture().await;
        let err = f
            .manager
            .create_incremental_backup(BackupRunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Backup { .. }));
        assert_eq!(f.manager.state(), BackupState::Failed);
    }

    #[tokio::test]
    async fn test_config_backup_contains_only_config() {
        let f = fixture().await;
        let manifest = f
            .manager
            .create_config_backup(BackupRunOptions::default())
            .await
            .unwrap();

        assert_eq!(manifest.backup_type, BackupType::Config);
        assert_eq!(manifest.component_names(), vec!["config"]);

        let archive = f.manager.store.read_archive(&manifest.id).await.unwrap();
        assert!(archive.payload.database.is_none());
        assert!(archive.payload.cache.is_none());
        assert_eq!(
            archive.payload.config.unwrap()["vector_store"]["api_key"],
            "***"
        );
    }

    #[tokio::test]
    async fn test_cancelled_backup_stops_at_boundary() {
        let f = fixture().await;
        let token = CancellationToken::new();
        token.cancel();

        let err = f
            .manager
            .create_full_backup(BackupRunOptions::with_cancellation(token))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Backup { .. }));
        assert_eq!(f.manager.state(), BackupState::Failed);

        // The run slot was released.
        f.manager
            .create_full_backup(BackupRunOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_restore_upserts_points_back_into_collections() {
        let f = fixture().await;
        let manifest = f
            .manager
            .create_full_backup(BackupRunOptions::default())
            .await
            .unwrap();

        // Simulate data loss in the store.
        f.client
            .collections
            .lock()
            .unwrap()
            .get_mut("model_metadata")
            .unwrap()
            .1
            .clear();

        let report = f
            .manager
            .restore_from_backup(&manifest.id, BackupRunOptions::default())
            .await
            .unwrap();
        let database = report
            .components
            .iter()
            .find(|c| c.component == "database")
            .unwrap();
        assert!(database.success);
        assert_eq!(database.items, 3);

        let points = f
            .client
            .collections
            .lock()
            .unwrap()
            .get("model_metadata")
            .unwrap()
            .1
            .len();
        assert_eq!(points, 3);
    }

    #[tokio::test]
    async fn test_restore_writes_config_for_review() {
        let f = fixture().await;
        let manifest = f
            .manager
            .create_config_backup(BackupRunOptions::default())
            .await
            .unwrap();

        let report = f
            .manager
            .restore_from_backup(&manifest.id, BackupRunOptions::default())
            .await
            .unwrap();
        assert!(report.all_succeeded());

        let restored = f.metadata.read_file(RESTORED_CONFIG_FILE).await.unwrap();
        assert!(restored.contains("vector_store"));
    }

    #[tokio::test]
    async fn test_list_and_last_backup_ordering() {
        let f = fixture().await;
        f.manager
            .create_full_backup(BackupRunOptions::default())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = f
            .manager
            .create_config_backup(BackupRunOptions::default())
            .await
            .unwrap();

        let all = f.manager.list_backups().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(
            f.manager.get_last_backup().await.unwrap().unwrap().id,
            second.id
        );
    }

    #[tokio::test]
    async fn test_delete_backup() {
        let f = fixture().await;
        let manifest = f
            .manager
            .create_full_backup(BackupRunOptions::default())
            .await
            .unwrap();

        f.manager.delete_backup(&manifest.id).await.unwrap();
        let err = f.manager.delete_backup(&manifest.id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_restore_missing_backup_is_not_found() {
        let f = fixture().await;
        let err = f
            .manager
            .restore_from_backup("ghost", BackupRunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
