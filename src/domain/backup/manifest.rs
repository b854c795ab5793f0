//! Backup manifest and payload model
//!
//! A backup persists as one archive file: the manifest describing what was
//! captured plus the payload holding each component's sub-document. The
//! manifest checksum is computed over the serialized payload and verified
//! before any restore touches a live component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::cache::CacheStats;
use crate::domain::vector_store::{CollectionDescriptor, PointRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    Full,
    Incremental,
    Config,
}

impl BackupType {
    /// Retention bucket directory name under the backup root.
    pub fn bucket(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
            Self::Config => "config",
        }
    }

    pub fn all() -> [BackupType; 3] {
        [Self::Full, Self::Incremental, Self::Config]
    }
}

impl std::fmt::Display for BackupType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.bucket())
    }
}

/// Lifecycle of the backup runner. Exactly one run may be `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupState {
    Idle,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Complete,
    /// Captured, but some contributors were skipped (e.g. one collection
    /// failed to scroll, or incremental filtering could not apply).
    Partial,
    Failed,
}

/// Per-component outcome recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSummary {
    pub name: String,
    pub status: ComponentStatus,
    pub items: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ComponentSummary {
    pub fn complete(name: impl Into<String>, items: u64) -> Self {
        Self {
            name: name.into(),
            status: ComponentStatus::Complete,
            items,
            detail: None,
        }
    }

    pub fn partial(name: impl Into<String>, items: u64, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ComponentStatus::Partial,
            items,
            detail: Some(detail.into()),
        }
    }

    pub fn failed(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ComponentStatus::Failed,
            items: 0,
            detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupManifest {
    pub id: String,
    pub backup_type: BackupType,
    pub timestamp: DateTime<Utc>,
    /// For incremental backups, the manifest this one diffs against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_backup_id: Option<String>,
    pub components: Vec<ComponentSummary>,
    /// Serialized payload size in bytes, before archive compression.
    pub total_size: u64,
    /// Hex sha256 over the serialized payload.
    pub checksum: String,
    pub compressed: bool,
}

impl BackupManifest {
    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn component(&self, name: &str) -> Option<&ComponentSummary> {
        self.components.iter().find(|c| c.name == name)
    }
}

/// One collection's contribution to a database snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDump {
    pub descriptor: CollectionDescriptor,
    pub points: Vec<PointRecord>,
    #[serde(default)]
    pub partial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub collections: Vec<CollectionDump>,
}

impl DatabaseSnapshot {
    pub fn point_count(&self) -> u64 {
        self.collections.iter().map(|c| c.points.len() as u64).sum()
    }
}

/// A disk-tier cache file captured verbatim, so restore reproduces the
/// original bytes exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheFileDump {
    pub file_name: String,
    pub contents: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub files: Vec<CacheFileDump>,
    pub stats: CacheStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataFileDump {
    pub file_name: String,
    pub contents: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    pub files: Vec<MetadataFileDump>,
}

/// Per-component sub-documents. Absent components were not part of this
/// backup (e.g. a config-only backup has only `config`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataSnapshot>,
}

/// The unit persisted on disk: manifest plus payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupArchive {
    pub manifest: BackupManifest,
    pub payload: BackupPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRestoreOutcome {
    pub component: String,
    pub success: bool,
    pub items: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Restore reports which components succeeded and which failed instead of
/// collapsing to all-or-nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub backup_id: String,
    pub components: Vec<ComponentRestoreOutcome>,
}

impl RestoreReport {
    pub fn all_succeeded(&self) -> bool {
        self.components.iter().all(|c| c.success)
    }

    pub fn failed_components(&self) -> Vec<&str> {
        self.components
            .iter()
            .filter(|c| !c.success)
            .map(|c| c.component.as_str())
            .collect()
    }
}
