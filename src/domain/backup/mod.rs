//! Backup domain - manifests, payload sub-documents, run state

pub mod manifest;

pub use manifest::{
    BackupArchive, BackupManifest, BackupPayload, BackupState, BackupType, CacheFileDump,
    CacheSnapshot, CollectionDump, ComponentRestoreOutcome, ComponentStatus, ComponentSummary,
    DatabaseSnapshot, MetadataFileDump, MetadataSnapshot, RestoreReport,
};
