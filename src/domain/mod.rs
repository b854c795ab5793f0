//! Domain layer - core types, traits, and the error taxonomy

pub mod backup;
pub mod cache;
pub mod error;
pub mod vector_store;

pub use backup::{
    BackupArchive, BackupManifest, BackupPayload, BackupState, BackupType, ComponentStatus,
    ComponentSummary, RestoreReport,
};
pub use cache::{Cache, CacheEntry, CacheExt, CacheKeyParams, CacheStats, SetOptions};
pub use error::DomainError;
pub use vector_store::{
    CollectionDescriptor, CollectionInfo, DistanceMetric, PointRecord, ScrollPage,
    VectorStoreClient,
};
