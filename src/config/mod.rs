pub mod app_config;

pub use app_config::{
    AppConfig, BackupConfig, CacheConfig, CollectionSettings, LogFormat, LoggingConfig,
    MetadataConfig, VectorStoreConfig,
};
