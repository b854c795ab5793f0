//! Intelligent Discovery - persistence subsystem
//!
//! The stateful core of a model-metadata discovery tool:
//! - a two-tier (memory + disk) cache for upstream API and embedding results
//! - lifecycle management for named collections in a remote vector store
//! - full/incremental/config backups with checksum-verified restore
//!
//! Everything lives in one [`Subsystem`] instance owned for the process
//! lifetime and injected into callers; there are no ambient globals.

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use domain::vector_store::VectorStoreClient;
use domain::DomainError;
use infrastructure::backup::{BackupManager, BackupManagerConfig};
use infrastructure::cache::{CacheManager, CacheManagerConfig};
use infrastructure::metadata::MetadataFileStore;
use infrastructure::vector_store::{
    VectorStoreHttpClient, VectorStoreHttpConfig, VectorStoreManager, VectorStoreManagerConfig,
};

/// The initialized persistence subsystem.
///
/// Construction is fail-fast: a missing vector store, exhausted connection
/// retries, or a conflicting collection schema halts startup entirely.
#[derive(Debug)]
pub struct Subsystem {
    pub config: AppConfig,
    pub cache: Arc<CacheManager>,
    pub vector_store: Arc<VectorStoreManager>,
    pub metadata: Arc<MetadataFileStore>,
    pub backup: Arc<BackupManager>,
    sweeper: tokio::task::JoinHandle<()>,
}

impl Subsystem {
    /// Builds the HTTP client from configuration and initializes everything.
    pub async fn initialize(config: AppConfig) -> Result<Self, DomainError> {
        let http_config = {
            let vs = &config.vector_store;
            let mut http = VectorStoreHttpConfig::new(vs.url.clone())
                .with_request_timeout(Duration::from_secs(vs.request_timeout_secs));
            if let Some(api_key) = &vs.api_key {
                http = http.with_api_key(api_key.clone());
            }
            http
        };
        let client = Arc::new(VectorStoreHttpClient::new(http_config)?);
        Self::initialize_with_client(config, client).await
    }

    /// Initialization against an injected store client; the seam tests use.
    pub async fn initialize_with_client(
        config: AppConfig,
        client: Arc<dyn VectorStoreClient>,
    ) -> Result<Self, DomainError> {
        config.validate()?;

        let cache = Arc::new(CacheManager::new(CacheManagerConfig {
            directory: config.cache.directory.clone().into(),
            default_ttl: Duration::from_secs(config.cache.default_ttl_secs),
            provider_ttl: config
                .cache
                .provider_ttl_overrides
                .iter()
                .map(|(provider, secs)| (provider.clone(), Duration::from_secs(*secs)))
                .collect(),
            max_memory_entries: config.cache.max_memory_entries,
            compression_threshold: config.cache.compression_threshold_bytes,
            sweep_interval: Duration::from_secs(config.cache.sweep_interval_secs),
        }));
        cache.init().await?;

        let vector_store = Arc::new(VectorStoreManager::new(
            client,
            VectorStoreManagerConfig {
                connect_max_attempts: config.vector_store.connect_max_retries,
                connect_base_delay: Duration::from_millis(config.vector_store.connect_base_delay_ms),
                required_collections: config
                    .vector_store
                    .collections
                    .iter()
                    .map(|c| {
                        domain::vector_store::CollectionDescriptor::new(
                            c.name.clone(),
                            c.vector_dimension,
                            c.distance_metric,
                        )
                    })
                    .collect(),
            },
        ));
        vector_store.connect().await?;
        vector_store.initialize_collections().await?;

        let metadata = Arc::new(MetadataFileStore::new(config.metadata.directory.clone()));
        metadata.init().await?;

        let backup = Arc::new(BackupManager::new(
            BackupManagerConfig {
                directory: config.backup.directory.clone().into(),
                max_backups_per_type: config.backup.max_backups_per_type,
                compress: config.backup.compress,
                database_page_size: 256,
            },
            cache.clone(),
            vector_store.clone(),
            metadata.clone(),
            config.redacted_snapshot(),
        ));
        backup.init().await?;

        let sweeper = cache.spawn_sweeper();
        info!("persistence subsystem initialized");

        Ok(Self {
            config,
            cache,
            vector_store,
            metadata,
            backup,
            sweeper,
        })
    }

    /// Stops the background sweep and releases the store connection.
    pub fn shutdown(&self) {
        self.sweeper.abort();
        self.vector_store.disconnect();
        info!("persistence subsystem shut down");
    }
}
