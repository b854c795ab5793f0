use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::vector_store::DistanceMetric;
use crate::domain::DomainError;

/// Application configuration
///
/// Loaded from `config/default.*` and `config/local.*` files plus
/// `DISCOVERY__`-prefixed environment variables (`__` separates sections,
/// e.g. `DISCOVERY__VECTOR_STORE__URL`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    pub url: String,
    /// Bearer credential sent as the `api-key` header; redacted in backups.
    pub api_key: Option<String>,
    pub connect_max_retries: u32,
    pub connect_base_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// Collections required before dependent components may run.
    pub collections: Vec<CollectionSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSettings {
    pub name: String,
    pub vector_dimension: u64,
    pub distance_metric: DistanceMetric,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:6333".to_string(),
            api_key: None,
            connect_max_retries: 5,
            connect_base_delay_ms: 500,
            request_timeout_secs: 30,
            collections: vec![
                CollectionSettings {
                    name: "model_metadata".to_string(),
                    vector_dimension: 768,
                    distance_metric: DistanceMetric::Cosine,
                },
                CollectionSettings {
                    name: "provider_docs".to_string(),
                    vector_dimension: 768,
                    distance_metric: DistanceMetric::Cosine,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub directory: String,
    pub default_ttl_secs: u64,
    /// Per-provider TTL overrides in seconds; faster-moving upstreams get
    /// shorter lifetimes.
    pub provider_ttl_overrides: HashMap<String, u64>,
    pub max_memory_entries: usize,
    pub compression_threshold_bytes: usize,
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: ".cache/discovery".to_string(),
            default_ttl_secs: 3600,
            provider_ttl_overrides: HashMap::new(),
            max_memory_entries: 1000,
            compression_threshold_bytes: 4096,
            sweep_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    pub directory: String,
    pub max_backups_per_type: usize,
    pub compress: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            directory: "backups".to_string(),
            max_backups_per_type: 10,
            compress: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    pub directory: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            directory: "model_metadata".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, DomainError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("DISCOVERY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| DomainError::configuration(e.to_string()))?;

        let config: AppConfig = config
            .try_deserialize()
            .map_err(|e| DomainError::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Startup validation; failures here halt the subsystem.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.vector_store.url.trim().is_empty() {
            return Err(DomainError::configuration("vector_store.url must be set"));
        }
        if !self.vector_store.url.starts_with("http://")
            && !self.vector_store.url.starts_with("https://")
        {
            return Err(DomainError::configuration(format!(
                "vector_store.url '{}' must be an http(s) URL",
                self.vector_store.url
            )));
        }
        if self.vector_store.connect_max_retries == 0 {
            return Err(DomainError::configuration(
                "vector_store.connect_max_retries must be at least 1",
            ));
        }
        for collection in &self.vector_store.collections {
            if collection.name.trim().is_empty() {
                return Err(DomainError::configuration(
                    "vector_store.collections entries must be named",
                ));
            }
            if collection.vector_dimension == 0 {
                return Err(DomainError::configuration(format!(
                    "collection '{}' must have a non-zero vector dimension",
                    collection.name
                )));
            }
        }
        if self.cache.max_memory_entries == 0 {
            return Err(DomainError::configuration(
                "cache.max_memory_entries must be at least 1",
            ));
        }
        if self.backup.max_backups_per_type == 0 {
            return Err(DomainError::configuration(
                "backup.max_backups_per_type must be at least 1",
            ));
        }
        Ok(())
    }

    /// The configuration as included in backups, with secret-bearing fields
    /// replaced before serialization ever leaves the process.
    pub fn redacted_snapshot(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Some(api_key) = value.pointer_mut("/vector_store/api_key") {
            if !api_key.is_null() {
                *api_key = serde_json::Value::String("***".to_string());
            }
        }
        value
    }
}
