//! Cache trait definition

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::domain::cache::CacheStats;
use crate::domain::DomainError;

/// Per-write options.
///
/// An unset `ttl` falls back to the provider override table and then to the
/// configured default. `memory_only` skips disk persistence entirely.
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    pub ttl: Option<Duration>,
    pub memory_only: bool,
    pub provider: Option<String>,
    pub content_type: Option<String>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn memory_only(mut self) -> Self {
        self.memory_only = true;
        self
    }

    pub fn for_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Keyed payload cache with per-entry expiry.
///
/// Implementations serve reads through a fast tier backed by a persistent
/// one. Storage-level failures degrade (logged, memory-only) rather than
/// propagate; `get` on a failing disk tier is a miss, never an error.
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    /// Looks up a live entry by logical key.
    async fn get_raw(&self, logical_key: &str) -> Result<Option<String>, DomainError>;

    /// Stores a payload under a logical key.
    async fn set_raw(
        &self,
        logical_key: &str,
        payload: &str,
        options: SetOptions,
    ) -> Result<(), DomainError>;

    /// Removes an entry from every tier; absence in either tier is fine.
    async fn delete(&self, logical_key: &str) -> Result<bool, DomainError>;

    /// Deletes entries whose logical key matches a `*` glob pattern.
    async fn invalidate_pattern(&self, pattern: &str) -> Result<usize, DomainError>;

    /// Wipes all tiers.
    async fn clear(&self) -> Result<(), DomainError>;

    /// Current counters.
    async fn stats(&self) -> Result<CacheStats, DomainError>;
}

/// Typed get/set helpers layered over the raw string interface.
pub trait CacheExt: Cache {
    fn get_json<'a, V>(
        &'a self,
        logical_key: &'a str,
    ) -> impl std::future::Future<Output = Result<Option<V>, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            match self.get_raw(logical_key).await? {
                Some(payload) => {
                    let value: V = serde_json::from_str(&payload).map_err(|e| {
                        DomainError::cache(format!(
                            "failed to deserialize cached value for '{}': {}",
                            logical_key, e
                        ))
                    })?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        }
    }

    fn set_json<'a, V>(
        &'a self,
        logical_key: &'a str,
        value: &'a V,
        options: SetOptions,
    ) -> impl std::future::Future<Output = Result<(), DomainError>> + Send
    where
        V: Serialize + Send + Sync,
    {
        async move {
            let payload = serde_json::to_string(value).map_err(|e| {
                DomainError::cache(format!(
                    "failed to serialize value for '{}': {}",
                    logical_key, e
                ))
            })?;
            self.set_raw(logical_key, &payload, options).await
        }
    }
}

impl<T: Cache + ?Sized> CacheExt for T {}
