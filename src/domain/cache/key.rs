//! Logical cache key construction and hashing
//!
//! Logical keys name what was asked of an upstream source, e.g.
//! `gemini:models:page=2`. They are hashed before storage so the hash can
//! double as a disk file name and so request parameters never leak into the
//! cache directory listing.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

/// Hashes a logical key into the stable hex form used by both tiers.
pub fn hash_logical_key(logical_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(logical_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Builder for logical cache keys from request identity.
///
/// Components are kept sorted so the same request always produces the same
/// key regardless of argument order.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyParams {
    /// Upstream provider name (e.g. "gemini", "artificialanalysis").
    pub provider: String,
    /// Endpoint or operation within the provider.
    pub endpoint: String,
    /// Request parameters that affect the response.
    pub components: BTreeMap<String, String>,
}

impl CacheKeyParams {
    pub fn new(provider: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            endpoint: endpoint.into(),
            components: BTreeMap::new(),
        }
    }

    pub fn with_component(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.components.insert(key.into(), value.into());
        self
    }

    /// The human-readable logical key.
    pub fn logical_key(&self) -> String {
        let mut parts = vec![self.provider.clone(), self.endpoint.clone()];
        for (k, v) in &self.components {
            parts.push(format!("{}={}", k, v));
        }
        parts.join(":")
    }

    /// The hashed form used for storage.
    pub fn hashed_key(&self) -> String {
        hash_logical_key(&self.logical_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_key_layout() {
        let params = CacheKeyParams::new("gemini", "ask").with_component("prompt", "hello");
        assert_eq!(params.logical_key(), "gemini:ask:prompt=hello");
    }

    #[test]
    fn test_components_are_sorted() {
        let a = CacheKeyParams::new("p", "e")
            .with_component("zebra", "z")
            .with_component("apple", "a");
        let b = CacheKeyParams::new("p", "e")
            .with_component("apple", "a")
            .with_component("zebra", "z");
        assert_eq!(a.logical_key(), b.logical_key());
        assert_eq!(a.logical_key(), "p:e:apple=a:zebra=z");
    }

    #[test]
    fn test_hash_is_stable_and_hex() {
        let h1 = hash_logical_key("gemini:ask:hello");
        let h2 = hash_logical_key("gemini:ask:hello");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_different_keys_hash_differently() {
        assert_ne!(
            hash_logical_key("gemini:ask:hello"),
            hash_logical_key("gemini:ask:world")
        );
    }
}
