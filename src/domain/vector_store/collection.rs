//! Collection and point models for the remote vector store

use serde::{Deserialize, Serialize};

/// Distance metric for vector similarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    Cosine,
    Dot,
    Euclidean,
}

impl DistanceMetric {
    /// Wire name used by the store's collection API.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::Cosine => "Cosine",
            Self::Dot => "Dot",
            Self::Euclidean => "Euclid",
        }
    }

    pub fn from_api_str(value: &str) -> Option<Self> {
        match value {
            "Cosine" => Some(Self::Cosine),
            "Dot" => Some(Self::Dot),
            "Euclid" | "Euclidean" => Some(Self::Euclidean),
            _ => None,
        }
    }
}

/// The identity and schema of a named collection.
///
/// Creation against an existing collection with an equal descriptor is a
/// no-op success; an unequal descriptor is a schema conflict requiring
/// operator intervention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    pub name: String,
    pub vector_dimension: u64,
    pub distance_metric: DistanceMetric,
}

impl CollectionDescriptor {
    pub fn new(
        name: impl Into<String>,
        vector_dimension: u64,
        distance_metric: DistanceMetric,
    ) -> Self {
        Self {
            name: name.into(),
            vector_dimension,
            distance_metric,
        }
    }

    /// True when an existing collection can satisfy this descriptor.
    pub fn is_compatible_with(&self, other: &CollectionDescriptor) -> bool {
        self.name == other.name
            && self.vector_dimension == other.vector_dimension
            && self.distance_metric == other.distance_metric
    }
}

/// Live collection state as reported by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub descriptor: CollectionDescriptor,
    pub points_count: u64,
    pub status: String,
}

/// A stored point with its vector and payload, as read by scroll and
/// re-inserted on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub id: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// One page of a scroll read. `next_cursor` is the store's opaque
/// continuation id; `None` means the collection is exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScrollPage {
    pub points: Vec<PointRecord>,
    pub next_cursor: Option<String>,
}
