//! Vector store domain - collection descriptors, point records, client trait

pub mod client;
pub mod collection;

pub use client::VectorStoreClient;
pub use collection::{
    CollectionDescriptor, CollectionInfo, DistanceMetric, PointRecord, ScrollPage,
};
