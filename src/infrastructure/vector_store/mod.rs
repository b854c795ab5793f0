//! Vector store infrastructure - HTTP client and lifecycle manager

pub mod http;
pub mod manager;

pub use http::{VectorStoreHttpClient, VectorStoreHttpConfig};
pub use manager::{VectorStoreManager, VectorStoreManagerConfig};
