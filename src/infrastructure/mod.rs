//! Infrastructure layer - storage, remote service, and logging implementations

pub mod backup;
pub mod cache;
pub mod logging;
pub mod metadata;
pub mod vector_store;
