//! Model-metadata file store

pub mod file_store;

pub use file_store::MetadataFileStore;
