use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Connection error after {attempts} attempt(s): {message}")]
    Connection { message: String, attempts: u32 },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Vector store error: {operation} - {message}")]
    VectorStore { operation: String, message: String },

    #[error("Collection '{collection}' conflicts with required schema: {message}")]
    CollectionConflict { collection: String, message: String },

    #[error("Backup error: {message}")]
    Backup { message: String },

    #[error("Integrity check failed: {message}")]
    Integrity { message: String },

    #[error("Operation already in progress: {message}")]
    Busy { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>, attempts: u32) -> Self {
        Self::Connection {
            message: message.into(),
            attempts,
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn vector_store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::VectorStore {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn collection_conflict(
        collection: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::CollectionConflict {
            collection: collection.into(),
            message: message.into(),
        }
    }

    pub fn backup(message: impl Into<String>) -> Self {
        Self::Backup {
            message: message.into(),
        }
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    pub fn busy(message: impl Into<String>) -> Self {
        Self::Busy {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for errors that must halt subsystem initialization.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::Connection { .. } | Self::CollectionConflict { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let error = DomainError::not_found("backup 'b-123' not found");
        assert_eq!(error.to_string(), "Not found: backup 'b-123' not found");
    }

    #[test]
    fn test_connection_error_carries_attempts() {
        let error = DomainError::connection("refused", 5);
        assert_eq!(
            error.to_string(),
            "Connection error after 5 attempt(s): refused"
        );
    }

    #[test]
    fn test_collection_conflict_names_collection() {
        let error = DomainError::collection_conflict("models", "dimension 384 != 768");
        assert!(error.to_string().contains("models"));
        assert!(error.is_fatal_at_startup());
    }

    #[test]
    fn test_cache_error_not_fatal() {
        let error = DomainError::cache("disk write failed");
        assert!(!error.is_fatal_at_startup());
    }

    #[test]
    fn test_busy_error() {
        let error = DomainError::busy("a backup is already running");
        assert_eq!(
            error.to_string(),
            "Operation already in progress: a backup is already running"
        );
    }
}
