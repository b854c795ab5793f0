//! Directory of model-metadata JSON files
//!
//! The discovery pipeline writes one JSON document per model/provider here;
//! this store only needs enough surface for the backup manager: enumerate,
//! read, and rewrite files. Names are validated so archive contents can
//! never escape the directory.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::DomainError;

const METADATA_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct MetadataFileStore {
    directory: PathBuf,
}

impl MetadataFileStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub async fn init(&self) -> Result<(), DomainError> {
        tokio::fs::create_dir_all(&self.directory).await.map_err(|e| {
            DomainError::configuration(format!(
                "failed to create metadata directory '{}': {}",
                self.directory.display(),
                e
            ))
        })
    }

    fn validate_name(file_name: &str) -> Result<(), DomainError> {
        if file_name.is_empty()
            || file_name.contains(['/', '\\'])
            || file_name.contains("..")
        {
            return Err(DomainError::validation(format!(
                "invalid metadata file name '{}'",
                file_name
            )));
        }
        Ok(())
    }

    pub async fn list_files(&self) -> Result<Vec<String>, DomainError> {
        let mut names = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.directory).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => {
                return Err(DomainError::internal(format!(
                    "failed to list metadata directory '{}': {}",
                    self.directory.display(),
                    e
                )))
            }
        };

        while let Some(item) = dir.next_entry().await.map_err(|e| {
            DomainError::internal(format!("failed to iterate metadata directory: {}", e))
        })? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) == Some(METADATA_EXTENSION) {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub async fn read_file(&self, file_name: &str) -> Result<String, DomainError> {
        Self::validate_name(file_name)?;
        let path = self.directory.join(file_name);
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DomainError::not_found(format!("metadata file '{}' not found", file_name))
            } else {
                DomainError::internal(format!(
                    "failed to read metadata file '{}': {}",
                    path.display(),
                    e
                ))
            }
        })
    }

    pub async fn write_file(&self, file_name: &str, contents: &str) -> Result<(), DomainError> {
        Self::validate_name(file_name)?;
        self.init().await?;
        let path = self.directory.join(file_name);
        tokio::fs::write(&path, contents).await.map_err(|e| {
            DomainError::internal(format!(
                "failed to write metadata file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// (file name, contents) pairs for backup.
    pub async fn dump_files(&self) -> Result<Vec<(String, String)>, DomainError> {
        let mut files = Vec::new();
        for name in self.list_files().await? {
            let contents = self.read_file(&name).await?;
            files.push((name, contents));
        }
        Ok(files)
    }

    /// Files modified after `since`, by filesystem mtime. Files whose mtime
    /// cannot be read are included, which errs toward over-capture.
    pub async fn dump_files_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, DomainError> {
        let mut files = Vec::new();
        for name in self.list_files().await? {
            let path = self.directory.join(&name);
            let modified_after = match tokio::fs::metadata(&path)
                .await
                .and_then(|m| m.modified())
            {
                Ok(mtime) => DateTime::<Utc>::from(mtime) > since,
                Err(e) => {
                    warn!(file = name, error = %e, "metadata mtime unavailable, including file");
                    true
                }
            };
            if modified_after {
                let contents = self.read_file(&name).await?;
                files.push((name, contents));
            }
        }
        Ok(files)
    }
}
