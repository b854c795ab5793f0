//! Client trait for the remote vector-similarity service
//!
//! The manager programs against this trait so tests can run without a live
//! store; the HTTP implementation lives in `infrastructure::vector_store`.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::vector_store::{CollectionDescriptor, CollectionInfo, PointRecord, ScrollPage};
use crate::domain::DomainError;

#[async_trait]
pub trait VectorStoreClient: Send + Sync + Debug {
    /// Lightweight status request; `Ok` means the service answered with a
    /// recognized healthy shape.
    async fn health(&self) -> Result<(), DomainError>;

    /// Creates a collection with the given schema. Errors if the name is
    /// already taken (the manager decides whether that is a conflict).
    async fn create_collection(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> Result<(), DomainError>;

    /// Describes one collection, or `None` if it does not exist.
    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>, DomainError>;

    /// Names of all collections.
    async fn list_collections(&self) -> Result<Vec<String>, DomainError>;

    /// Reads one bounded page of points. Pass the previous page's
    /// `next_cursor` to continue.
    async fn scroll_points(
        &self,
        collection: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<ScrollPage, DomainError>;

    /// Idempotent write-back of points, used by restore.
    async fn upsert_points(
        &self,
        collection: &str,
        points: &[PointRecord],
    ) -> Result<(), DomainError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Scriptable in-memory store for manager tests.
    #[derive(Debug, Default)]
    pub struct MockVectorStoreClient {
        pub collections: Mutex<BTreeMap<String, (CollectionDescriptor, Vec<PointRecord>)>>,
        /// Number of health calls that fail before the first success.
        health_failures_remaining: AtomicU32,
        health_calls: AtomicU32,
        fail_collections: Mutex<Vec<String>>,
        scroll_delay: Mutex<Option<std::time::Duration>>,
    }

    impl MockVectorStoreClient {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the next `n` health checks with a connection-style error.
        pub fn failing_health_checks(self, n: u32) -> Self {
            self.health_failures_remaining.store(n, Ordering::SeqCst);
            self
        }

        /// Make scroll fail for a specific collection.
        pub fn failing_collection(self, name: impl Into<String>) -> Self {
            self.fail_collections.lock().unwrap().push(name.into());
            self
        }

        /// Make every scroll call sleep first, to hold operations in flight.
        pub fn with_scroll_delay(self, delay: std::time::Duration) -> Self {
            *self.scroll_delay.lock().unwrap() = Some(delay);
            self
        }

        pub fn with_collection(self, descriptor: CollectionDescriptor) -> Self {
            self.collections
                .lock()
                .unwrap()
                .insert(descriptor.name.clone(), (descriptor, Vec::new()));
            self
        }

        pub fn with_points(self, collection: &str, points: Vec<PointRecord>) -> Self {
            if let Some((_, stored)) = self.collections.lock().unwrap().get_mut(collection) {
                *stored = points;
            }
            self
        }

        pub fn health_calls(&self) -> u32 {
            self.health_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VectorStoreClient for MockVectorStoreClient {
        async fn health(&self) -> Result<(), DomainError> {
            self.health_calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.health_failures_remaining.load(Ordering::SeqCst);
            if remaining > 0 {
                self.health_failures_remaining
                    .store(remaining - 1, Ordering::SeqCst);
                return Err(DomainError::vector_store("health", "connection refused"));
            }
            Ok(())
        }

        async fn create_collection(
            &self,
            descriptor: &CollectionDescriptor,
        ) -> Result<(), DomainError> {
            let mut collections = self.collections.lock().unwrap();
            if collections.contains_key(&descriptor.name) {
                return Err(DomainError::vector_store(
                    "create_collection",
                    format!("collection '{}' already exists", descriptor.name),
                ));
            }
            collections.insert(descriptor.name.clone(), (descriptor.clone(), Vec::new()));
            Ok(())
        }

        async fn get_collection(
            &self,
            name: &str,
        ) -> Result<Option<CollectionInfo>, DomainError> {
            Ok(self.collections.lock().unwrap().get(name).map(
                |(descriptor, points)| CollectionInfo {
                    descriptor: descriptor.clone(),
                    points_count: points.len() as u64,
                    status: "green".to_string(),
                },
            ))
        }

        async fn list_collections(&self) -> Result<Vec<String>, DomainError> {
            Ok(self.collections.lock().unwrap().keys().cloned().collect())
        }

        async fn scroll_points(
            &self,
            collection: &str,
            limit: usize,
            cursor: Option<&str>,
        ) -> Result<ScrollPage, DomainError> {
            let delay = *self.scroll_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self
                .fail_collections
                .lock()
                .unwrap()
                .iter()
                .any(|c| c == collection)
            {
                return Err(DomainError::vector_store(
                    "scroll_points",
                    format!("collection '{}' unavailable", collection),
                ));
            }

            let collections = self.collections.lock().unwrap();
            let (_, points) = collections.get(collection).ok_or_else(|| {
                DomainError::not_found(format!("collection '{}' not found", collection))
            })?;

            let start: usize = cursor.map(|c| c.parse().unwrap_or(0)).unwrap_or(0);
            let end = (start + limit).min(points.len());
            let page: Vec<PointRecord> = points[start..end].to_vec();
            let next_cursor = if end < points.len() {
                Some(end.to_string())
            } else {
                None
            };

            Ok(ScrollPage {
                points: page,
                next_cursor,
            })
        }

        async fn upsert_points(
            &self,
            collection: &str,
            points: &[PointRecord],
        ) -> Result<(), DomainError> {
            let mut collections = self.collections.lock().unwrap();
            let (_, stored) = collections.get_mut(collection).ok_or_else(|| {
                DomainError::not_found(format!("collection '{}' not found", collection))
            })?;

            for point in points {
                match stored.iter_mut().find(|p| p.id == point.id) {
                    Some(existing) => *existing = point.clone(),
                    None => stored.push(point.clone()),
                }
            }
            Ok(())
        }
    }
}
