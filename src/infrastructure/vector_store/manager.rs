//! Vector store lifecycle manager
//!
//! Owns the connection to the remote store and guarantees the required
//! collections exist before dependent components run. Connect attempts are
//! serialized so only one reconnect is ever in flight.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::domain::vector_store::{
    CollectionDescriptor, CollectionInfo, PointRecord, ScrollPage, VectorStoreClient,
};
use crate::domain::DomainError;

#[derive(Debug, Clone)]
pub struct VectorStoreManagerConfig {
    pub connect_max_attempts: u32,
    pub connect_base_delay: Duration,
    /// Collections every dependent component assumes exist.
    pub required_collections: Vec<CollectionDescriptor>,
}

impl Default for VectorStoreManagerConfig {
    fn default() -> Self {
        Self {
            connect_max_attempts: 5,
            connect_base_delay: Duration::from_millis(500),
            required_collections: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct VectorStoreManager {
    client: Arc<dyn VectorStoreClient>,
    config: VectorStoreManagerConfig,
    connected: AtomicBool,
    /// Attempts the last successful connect took, for observability.
    connect_attempts: AtomicU32,
    connect_lock: tokio::sync::Mutex<()>,
}

impl VectorStoreManager {
    pub fn new(client: Arc<dyn VectorStoreClient>, config: VectorStoreManagerConfig) -> Self {
        Self {
            client,
            config,
            connected: AtomicBool::new(false),
            connect_attempts: AtomicU32::new(0),
            connect_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn client(&self) -> Arc<dyn VectorStoreClient> {
        Arc::clone(&self.client)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Attempts the last successful connect needed; 0 before any connect.
    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// Establishes the connection with bounded retries and a delay growing
    /// with the attempt number. Exhausting retries is fatal to subsystem
    /// initialization. Concurrent callers share one attempt sequence.
    pub async fn connect(&self) -> Result<(), DomainError> {
        let _guard = self.connect_lock.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        let max_attempts = self.config.connect_max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.client.health().await {
                Ok(()) => {
                    self.connected.store(true, Ordering::SeqCst);
                    self.connect_attempts.store(attempt, Ordering::SeqCst);
                    info!(attempt, "connected to vector store");
                    return Ok(());
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(attempt, max_attempts, error = %e, "vector store connection attempt failed");
                    if attempt < max_attempts {
                        tokio::time::sleep(self.retry_delay(attempt)).await;
                    }
                }
            }
        }

        Err(DomainError::connection(last_error, max_attempts))
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let base = self.config.connect_base_delay * attempt;
        let jitter_cap = (base.as_millis() as u64 / 4).max(1);
        let jitter = rand::thread_rng().gen_range(0..jitter_cap);
        base + Duration::from_millis(jitter)
    }

    /// Lightweight liveness probe. Failure is reported to the caller and
    /// does not change the connection state; reconnects stay explicit.
    pub async fn health_check(&self) -> Result<(), DomainError> {
        self.client.health().await
    }

    /// Drops the connection mark; safe to call repeatedly.
    pub fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!("disconnected from vector store");
        }
    }

    /// Idempotent create: an existing collection with a compatible schema is
    /// a no-op success; an incompatible one is an operator-level conflict,
    /// never auto-migrated.
    pub async fn ensure_collection(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> Result<(), DomainError> {
        if let Some(existing) = self.client.get_collection(&descriptor.name).await? {
            return self.check_compatibility(descriptor, &existing);
        }

        match self.client.create_collection(descriptor).await {
            Ok(()) => {
                info!(collection = %descriptor.name, "created collection");
                Ok(())
            }
            Err(create_error) => {
                // Lost a create race: accept if what exists now is compatible.
                match self.client.get_collection(&descriptor.name).await? {
                    Some(existing) => self.check_compatibility(descriptor, &existing),
                    None => Err(create_error),
                }
            }
        }
    }

    fn check_compatibility(
        &self,
        required: &CollectionDescriptor,
        existing: &CollectionInfo,
    ) -> Result<(), DomainError> {
        if existing.descriptor.is_compatible_with(required) {
            debug!(collection = %required.name, "collection already exists");
            Ok(())
        } else {
            Err(DomainError::collection_conflict(
                required.name.clone(),
                format!(
                    "existing dimension={} metric={:?}, required dimension={} metric={:?}",
                    existing.descriptor.vector_dimension,
                    existing.descriptor.distance_metric,
                    required.vector_dimension,
                    required.distance_metric,
                ),
            ))
        }
    }

    /// Ensures every required collection, failing fast on the first error;
    /// dependent components assume the full set exists.
    pub async fn initialize_collections(&self) -> Result<(), DomainError> {
        for descriptor in &self.config.required_collections {
            self.ensure_collection(descriptor).await?;
        }
        info!(
            count = self.config.required_collections.len(),
            "required collections ready"
        );
        Ok(())
    }

    pub fn required_collections(&self) -> &[CollectionDescriptor] {
        &self.config.required_collections
    }

    pub async fn list_collections(&self) -> Result<Vec<String>, DomainError> {
        self.client.list_collections().await
    }

    pub async fn describe_collection(&self, name: &str) -> Result<CollectionInfo, DomainError> {
        self.client
            .get_collection(name)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("collection '{}' not found", name)))
    }

    /// One bounded page of points.
    pub async fn scroll_points(
        &self,
        collection: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<ScrollPage, DomainError> {
        self.client.scroll_points(collection, limit, cursor).await
    }

    /// Follows cursors until the collection is exhausted.
    pub async fn scroll_all_points(
        &self,
        collection: &str,
        page_size: usize,
    ) -> Result<Vec<PointRecord>, DomainError> {
        let mut points = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .client
                .scroll_points(collection, page_size, cursor.as_deref())
                .await?;
            points.extend(page.points);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(points)
    }

    pub async fn upsert_points(
        &self,
        collection: &str,
        points: &[PointRecord],
    ) -> Result<(), DomainError> {
        self.client.upsert_points(collection, points).await
    }
}
