//! HTTP client for the remote vector-similarity service
//!
//! Speaks the store's JSON REST API: collection create/describe/list, point
//! scroll and upsert, and a health endpoint. Authentication is an optional
//! `api-key` header; every request runs under the configured timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::vector_store::{
    CollectionDescriptor, CollectionInfo, DistanceMetric, PointRecord, ScrollPage,
    VectorStoreClient,
};
use crate::domain::DomainError;

#[derive(Debug, Clone)]
pub struct VectorStoreHttpConfig {
    /// Base URL of the store, e.g. "http://127.0.0.1:6333".
    pub url: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl VectorStoreHttpConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct VectorStoreHttpClient {
    config: VectorStoreHttpConfig,
    client: reqwest::Client,
}

impl VectorStoreHttpClient {
    pub fn new(config: VectorStoreHttpConfig) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                DomainError::configuration(format!("failed to build HTTP client: {}", e))
            })?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    async fn send(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, DomainError> {
        let response = self.apply_auth(request).send().await.map_err(|e| {
            DomainError::vector_store(operation, format!("request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::vector_store(
                operation,
                format!("HTTP {}: {}", status, body),
            ));
        }
        Ok(response)
    }

    async fn send_json(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, DomainError> {
        self.send(operation, request)
            .await?
            .json()
            .await
            .map_err(|e| {
                DomainError::vector_store(operation, format!("failed to parse response: {}", e))
            })
    }
}

/// A point id on the wire may be an integer or a string; normalize to text.
fn point_id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_point(value: &Value) -> Option<PointRecord> {
    let id = point_id_to_string(value.get("id")?);
    let vector = value
        .get("vector")
        .and_then(|v| v.as_array())
        .map(|values| {
            values
                .iter()
                .filter_map(|n| n.as_f64())
                .map(|n| n as f32)
                .collect()
        })
        .unwrap_or_default();
    let payload = value.get("payload").cloned().unwrap_or(Value::Null);
    Some(PointRecord {
        id,
        vector,
        payload,
    })
}

fn parse_collection_info(name: &str, result: &Value) -> Result<CollectionInfo, DomainError> {
    let vectors = result
        .pointer("/config/params/vectors")
        .ok_or_else(|| {
            DomainError::vector_store(
                "get_collection",
                format!("collection '{}' response missing vector params", name),
            )
        })?;

    let size = vectors.get("size").and_then(|v| v.as_u64()).ok_or_else(|| {
        DomainError::vector_store(
            "get_collection",
            format!("collection '{}' response missing vector size", name),
        )
    })?;

    let distance = vectors
        .get("distance")
        .and_then(|v| v.as_str())
        .and_then(DistanceMetric::from_api_str)
        .ok_or_else(|| {
            DomainError::vector_store(
                "get_collection",
                format!("collection '{}' response has unknown distance metric", name),
            )
        })?;

    Ok(CollectionInfo {
        descriptor: CollectionDescriptor::new(name, size, distance),
        points_count: result
            .get("points_count")
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
        status: result
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string(),
    })
}

#[async_trait]
impl VectorStoreClient for VectorStoreHttpClient {
    async fn health(&self) -> Result<(), DomainError> {
        self.send("health", self.client.get(self.url("/healthz")))
            .await
            .map(|_| ())
    }

    async fn create_collection(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> Result<(), DomainError> {
        let body = json!({
            "vectors": {
                "size": descriptor.vector_dimension,
                "distance": descriptor.distance_metric.as_api_str(),
            }
        });
        let url = self.url(&format!("/collections/{}", descriptor.name));
        self.send_json("create_collection", self.client.put(url).json(&body))
            .await
            .map(|_| ())
    }

    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>, DomainError> {
        let url = self.url(&format!("/collections/{}", name));
        let response = self
            .apply_auth(self.client.get(url))
            .send()
            .await
            .map_err(|e| {
                DomainError::vector_store("get_collection", format!("request failed: {}", e))
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::vector_store(
                "get_collection",
                format!("HTTP {}: {}", status, body),
            ));
        }

        let body: Value = response.json().await.map_err(|e| {
            DomainError::vector_store("get_collection", format!("failed to parse response: {}", e))
        })?;
        let result = body.get("result").unwrap_or(&Value::Null);
        parse_collection_info(name, result).map(Some)
    }

    async fn list_collections(&self) -> Result<Vec<String>, DomainError> {
        let body = self
            .send_json("list_collections", self.client.get(self.url("/collections")))
            .await?;
        let names = body
            .pointer("/result/collections")
            .and_then(|v| v.as_array())
            .map(|collections| {
                collections
                    .iter()
                    .filter_map(|c| c.get("name").and_then(|n| n.as_str()))
                    .map(|n| n.to_string())
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }

    async fn scroll_points(
        &self,
        collection: &str,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<ScrollPage, DomainError> {
        let mut body = json!({
            "limit": limit,
            "with_payload": true,
            "with_vector": true,
        });
        if let Some(cursor) = cursor {
            body["offset"] = Value::String(cursor.to_string());
        }

        let url = self.url(&format!("/collections/{}/points/scroll", collection));
        let response = self
            .send_json("scroll_points", self.client.post(url).json(&body))
            .await?;

        let points = response
            .pointer("/result/points")
            .and_then(|v| v.as_array())
            .map(|values| values.iter().filter_map(parse_point).collect())
            .unwrap_or_default();

        let next_cursor = response
            .pointer("/result/next_page_offset")
            .filter(|v| !v.is_null())
            .map(point_id_to_string);

        Ok(ScrollPage {
            points,
            next_cursor,
        })
    }

    async fn upsert_points(
        &self,
        collection: &str,
        points: &[PointRecord],
    ) -> Result<(), DomainError> {
        let body = json!({
            "points": points
                .iter()
                .map(|p| json!({
                    "id": p.id,
                    "vector": p.vector,
                    "payload": p.payload,
                }))
                .collect::<Vec<_>>(),
        });

        let url = self.url(&format!("/collections/{}/points", collection));
        self.send_json("upsert_points", self.client.put(url).json(&body))
            .await
            .map(|_| ())
    }
}
