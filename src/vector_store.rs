//! Vector store abstraction for docent.
//!
//! The [`VectorStore`] trait defines the similarity-search and facet
//! operations the retrieval tools need, enabling pluggable backends:
//!
//! - **[`QdrantStore`]** — talks to a Qdrant instance over its REST API.
//! - **[`InMemoryStore`]** — brute-force cosine similarity over points
//!   held in a `RwLock`, for tests.
//!
//! Implementations must be `Send + Sync` to be shared across concurrent
//! request handlers. Per the retrieval error policy, a failure here is an
//! `Err` the tools catch and degrade into a readable message — nothing in
//! this module panics on a bad response.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::config::VectorStoreConfig;
use crate::models::{ChunkPayload, ScoredPoint};

/// Payload field holding the professor display name, used by the
/// person filter and the directory facet.
pub const PROFESSOR_FIELD: &str = "nome_professor";
/// Payload field holding the document type.
pub const DOC_TYPE_FIELD: &str = "tipo";

/// Optional payload constraints applied to a similarity search.
///
/// The professor constraint is a *full-text* match, mirroring the
/// deployed collection's behavior: partial or misspelled names may match
/// fuzzily or not at all. The document-type constraint matches exactly.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub professor: Option<String>,
    pub doc_type: Option<String>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self.professor.is_none() && self.doc_type.is_none()
    }
}

/// Abstract vector search backend.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Similarity search, most-similar first, with optional payload filters.
    async fn search(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
        limit: u64,
    ) -> Result<Vec<ScoredPoint>>;

    /// Distinct values of a payload field across the whole collection.
    async fn facet(&self, field: &str, limit: u64) -> Result<Vec<String>>;

    /// Verify the collection exists and its point dimension matches the
    /// embedding provider. A mismatch is a fatal configuration error.
    async fn ensure_collection(&self, dims: usize) -> Result<()>;
}

// ============ Qdrant backend ============

/// Vector store backed by a Qdrant collection over the REST API.
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
}

impl QdrantStore {
    /// Build a store from configuration. The API key, when configured,
    /// is resolved from the named environment variable once, here.
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let api_key = match config.api_key_env.as_deref() {
            Some(env) if !env.is_empty() => Some(
                std::env::var(env)
                    .with_context(|| format!("environment variable '{}' not set", env))?,
            ),
            _ => None,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            api_key,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            req = req.header("api-key", key);
        }
        req
    }

    fn build_filter(filter: &SearchFilter) -> Option<serde_json::Value> {
        let mut must = Vec::new();
        if let Some(name) = &filter.professor {
            must.push(serde_json::json!({
                "key": PROFESSOR_FIELD,
                "match": { "text": name }
            }));
        }
        if let Some(doc_type) = &filter.doc_type {
            must.push(serde_json::json!({
                "key": DOC_TYPE_FIELD,
                "match": { "value": doc_type }
            }));
        }
        if must.is_empty() {
            None
        } else {
            Some(serde_json::json!({ "must": must }))
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn search(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
        limit: u64,
    ) -> Result<Vec<ScoredPoint>> {
        let mut body = serde_json::json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(f) = Self::build_filter(filter) {
            body["filter"] = f;
        }

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/points/search", self.collection),
            )
            .json(&body)
            .send()
            .await
            .context("Qdrant search request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Qdrant search error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let hits = json
            .get("result")
            .and_then(|r| r.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid Qdrant response: missing result array"))?;

        let mut points = Vec::with_capacity(hits.len());
        for hit in hits {
            let score = hit.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0) as f32;
            let payload: ChunkPayload = hit
                .get("payload")
                .cloned()
                .map(serde_json::from_value)
                .transpose()?
                .unwrap_or_default();
            points.push(ScoredPoint { payload, score });
        }
        Ok(points)
    }

    async fn facet(&self, field: &str, limit: u64) -> Result<Vec<String>> {
        let body = serde_json::json!({
            "key": field,
            "limit": limit,
        });

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{}/facet", self.collection),
            )
            .json(&body)
            .send()
            .await
            .context("Qdrant facet request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Qdrant facet error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let hits = json
            .pointer("/result/hits")
            .and_then(|h| h.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid Qdrant facet response: missing hits"))?;

        Ok(hits
            .iter()
            .filter_map(|h| h.get("value").and_then(|v| v.as_str()))
            .map(|s| s.to_string())
            .collect())
    }

    async fn ensure_collection(&self, dims: usize) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/collections/{}", self.collection),
            )
            .send()
            .await
            .context("Qdrant collection info request failed")?;

        let status = response.status();
        if status.as_u16() == 404 {
            bail!(
                "Collection '{}' does not exist — run the ingestion job first",
                self.collection
            );
        }
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Qdrant collection info error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let size = json
            .pointer("/result/config/params/vectors/size")
            .and_then(|s| s.as_u64())
            .ok_or_else(|| anyhow::anyhow!("Invalid Qdrant collection info response"))?;

        if size as usize != dims {
            bail!(
                "Collection '{}' holds {}-dimensional points but the embedding provider produces {} dimensions",
                self.collection,
                size,
                dims
            );
        }
        Ok(())
    }
}

// ============ In-memory backend ============

/// In-memory store for tests.
///
/// Points are keyed by id, so re-inserting the same id overwrites rather
/// than duplicates — the same idempotence the ingestion job relies on.
/// The professor filter mirrors the full-text semantics with
/// case-insensitive token containment.
pub struct InMemoryStore {
    points: RwLock<HashMap<String, (Vec<f32>, ChunkPayload)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            points: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, id: impl Into<String>, vector: Vec<f32>, payload: ChunkPayload) {
        let mut points = self.points.write().unwrap();
        points.insert(id.into(), (vector, payload));
    }

    pub fn len(&self) -> usize {
        self.points.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn matches(filter: &SearchFilter, payload: &ChunkPayload) -> bool {
        if let Some(doc_type) = &filter.doc_type {
            if &payload.doc_type != doc_type {
                return false;
            }
        }
        if let Some(name) = &filter.professor {
            let haystack = payload.professor.to_lowercase();
            let all_tokens_present = name
                .to_lowercase()
                .split_whitespace()
                .all(|token| haystack.contains(token));
            if !all_tokens_present {
                return false;
            }
        }
        true
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn search(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
        limit: u64,
    ) -> Result<Vec<ScoredPoint>> {
        let points = self.points.read().unwrap();
        let mut hits: Vec<ScoredPoint> = points
            .values()
            .filter(|(_, payload)| Self::matches(filter, payload))
            .map(|(vec, payload)| ScoredPoint {
                payload: payload.clone(),
                score: cosine_similarity(vector, vec),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn facet(&self, field: &str, limit: u64) -> Result<Vec<String>> {
        if field != PROFESSOR_FIELD {
            bail!("No facet index for field '{}'", field);
        }
        let points = self.points.read().unwrap();
        let mut values: Vec<String> = points
            .values()
            .map(|(_, payload)| payload.professor.clone())
            .filter(|name| !name.is_empty())
            .collect();
        values.sort();
        values.dedup();
        values.truncate(limit as usize);
        Ok(values)
    }

    async fn ensure_collection(&self, _dims: usize) -> Result<()> {
        Ok(())
    }
}
