//! Vector similarity index over offer descriptions.
//!
//! Built once at startup through an [`Embedder`]; vectors are L2-normalized
//! so cosine similarity is a dot product. The index is read-only after
//! construction and shared between conversations.

use std::sync::Arc;

use al_protocol::CarOffer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{CatalogError, CatalogResult};

/// Turns texts into embedding vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in order.
    async fn embed(&self, texts: &[String]) -> CatalogResult<Vec<Vec<f32>>>;

    fn name(&self) -> &str;
}

/// Configuration for the OpenAI-compatible embeddings endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_base_url() -> String {
    "http://localhost:8080/v1".into()
}
fn default_model() -> String {
    "Embeddings".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_batch_size() -> usize {
    10
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Either the OpenAI `data[].embedding` shape or a bare `embeddings` list.
#[derive(Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Data { data: Vec<EmbeddingItem> },
    Bare { embeddings: Vec<Vec<f32>> },
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl EmbeddingResponse {
    fn into_vectors(self) -> Vec<Vec<f32>> {
        match self {
            EmbeddingResponse::Data { mut data } => {
                if data.iter().all(|d| d.index.is_some()) {
                    data.sort_by_key(|d| d.index);
                }
                data.into_iter().map(|d| d.embedding).collect()
            }
            EmbeddingResponse::Bare { embeddings } => embeddings,
        }
    }
}

/// HTTP client for `POST {base_url}/embeddings`.
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl HttpEmbedder {
    pub fn new(config: EmbeddingConfig) -> CatalogResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CatalogError::Embedding(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> CatalogResult<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let body = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CatalogError::Embedding(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(CatalogError::Embedding(format!("status {}", response.status())));
        }
        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Embedding(format!("invalid response body: {e}")))?;

        let vectors = parsed.into_vectors();
        if vectors.len() != texts.len() {
            return Err(CatalogError::Embedding(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Dense index: one normalized vector per catalog offer, same order.
pub struct SemanticIndex {
    vectors: Vec<Vec<f32>>,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for SemanticIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticIndex")
            .field("vectors", &self.vectors.len())
            .field("embedder", &self.embedder.name())
            .finish()
    }
}

impl SemanticIndex {
    /// Embed every offer description in batches, retrying each batch once.
    pub async fn build(
        catalog: &Catalog,
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
    ) -> CatalogResult<Self> {
        if catalog.is_empty() {
            return Err(CatalogError::Empty);
        }
        let descriptions: Vec<String> = catalog.offers().iter().map(describe).collect();
        let batches = descriptions.chunks(batch_size.max(1));
        let total = batches.len();

        let mut vectors = Vec::with_capacity(descriptions.len());
        for (n, batch) in batches.enumerate() {
            let embedded = match embedder.embed(batch).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, batch = n + 1, total, "embedding batch failed, retrying");
                    embedder.embed(batch).await?
                }
            };
            if embedded.len() != batch.len() {
                return Err(CatalogError::Embedding(format!(
                    "batch {}: expected {} vectors, got {}",
                    n + 1,
                    batch.len(),
                    embedded.len()
                )));
            }
            vectors.extend(embedded.into_iter().map(l2_normalized));
        }

        tracing::info!(vectors = vectors.len(), embedder = embedder.name(), "semantic index built");
        Ok(Self { vectors, embedder })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Catalog indices of the `top_k` most similar offers, best first.
    pub async fn search(&self, query: &str, top_k: usize) -> CatalogResult<Vec<usize>> {
        let mut embedded = self.embedder.embed(&[query.to_string()]).await?;
        let query_vec = embedded
            .pop()
            .map(l2_normalized)
            .ok_or_else(|| CatalogError::Embedding("no vector for query".into()))?;

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .filter(|(_, v)| v.len() == query_vec.len())
            .map(|(i, v)| (i, dot(v, &query_vec)))
            .collect();
        if scored.is_empty() {
            return Err(CatalogError::Embedding("query dimension mismatch".into()));
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(scored.into_iter().take(top_k).map(|(i, _)| i).collect())
    }
}

/// Text embedded for one offer.
pub fn describe(offer: &CarOffer) -> String {
    let drive = match offer.drive.to_lowercase().as_str() {
        "4x4" | "awd" | "4wd" => "полный привод".to_string(),
        "fwd" => "передний привод".to_string(),
        "rwd" => "задний привод".to_string(),
        _ => offer.drive.clone(),
    };
    let gears = offer.gears.map(|g| format!(" {g} ст")).unwrap_or_default();
    format!(
        "{} {} {}, {}, {}, {}, {} л.с., {}{}, цена {} руб",
        offer.brand,
        offer.model,
        offer.trim,
        offer.body,
        drive,
        offer.engine_type,
        offer.power,
        offer.transmission,
        gears,
        offer.final_price
    )
}

fn l2_normalized(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
