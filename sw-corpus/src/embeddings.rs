//! Embedding providers.
//!
//! [`Embedder`] is the substitution seam for everything that needs a dense
//! vector: the ingestion pipeline, the retriever, and the agent's query
//! embedding. Production uses [`OpenAiEmbedder`]; tests and offline runs
//! use [`MockEmbedder`].

use std::time::Duration;

use async_trait::async_trait;
use rig::client::EmbeddingsClient;
use rig::embeddings::embedding::EmbeddingModel;
use rig::providers::openai;

use crate::types::CorpusError;

/// Maps text to fixed-dimension dense vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CorpusError>;

    /// Dimension of the produced vectors.
    fn dimensions(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CorpusError> {
        let texts = [text.to_string()];
        let mut vectors = self.embed_batch(&texts).await?;
        vectors
            .pop()
            .ok_or_else(|| CorpusError::Embedding("provider returned no vector".to_string()))
    }
}

/// OpenAI embeddings through rig.
pub struct OpenAiEmbedder {
    model: openai::EmbeddingModel,
    dimensions: usize,
    timeout: Duration,
}

impl OpenAiEmbedder {
    /// `text-embedding-3-small` output dimension.
    pub const DEFAULT_DIMENSIONS: usize = 1536;

    pub fn new(api_key: &str, model_id: &str, dimensions: usize, timeout: Duration) -> Self {
        let client = openai::Client::new(api_key);
        Self {
            model: client.embedding_model_with_ndims(model_id, dimensions),
            dimensions,
            timeout,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CorpusError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = tokio::time::timeout(self.timeout, self.model.embed_texts(texts.to_vec()))
            .await
            .map_err(|_| CorpusError::Embedding("embedding call timed out".to_string()))?
            .map_err(|err| CorpusError::Embedding(err.to_string()))?;

        Ok(embeddings
            .into_iter()
            .map(|embedding| embedding.vec.into_iter().map(|v| v as f32).collect())
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Deterministic hash-derived embeddings for tests and offline runs.
///
/// Identical inputs always produce identical vectors, distinct inputs
/// almost always differ, which is all the integration tests need.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimensions: usize,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self { dimensions: 16 }
    }
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn hash_to_vec(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();
        let mut vector: Vec<f32> = (0..self.dimensions)
            .map(|i| {
                let bits = seed.rotate_left((i as u32 % 64) * 7) ^ ((i as u64) << 17);
                (bits as u32) as f32 / u32::MAX as f32 - 0.5
            })
            .collect();
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CorpusError> {
        Ok(texts.iter().map(|text| self.hash_to_vec(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
