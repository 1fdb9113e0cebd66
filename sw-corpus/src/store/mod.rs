//! Vector storage for retrieval.
//!
//! [`VectorIndex`] is the repository contract: upsert by chunk id,
//! similarity search with an optional metadata filter, size, and bulk
//! purge. A single process-wide instance is shared across requests;
//! concurrent searches are supported and writes are serialized with
//! respect to reads by the implementation.
//!
//! [`Retriever`] pairs an index with an embedding provider to offer the
//! text-in, chunks-out sugar the agent and the `/query` endpoint use.

pub mod sqlite;

pub use sqlite::SqliteVectorIndex;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chunker::Chunk;
use crate::embeddings::Embedder;
use crate::types::CorpusError;

/// A chunk returned from search with its relevance score in `[0, 1]`,
/// higher is better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Metadata filter applied during search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    /// Restrict results to chunks whose inferred subject matches.
    pub subject: Option<String>,
}

/// Persistent collection of embedded chunks.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Upsert chunks by id; chunks without embeddings are skipped.
    /// Returns the number of chunks written. Idempotent on chunk id.
    async fn add(&self, chunks: Vec<Chunk>) -> Result<usize, CorpusError>;

    /// Similarity search, sorted by descending score.
    async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredChunk>, CorpusError>;

    /// Number of chunks in the collection.
    async fn len(&self) -> Result<usize, CorpusError>;

    /// Remove every chunk; returns the count removed.
    async fn delete_all(&self) -> Result<usize, CorpusError>;
}

/// Text-in retrieval: embed via the provider, search the index.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Embed `text` and run a similarity search.
    pub async fn search_by_text(
        &self,
        text: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredChunk>, CorpusError> {
        let query_vector = self.embedder.embed(text).await?;
        self.index.search(&query_vector, k, filter).await
    }
}
