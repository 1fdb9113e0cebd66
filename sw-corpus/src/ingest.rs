//! Ingestion orchestration: load → chunk → embed → store, with per-file
//! outcomes.
//!
//! One failed document never aborts the batch; its outcome carries the
//! error and the rest of the inputs proceed. Embedding runs in bounded
//! batches with bounded concurrency.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;

use crate::chunker::{Chunk, Chunker};
use crate::embeddings::Embedder;
use crate::loader::DocumentLoader;
use crate::store::VectorIndex;
use crate::types::CorpusError;

/// One document submitted for ingestion.
#[derive(Debug, Clone)]
pub enum DocumentInput {
    /// Raw file bytes (PDF, txt, md) under a logical source path.
    File { source: String, bytes: Vec<u8> },
    /// An already-fetched webpage.
    Html { source: String, html: String },
}

impl DocumentInput {
    pub fn source(&self) -> &str {
        match self {
            DocumentInput::File { source, .. } => source,
            DocumentInput::Html { source, .. } => source,
        }
    }
}

/// Per-file ingestion outcome.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub source: String,
    pub pages: usize,
    pub chunks_added: usize,
    pub ocr_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Batch outcome: one entry per submitted document.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub outcomes: Vec<FileOutcome>,
}

impl IngestReport {
    pub fn files_processed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_none()).count()
    }

    pub fn total_chunks(&self) -> usize {
        self.outcomes.iter().map(|o| o.chunks_added).sum()
    }

    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.files_processed() == 0
    }
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Texts per embedding call.
    pub embed_batch: usize,
    /// Embedding calls in flight at once.
    pub embed_concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            embed_batch: 64,
            embed_concurrency: 4,
        }
    }
}

/// Drives loader → chunker → embedder → index for a batch of inputs.
pub struct IngestionPipeline {
    loader: Arc<DocumentLoader>,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    config: IngestConfig,
}

impl IngestionPipeline {
    pub fn new(
        loader: Arc<DocumentLoader>,
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        config: IngestConfig,
    ) -> Self {
        Self {
            loader,
            chunker,
            embedder,
            index,
            config,
        }
    }

    /// Ingest a batch of documents, reporting per-file outcomes.
    pub async fn run(&self, inputs: Vec<DocumentInput>) -> IngestReport {
        let mut outcomes = Vec::with_capacity(inputs.len());
        for input in inputs {
            let source = input.source().to_string();
            match self.ingest_one(input).await {
                Ok(outcome) => {
                    tracing::info!(
                        source = %outcome.source,
                        pages = outcome.pages,
                        chunks = outcome.chunks_added,
                        ocr = outcome.ocr_used,
                        "document ingested"
                    );
                    outcomes.push(outcome);
                }
                Err(err) => {
                    tracing::warn!(source = %source, error = %err, "document failed to ingest");
                    outcomes.push(FileOutcome {
                        source,
                        pages: 0,
                        chunks_added: 0,
                        ocr_used: false,
                        error: Some(err.to_string()),
                    });
                }
            }
        }
        IngestReport { outcomes }
    }

    async fn ingest_one(&self, input: DocumentInput) -> Result<FileOutcome, CorpusError> {
        let source = input.source().to_string();
        let loaded = match input {
            DocumentInput::File { source, bytes } => self.loader.load(&source, &bytes).await?,
            DocumentInput::Html { source, html } => self.loader.load_html(&source, &html),
        };

        let pages = loaded.pages.len();
        let chunks = self.chunker.chunk(&loaded.pages);
        if chunks.is_empty() {
            return Ok(FileOutcome {
                source,
                pages,
                chunks_added: 0,
                ocr_used: loaded.ocr_used,
                error: None,
            });
        }

        let embedded = self.embed_all(chunks).await?;
        let chunks_added = self.index.add(embedded).await?;

        Ok(FileOutcome {
            source,
            pages,
            chunks_added,
            ocr_used: loaded.ocr_used,
            error: None,
        })
    }

    /// Embed chunks in `embed_batch`-sized batches with bounded
    /// concurrency, preserving input order.
    async fn embed_all(&self, chunks: Vec<Chunk>) -> Result<Vec<Chunk>, CorpusError> {
        let batch_size = self.config.embed_batch.max(1);
        let batches: Vec<Vec<Chunk>> = chunks
            .chunks(batch_size)
            .map(|batch| batch.to_vec())
            .collect();

        let mut embedded: Vec<(usize, Vec<Chunk>)> = stream::iter(batches.into_iter().enumerate())
            .map(|(ordinal, mut batch)| {
                let embedder = Arc::clone(&self.embedder);
                async move {
                    let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
                    let vectors = embedder.embed_batch(&texts).await?;
                    if vectors.len() != batch.len() {
                        return Err(CorpusError::Embedding(format!(
                            "provider returned {} vectors for {} texts",
                            vectors.len(),
                            batch.len()
                        )));
                    }
                    for (chunk, vector) in batch.iter_mut().zip(vectors) {
                        chunk.embedding = Some(vector);
                    }
                    Ok::<_, CorpusError>((ordinal, batch))
                }
            })
            .buffer_unordered(self.config.embed_concurrency.max(1))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        embedded.sort_by_key(|(ordinal, _)| *ordinal);
        Ok(embedded.into_iter().flat_map(|(_, batch)| batch).collect())
    }
}
