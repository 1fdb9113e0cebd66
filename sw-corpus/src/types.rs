//! Shared error type for the ingestion pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by loaders, the chunker, embedding providers, and the
/// vector index.
///
/// Ingestion-input errors (`UnsupportedFormat`, `OcrUnavailable`) are
/// per-file and never abort a batch; the orchestrator records them on the
/// file outcome. `Embedding` and `Storage` degrade retrieval to empty on
/// the query path.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// The file extension is not one the loader knows how to read.
    #[error("unsupported document format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// The document is image-based but no OCR engine is installed.
    #[error("document {path} requires OCR but no OCR engine is available")]
    OcrUnavailable { path: PathBuf },

    /// Direct text extraction failed outright.
    #[error("text extraction failed for {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    /// The embedding provider failed or timed out.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The vector store failed.
    #[error("vector store error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}
