//! ```text
//! Uploaded bytes ──► loader::DocumentLoader ──► [Page]
//!                         │ (direct text, OCR fallback)
//!                         ▼
//!                 chunker::Chunker ──► [Chunk] (filtered, metadata-enriched)
//!                         │
//!                         ▼
//!            embeddings::Embedder (batched) ──► vectors
//!                         │
//!                         ▼
//!          store::SqliteVectorIndex ──► persistent collection
//!                         │
//!                         ▼
//!          store::Retriever ──► scored chunks for the agent
//! ```
//!
//! `sw-corpus` owns the ingestion side of Studyweave: turning source
//! documents into retrievable, metadata-enriched chunks, and the vector
//! index those chunks live in. The retrieval agent in the `studyweave`
//! crate consumes this crate through the [`store::VectorIndex`] and
//! [`embeddings::Embedder`] traits, so tests can substitute mocks for
//! every external service.

pub mod chunker;
pub mod embeddings;
pub mod ingest;
pub mod loader;
pub mod store;
pub mod types;

pub use chunker::{Chunk, ChunkMetadata, Chunker, ChunkerConfig, ContentKind};
pub use embeddings::{Embedder, MockEmbedder, OpenAiEmbedder};
pub use ingest::{DocumentInput, FileOutcome, IngestReport, IngestionPipeline};
pub use loader::{DocumentLoader, LoaderConfig, Page};
pub use store::{Retriever, ScoredChunk, SearchFilter, SqliteVectorIndex, VectorIndex};
pub use types::CorpusError;
