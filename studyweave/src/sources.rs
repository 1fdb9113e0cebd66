//! Source attribution types carried by the `sources` event.

use serde::{Deserialize, Serialize};
use sw_corpus::{ChunkMetadata, ScoredChunk};

/// How much chunk text a source reference exposes.
const SNIPPET_CHARS: usize = 200;

/// A result from the web-search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    pub snippet: String,
    pub score: f32,
}

/// Attribution entry for a retrieved textbook chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfSourceRef {
    /// Leading chunk text, truncated for display.
    pub content: String,
    pub metadata: ChunkMetadata,
    pub relevance_score: f32,
}

impl From<&ScoredChunk> for PdfSourceRef {
    fn from(scored: &ScoredChunk) -> Self {
        let mut content: String = scored.chunk.text.chars().take(SNIPPET_CHARS).collect();
        if scored.chunk.text.chars().count() > SNIPPET_CHARS {
            content.push_str("...");
        }
        Self {
            content,
            metadata: scored.chunk.metadata.clone(),
            relevance_score: scored.score,
        }
    }
}

/// Attribution entry for a web result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSourceRef {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    pub score: f32,
}

impl From<&WebResult> for WebSourceRef {
    fn from(result: &WebResult) -> Self {
        Self {
            title: result.title.clone(),
            url: result.url.clone(),
            published_date: result.published_date.clone(),
            score: result.score,
        }
    }
}
