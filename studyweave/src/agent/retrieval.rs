//! The two retrieval arms.
//!
//! Every failure mode on this path (embedding, vector search, web
//! provider, per-task deadline) degrades to an empty result list; nothing
//! here can fail a turn.

use std::sync::Arc;
use std::time::Duration;

use sw_corpus::{Retriever, ScoredChunk, SearchFilter};

use crate::providers::WebSearchTool;
use crate::sources::WebResult;

pub(crate) struct PdfTaskConfig {
    pub k: usize,
    pub relevance_threshold: f32,
    pub subject: Option<String>,
    pub deadline: Duration,
}

pub(crate) struct WebTaskConfig {
    pub limit: usize,
    pub days_back: u32,
    pub recent: bool,
    pub deadline: Duration,
}

/// Search the textbook index; empty on any failure or timeout.
pub(crate) async fn pdf_task(
    retriever: Arc<Retriever>,
    query: String,
    config: PdfTaskConfig,
) -> Vec<ScoredChunk> {
    let filter = config.subject.map(|subject| SearchFilter {
        subject: Some(subject),
    });
    let search = retriever.search_by_text(&query, config.k, filter.as_ref());

    let hits = match tokio::time::timeout(config.deadline, search).await {
        Ok(Ok(hits)) => hits,
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "textbook retrieval failed, continuing without it");
            return Vec::new();
        }
        Err(_) => {
            tracing::warn!("textbook retrieval hit the deadline, continuing without it");
            return Vec::new();
        }
    };

    let kept: Vec<ScoredChunk> = hits
        .into_iter()
        .filter(|hit| hit.score >= config.relevance_threshold)
        .take(config.k)
        .collect();
    tracing::info!(hits = kept.len(), "textbook retrieval complete");
    kept
}

/// Search the web; empty on any failure or timeout.
pub(crate) async fn web_task(
    tool: Arc<dyn WebSearchTool>,
    query: String,
    config: WebTaskConfig,
) -> Vec<WebResult> {
    let search = async {
        if config.recent {
            tool.search_recent(&query, config.limit, config.days_back).await
        } else {
            tool.search_educational(&query, config.limit).await
        }
    };

    match tokio::time::timeout(config.deadline, search).await {
        Ok(Ok(results)) => {
            tracing::info!(hits = results.len(), "web retrieval complete");
            results
        }
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "web retrieval failed, continuing without it");
            Vec::new()
        }
        Err(_) => {
            tracing::warn!("web retrieval hit the deadline, continuing without it");
            Vec::new()
        }
    }
}
