//! Per-turn agent state.
//!
//! One [`TurnState`] value is threaded through the route → retrieve →
//! fuse → generate transitions and discarded when the turn ends. Nothing
//! here survives the turn; session history lives in the session manager.

use sw_corpus::ScoredChunk;

use crate::message::Message;
use crate::routing::Route;
use crate::sources::WebResult;

/// Ephemeral state for a single query's trip through the state machine.
#[derive(Debug, Clone)]
pub struct TurnState {
    /// The query as routed (possibly enriched from a short follow-up).
    pub query: String,
    /// Bounded history snapshot taken at turn start.
    pub history: Vec<Message>,
    pub route: Route,
    /// Chunks that survived the relevance threshold, best first.
    pub pdf_hits: Vec<ScoredChunk>,
    pub web_hits: Vec<WebResult>,
    /// Fused grounding context, `None` when retrieval produced nothing.
    pub combined_context: Option<String>,
    /// Accumulated answer text, filled during streaming generation.
    pub final_answer: String,
}

impl TurnState {
    pub fn new(query: impl Into<String>, history: Vec<Message>) -> Self {
        Self {
            query: query.into(),
            history,
            route: Route::None,
            pdf_hits: Vec::new(),
            web_hits: Vec::new(),
            combined_context: None,
            final_answer: String::new(),
        }
    }
}
