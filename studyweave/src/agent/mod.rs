//! The hybrid retrieval state machine.
//!
//! ```text
//!       ROUTE ──► {NONE, PDF_ONLY, WEB_ONLY, BOTH}
//!         │
//!         ├─ NONE ────────────────────────────┐
//!         ├─ PDF_ONLY ──► pdf task ──┐        │
//!         ├─ WEB_ONLY ──► web task ──┤        │
//!         └─ BOTH ──► pdf ∥ web ─────┤        │
//!                                    ▼        │
//!                                  FUSE       │
//!                                    │        │
//!                                    ▼        ▼
//!                               GENERATE (streaming)
//!                                    │
//!                                    ▼
//!                          sources, done │ error
//! ```
//!
//! Retrieval arms run on independent tasks joined under a deadline and can
//! only ever degrade to empty; generation is the single fallible stage.
//! Deltas stream through the bounded turn channel as they arrive.

mod fusion;
mod prompts;
mod retrieval;

pub use fusion::fuse;

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use sw_corpus::{Retriever, VectorIndex};

use crate::error::AgentError;
use crate::events::TurnEmitter;
use crate::message::Message;
use crate::providers::{ChatModel, WebSearchTool};
use crate::routing::{infer_subject, recency_signal, short_followup, Route, Router};
use crate::sources::{PdfSourceRef, WebSourceRef};
use crate::state::TurnState;

/// Knobs the state machine reads per turn.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub search_k: usize,
    pub relevance_threshold: f32,
    pub web_results_limit: usize,
    pub web_days_back: u32,
    pub retrieval_deadline: Duration,
    pub context_char_budget: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            search_k: 4,
            relevance_threshold: 0.2,
            web_results_limit: 3,
            web_days_back: 90,
            retrieval_deadline: Duration::from_millis(8_000),
            context_char_budget: 16_000,
        }
    }
}

/// What a completed turn produced, for session bookkeeping and the
/// non-streaming endpoint.
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub answer: String,
    pub route: Route,
    pub pdf_sources: Vec<PdfSourceRef>,
    pub web_sources: Vec<WebSourceRef>,
}

/// Hybrid retrieval agent: explicitly constructed, injected services,
/// shared across requests.
pub struct HybridAgent {
    router: Router,
    retriever: Arc<Retriever>,
    index: Arc<dyn VectorIndex>,
    web: Option<Arc<dyn WebSearchTool>>,
    chat: Arc<dyn ChatModel>,
    config: AgentConfig,
}

impl HybridAgent {
    pub fn new(
        router: Router,
        retriever: Arc<Retriever>,
        index: Arc<dyn VectorIndex>,
        web: Option<Arc<dyn WebSearchTool>>,
        chat: Arc<dyn ChatModel>,
        config: AgentConfig,
    ) -> Self {
        Self {
            router,
            retriever,
            index,
            web,
            chat,
            config,
        }
    }

    /// Run one turn, streaming deltas through `emitter`.
    ///
    /// On success the stream has carried `chunk* sources done` and the
    /// returned record mirrors what was streamed. Retrieval failures
    /// degrade silently; only generation failures and caller cancellation
    /// surface as errors.
    pub async fn run_turn(
        &self,
        query: &str,
        history: &[Message],
        use_rag: bool,
        emitter: &TurnEmitter,
    ) -> Result<TurnRecord, AgentError> {
        let mut state = TurnState::new(query, history.to_vec());

        // ROUTE
        let enriched_followup = self.enrich_followup(&mut state);
        state.route = if !use_rag {
            Route::None
        } else if enriched_followup {
            Route::PdfOnly
        } else {
            let populated = self.index.len().await.unwrap_or(0) > 0;
            self.router.route(&state.query, populated).await.route
        };
        state.route = self.clamp_route(state.route);
        tracing::info!(route = %state.route, "route decided");

        // RETRIEVE (parallel fan-out on BOTH)
        self.retrieve(&mut state).await;

        // FUSE
        state.combined_context = fuse(
            &state.pdf_hits,
            &state.web_hits,
            self.config.context_char_budget,
        );

        // GENERATE (streaming)
        let system = match (state.route, &state.combined_context) {
            (Route::None, _) => prompts::direct(),
            (_, Some(context)) => prompts::grounded(context),
            (_, None) => prompts::empty_context(),
        };

        let mut deltas = self
            .chat
            .stream(&system, &state.history, &state.query)
            .await
            .map_err(|err| AgentError::GenerationUnavailable {
                message: err.to_string(),
            })?;

        while let Some(delta) = deltas.next().await {
            match delta {
                Ok(text) => {
                    if emitter.chunk(text.clone()).await.is_err() {
                        tracing::info!("caller went away mid-stream, cancelling turn");
                        return Err(AgentError::Cancelled);
                    }
                    state.final_answer.push_str(&text);
                }
                Err(err) if state.final_answer.is_empty() => {
                    return Err(AgentError::GenerationUnavailable {
                        message: err.to_string(),
                    });
                }
                Err(err) => {
                    return Err(AgentError::GenerationInterrupted {
                        message: err.to_string(),
                    });
                }
            }
        }
        if state.final_answer.is_empty() {
            return Err(AgentError::GenerationUnavailable {
                message: "generator produced no output".to_string(),
            });
        }

        let pdf_sources: Vec<PdfSourceRef> = state.pdf_hits.iter().map(Into::into).collect();
        let web_sources: Vec<WebSourceRef> = state.web_hits.iter().map(Into::into).collect();

        if emitter
            .sources(pdf_sources.clone(), web_sources.clone(), state.route)
            .await
            .is_err()
            || emitter.done().await.is_err()
        {
            return Err(AgentError::Cancelled);
        }

        Ok(TurnRecord {
            answer: state.final_answer,
            route: state.route,
            pdf_sources,
            web_sources,
        })
    }

    /// Short acknowledgements continue the previous topic: fold the last
    /// assistant suggestion into the query so retrieval has something to
    /// work with. Returns whether enrichment happened.
    fn enrich_followup(&self, state: &mut TurnState) -> bool {
        if !short_followup(&state.query) || state.history.is_empty() {
            return false;
        }
        let Some(last_assistant) = state
            .history
            .iter()
            .rev()
            .find(|m| m.has_role(Message::ASSISTANT))
        else {
            return false;
        };
        let suggestion = last_assistant.content.lines().find(|line| {
            let lowered = line.to_ascii_lowercase();
            lowered.contains("would you like") || lowered.contains("explore")
        });
        match suggestion {
            Some(line) => {
                state.query = format!(
                    "{} - continue the discussion about: {}",
                    state.query,
                    line.trim()
                );
                tracing::debug!(query = %state.query, "enriched short follow-up");
                true
            }
            None => false,
        }
    }

    /// With web retrieval disabled, web-touching routes collapse onto the
    /// textbook index.
    fn clamp_route(&self, route: Route) -> Route {
        if self.web.is_none() && matches!(route, Route::WebOnly | Route::Both) {
            tracing::debug!("web retrieval disabled, clamping route to pdf_only");
            return Route::PdfOnly;
        }
        route
    }

    async fn retrieve(&self, state: &mut TurnState) {
        let pdf_config = retrieval::PdfTaskConfig {
            k: self.config.search_k,
            relevance_threshold: self.config.relevance_threshold,
            subject: infer_subject(&state.query),
            deadline: self.config.retrieval_deadline,
        };
        let web_config = retrieval::WebTaskConfig {
            limit: self.config.web_results_limit,
            days_back: self.config.web_days_back,
            recent: recency_signal(&state.query),
            deadline: self.config.retrieval_deadline,
        };

        match (state.route, &self.web) {
            (Route::PdfOnly, _) => {
                state.pdf_hits = retrieval::pdf_task(
                    Arc::clone(&self.retriever),
                    state.query.clone(),
                    pdf_config,
                )
                .await;
            }
            (Route::WebOnly, Some(web)) => {
                state.web_hits =
                    retrieval::web_task(Arc::clone(web), state.query.clone(), web_config).await;
            }
            (Route::Both, Some(web)) => {
                // The concurrency heart: two independent tasks, each under
                // its own deadline, joined without serialization.
                let pdf_handle = tokio::spawn(retrieval::pdf_task(
                    Arc::clone(&self.retriever),
                    state.query.clone(),
                    pdf_config,
                ));
                let web_handle = tokio::spawn(retrieval::web_task(
                    Arc::clone(web),
                    state.query.clone(),
                    web_config,
                ));
                let (pdf_hits, web_hits) = tokio::join!(pdf_handle, web_handle);
                state.pdf_hits = pdf_hits.unwrap_or_else(|err| {
                    tracing::warn!(error = %err, "textbook retrieval task panicked");
                    Vec::new()
                });
                state.web_hits = web_hits.unwrap_or_else(|err| {
                    tracing::warn!(error = %err, "web retrieval task panicked");
                    Vec::new()
                });
            }
            (Route::None, _) | (Route::WebOnly, None) | (Route::Both, None) => {}
        }
    }
}
