//! Query routing: which retrieval backends a turn should consult.
//!
//! Rules first, LLM fallback second. The deterministic rules (greeting,
//! recency, textbook structure) decide most queries on their own; only
//! when they are ambiguous does the router consult the chat model with a
//! constrained classifier prompt, and any classifier failure falls back to
//! a deterministic default.

mod patterns;

pub use patterns::{greeting_like, infer_subject, recency_signal, short_followup, textbook_signal};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::providers::ChatModel;

/// Which retrieval backends to invoke for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// No retrieval: answer directly (greetings, small talk).
    None,
    PdfOnly,
    WebOnly,
    Both,
}

impl Route {
    /// Classifier label for this route.
    pub fn label(&self) -> &'static str {
        match self {
            Route::None => "NONE",
            Route::PdfOnly => "PDF_ONLY",
            Route::WebOnly => "WEB_ONLY",
            Route::Both => "BOTH",
        }
    }

    /// Parse a classifier label; tolerant of surrounding noise but not of
    /// unknown tokens.
    pub fn parse_label(raw: &str) -> Option<Route> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NONE" => Some(Route::None),
            "PDF_ONLY" | "PDF" => Some(Route::PdfOnly),
            "WEB_ONLY" | "WEB" => Some(Route::WebOnly),
            "BOTH" => Some(Route::Both),
            _ => None,
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let encoded = match self {
            Route::None => "none",
            Route::PdfOnly => "pdf_only",
            Route::WebOnly => "web_only",
            Route::Both => "both",
        };
        write!(f, "{encoded}")
    }
}

/// Which rule produced a routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteRule {
    Greeting,
    Recency,
    Textbook,
    Followup,
    Classifier,
    Fallback,
}

#[derive(Debug, Clone, Copy)]
pub struct RouteDecision {
    pub route: Route,
    pub rule: RouteRule,
}

const CLASSIFIER_SYSTEM: &str = "You classify student questions for an educational assistant \
that can search uploaded textbooks and the web. Respond with exactly one token and nothing \
else: NONE for greetings or small talk, PDF_ONLY for questions answerable from textbooks, \
WEB_ONLY for questions needing current information, BOTH when textbook and current \
information should be combined.";

/// Rule-based router with an LLM fallback for ambiguous queries.
pub struct Router {
    classifier: Option<Arc<dyn ChatModel>>,
    classifier_timeout: Duration,
}

impl Router {
    pub fn new(classifier: Option<Arc<dyn ChatModel>>, classifier_timeout: Duration) -> Self {
        Self {
            classifier,
            classifier_timeout,
        }
    }

    /// Decide the route for `query`.
    ///
    /// `index_populated` steers the deterministic fallback when the
    /// classifier cannot be consulted or returns an unusable label.
    pub async fn route(&self, query: &str, index_populated: bool) -> RouteDecision {
        if greeting_like(query) {
            return RouteDecision {
                route: Route::None,
                rule: RouteRule::Greeting,
            };
        }

        let recency = recency_signal(query);
        let textbook = textbook_signal(query);

        if recency && !textbook {
            return RouteDecision {
                route: Route::WebOnly,
                rule: RouteRule::Recency,
            };
        }
        if textbook && !recency {
            return RouteDecision {
                route: Route::PdfOnly,
                rule: RouteRule::Textbook,
            };
        }

        // Both patterns fired, or neither: ask the classifier.
        match self.classify(query).await {
            Some(route) => RouteDecision {
                route,
                rule: RouteRule::Classifier,
            },
            None => RouteDecision {
                route: if index_populated {
                    Route::PdfOnly
                } else {
                    Route::WebOnly
                },
                rule: RouteRule::Fallback,
            },
        }
    }

    async fn classify(&self, query: &str) -> Option<Route> {
        let classifier = self.classifier.as_ref()?;
        let prompt = format!("Question: {query}\n\nLabel:");
        let label = tokio::time::timeout(
            self.classifier_timeout,
            classifier.complete(CLASSIFIER_SYSTEM, &prompt),
        )
        .await;

        match label {
            Ok(Ok(raw)) => {
                let parsed = Route::parse_label(&raw);
                if parsed.is_none() {
                    tracing::warn!(label = %raw.trim(), "classifier returned an unknown label");
                }
                parsed
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "route classifier failed, using fallback");
                None
            }
            Err(_) => {
                tracing::warn!("route classifier timed out, using fallback");
                None
            }
        }
    }
}
