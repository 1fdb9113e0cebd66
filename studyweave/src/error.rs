//! Error taxonomy for the agent core.
//!
//! Retrieval-path failures (embedding, vector search, web search, route
//! classification) are recovered locally inside the state machine and
//! never reach this type; they degrade the relevant context to empty.
//! Only the failures listed here terminate a turn or surface to callers.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AgentError {
    /// The generator produced no deltas at all.
    #[error("generation unavailable: {message}")]
    #[diagnostic(
        code(studyweave::agent::generation_unavailable),
        help("Check the LLM provider credentials and connectivity.")
    )]
    GenerationUnavailable { message: String },

    /// The generator failed after emitting partial deltas. The partial
    /// answer is discarded and never appended to session history.
    #[error("generation interrupted mid-stream: {message}")]
    #[diagnostic(code(studyweave::agent::generation_interrupted))]
    GenerationInterrupted { message: String },

    /// The caller disconnected; the turn was abandoned cleanly.
    #[error("turn cancelled by the caller")]
    #[diagnostic(code(studyweave::agent::cancelled))]
    Cancelled,

    /// The per-turn deadline expired.
    #[error("turn deadline exceeded")]
    #[diagnostic(code(studyweave::agent::turn_deadline))]
    TurnDeadlineExceeded,

    /// Explicit history/clear lookups on an unknown session.
    #[error("session not found: {session_id}")]
    #[diagnostic(code(studyweave::session::not_found))]
    SessionNotFound { session_id: String },

    /// A non-streaming chat turn ended with an error event.
    #[error("turn failed: {message}")]
    #[diagnostic(code(studyweave::agent::turn_failed))]
    TurnFailed { message: String },
}

impl AgentError {
    /// Message safe to show to the end user in an `error` event.
    pub fn user_safe_message(&self) -> String {
        match self {
            AgentError::GenerationUnavailable { .. } | AgentError::GenerationInterrupted { .. } => {
                "I apologize, but I encountered an error generating a response. Please try again."
                    .to_string()
            }
            AgentError::TurnDeadlineExceeded => {
                "The request took too long to answer. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Provider-level failures, recovered at the call site.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(String),

    #[error("provider call timed out")]
    Timeout,

    #[error("provider returned an unusable response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Request(err.to_string())
        }
    }
}
