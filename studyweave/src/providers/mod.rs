//! External model and search providers behind substitution seams.
//!
//! The agent only ever sees these traits; production wires the rig-backed
//! OpenAI chat model and the Exa search tool, tests wire mocks.

mod exa;
mod openai;

pub use exa::ExaSearch;
pub use openai::OpenAiChat;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::ProviderError;
use crate::message::Message;
use crate::sources::WebResult;

/// A stream of answer text deltas.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Generative chat model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One-shot completion (router classifier, non-streaming helpers).
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError>;

    /// Streaming generation over the session history plus the new prompt.
    ///
    /// An `Err` here means no delta was ever produced; errors yielded by
    /// the stream itself mean the generation broke mid-flight.
    async fn stream(
        &self,
        system: &str,
        history: &[Message],
        prompt: &str,
    ) -> Result<TokenStream, ProviderError>;
}

/// Remote web-search provider.
///
/// Both operations are idempotent reads with provider-side timeouts. The
/// state machine maps any `Err` to an empty result list and continues.
#[async_trait]
pub trait WebSearchTool: Send + Sync {
    /// Search bounded to roughly the last `days_back` days.
    async fn search_recent(
        &self,
        query: &str,
        num_results: usize,
        days_back: u32,
    ) -> Result<Vec<WebResult>, ProviderError>;

    /// Semantic search biased toward educational material.
    async fn search_educational(
        &self,
        query: &str,
        num_results: usize,
    ) -> Result<Vec<WebResult>, ProviderError>;
}
