//! The chat service: sessions + agent + turn streams.
//!
//! This is the boundary the HTTP layer talks to. Each turn locks its
//! session for the duration (serial turns per session), runs the state
//! machine under the turn deadline, and owns the history bookkeeping:
//!
//! - success: append the user and assistant messages;
//! - user-visible failure (an `error` event was delivered): append only
//!   the user message;
//! - cancellation (caller went away): append nothing.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::agent::HybridAgent;
use crate::error::AgentError;
use crate::events::{turn_channel, TurnEvent, TurnStream};
use crate::message::Message;
use crate::routing::Route;
use crate::session::SessionManager;
use crate::sources::{PdfSourceRef, WebSourceRef};

/// Buffered events per turn stream; beyond this the generator suspends
/// until the caller drains.
const TURN_CHANNEL_CAPACITY: usize = 32;

/// Source attribution for the non-streaming response body.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub route_used: Route,
    pub pdf_sources: Vec<PdfSourceRef>,
    pub web_sources: Vec<WebSourceRef>,
}

/// Outcome of a non-streaming chat turn.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub response: String,
    pub session_id: Uuid,
    pub sources: Option<SourceSummary>,
}

pub struct ChatService {
    agent: Arc<HybridAgent>,
    sessions: Arc<SessionManager>,
    turn_deadline: Duration,
}

impl ChatService {
    pub fn new(agent: Arc<HybridAgent>, sessions: Arc<SessionManager>, turn_deadline: Duration) -> Self {
        Self {
            agent,
            sessions,
            turn_deadline,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Start a streamed turn; events arrive on the returned stream.
    pub fn chat_stream(
        &self,
        message: String,
        session_id: Option<Uuid>,
        use_rag: bool,
    ) -> (Uuid, TurnStream) {
        let (emitter, stream) = turn_channel(TURN_CHANNEL_CAPACITY);
        let (session_id, session) = self.sessions.get_or_create(session_id);
        let agent = Arc::clone(&self.agent);
        let deadline = self.turn_deadline;

        tokio::spawn(async move {
            // Holding the session lock across the turn serializes turns
            // within a session; other sessions proceed concurrently.
            let mut session = session.lock().await;
            let history = session.messages.clone();

            let outcome = tokio::time::timeout(
                deadline,
                agent.run_turn(&message, &history, use_rag, &emitter),
            )
            .await;

            match outcome {
                Ok(Ok(record)) => {
                    session.push_turn(Message::user(&message), Message::assistant(&record.answer));
                }
                Ok(Err(AgentError::Cancelled)) => {
                    tracing::info!(session = %session.id, "turn cancelled by caller");
                }
                Ok(Err(err)) => {
                    tracing::warn!(session = %session.id, error = %err, "turn failed");
                    if emitter.error(err.user_safe_message()).await.is_ok() {
                        session.push_user(Message::user(&message));
                    }
                }
                Err(_) => {
                    tracing::warn!(session = %session.id, "turn deadline exceeded");
                    let message_text = AgentError::TurnDeadlineExceeded.user_safe_message();
                    if emitter.error(message_text).await.is_ok() {
                        session.push_user(Message::user(&message));
                    }
                }
            }
        });

        (session_id, stream)
    }

    /// Non-streaming chat: drain the turn stream into one response.
    pub async fn chat(
        &self,
        message: String,
        session_id: Option<Uuid>,
        use_rag: bool,
    ) -> Result<ChatOutcome, AgentError> {
        let (session_id, stream) = self.chat_stream(message, session_id, use_rag);

        let mut response = String::new();
        let mut sources = None;
        for event in stream.collect().await {
            match event {
                TurnEvent::Chunk { content } => response.push_str(&content),
                TurnEvent::Sources {
                    pdf_sources,
                    web_sources,
                    route_used,
                } => {
                    sources = Some(SourceSummary {
                        route_used,
                        pdf_sources,
                        web_sources,
                    });
                }
                TurnEvent::Done => {}
                TurnEvent::Error { message } => {
                    return Err(AgentError::TurnFailed { message });
                }
            }
        }

        Ok(ChatOutcome {
            response,
            session_id,
            sources,
        })
    }

    pub async fn history(&self, session_id: Uuid) -> Result<Vec<Message>, AgentError> {
        self.sessions.history(session_id).await
    }

    pub fn clear(&self, session_id: Uuid) -> Result<(), AgentError> {
        self.sessions.clear(session_id)
    }
}
