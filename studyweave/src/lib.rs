//! ```text
//! ChatService ─┬─► SessionManager (bounded history, per-session lock)
//!              │
//!              └─► HybridAgent ──► Router (rules ─► LLM fallback)
//!                      │
//!                      ├─► pdf task ──► sw-corpus Retriever/VectorIndex
//!                      ├─► web task ──► WebSearchTool (Exa)
//!                      │        (parallel, deadline-joined)
//!                      ├─► fuse ──► combined context
//!                      └─► ChatModel (streaming) ──► TurnEmitter
//!                                                       │
//!                                 TurnStream ◄──────────┘
//!                                 (chunk* sources done|error)
//! ```
//!
//! Studyweave's core: the hybrid retrieval state machine, per-session
//! conversation history, and the typed event stream the HTTP surface
//! frames as server-sent events. External services (embeddings, vector
//! index, chat model, web search) sit behind traits so everything here is
//! testable with mocks.

pub mod agent;
pub mod config;
pub mod error;
pub mod events;
pub mod message;
pub mod providers;
pub mod routing;
pub mod service;
pub mod session;
pub mod sources;
pub mod state;

pub use agent::{AgentConfig, HybridAgent, TurnRecord};
pub use config::{AppConfig, ConfigError};
pub use error::{AgentError, ProviderError};
pub use events::{sse_frame, turn_channel, TurnEmitter, TurnEvent, TurnStream};
pub use message::Message;
pub use routing::{Route, Router};
pub use service::{ChatOutcome, ChatService, SourceSummary};
pub use session::SessionManager;
pub use sources::{PdfSourceRef, WebResult, WebSourceRef};
