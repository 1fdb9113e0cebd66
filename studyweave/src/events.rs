//! The turn event stream: the typed channel between the state machine and
//! the caller.
//!
//! Per turn, the stream is `chunk* sources (done | error)` — zero or more
//! text deltas, exactly one sources summary, then a terminal event. The
//! channel is bounded: a slow consumer suspends the producer (that bounded
//! `send` is the generator's back-pressure point), and a dropped consumer
//! fails the next send, which the agent treats as cancellation.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::routing::Route;
use crate::sources::{PdfSourceRef, WebSourceRef};

/// Events on a turn stream, in wire order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// A text delta of the generated answer.
    Chunk { content: String },
    /// Attributed sources for the turn, emitted after all chunks.
    Sources {
        pdf_sources: Vec<PdfSourceRef>,
        web_sources: Vec<WebSourceRef>,
        route_used: Route,
    },
    /// Successful terminal event.
    Done,
    /// Failed terminal event with a user-safe message.
    Error { message: String },
}

/// Frame an event the way the HTTP layer ships it: `data: <json>\n\n`.
pub fn sse_frame(event: &TurnEvent) -> String {
    let json = serde_json::to_string(event).expect("turn events always serialize");
    format!("data: {json}\n\n")
}

/// Returned by emitter sends when the consumer has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamClosed;

/// Producer half of a turn stream, held by the state machine.
#[derive(Clone)]
pub struct TurnEmitter {
    tx: mpsc::Sender<TurnEvent>,
}

impl TurnEmitter {
    pub async fn chunk(&self, content: impl Into<String>) -> Result<(), StreamClosed> {
        self.send(TurnEvent::Chunk {
            content: content.into(),
        })
        .await
    }

    pub async fn sources(
        &self,
        pdf_sources: Vec<PdfSourceRef>,
        web_sources: Vec<WebSourceRef>,
        route_used: Route,
    ) -> Result<(), StreamClosed> {
        self.send(TurnEvent::Sources {
            pdf_sources,
            web_sources,
            route_used,
        })
        .await
    }

    pub async fn done(&self) -> Result<(), StreamClosed> {
        self.send(TurnEvent::Done).await
    }

    pub async fn error(&self, message: impl Into<String>) -> Result<(), StreamClosed> {
        self.send(TurnEvent::Error {
            message: message.into(),
        })
        .await
    }

    async fn send(&self, event: TurnEvent) -> Result<(), StreamClosed> {
        self.tx.send(event).await.map_err(|_| StreamClosed)
    }
}

/// Consumer half of a turn stream.
pub struct TurnStream {
    rx: mpsc::Receiver<TurnEvent>,
}

impl TurnStream {
    /// Next event, or `None` once the producer has finished.
    pub async fn next(&mut self) -> Option<TurnEvent> {
        self.rx.recv().await
    }

    /// Drain the remaining events (test helper and non-streaming chat).
    pub async fn collect(mut self) -> Vec<TurnEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }
}

/// Create a bounded turn channel.
pub fn turn_channel(capacity: usize) -> (TurnEmitter, TurnStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (TurnEmitter { tx }, TurnStream { rx })
}
