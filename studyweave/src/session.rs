//! In-memory session registry with bounded per-session history.
//!
//! The registry lock is a plain mutex held only for map access; each
//! session carries its own async mutex, held for the duration of a turn so
//! turns within one session are strictly serial while distinct sessions
//! run fully concurrently. Sessions are ephemeral: process lifetime only.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::error::AgentError;
use crate::message::Message;

/// One conversation's state.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_touched_at: DateTime<Utc>,
    max_history: usize,
}

impl Session {
    fn new(id: Uuid, max_history: usize) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: Vec::new(),
            created_at: now,
            last_touched_at: now,
            max_history,
        }
    }

    /// Append a completed turn (user + assistant), evicting the oldest
    /// pair while over the history bound.
    pub fn push_turn(&mut self, user: Message, assistant: Message) {
        self.messages.push(user);
        self.messages.push(assistant);
        self.evict();
    }

    /// Append only the user message (turn failed after becoming visible).
    pub fn push_user(&mut self, user: Message) {
        self.messages.push(user);
        self.evict();
    }

    fn evict(&mut self) {
        while self.messages.len() > self.max_history {
            let oldest_pair = 2.min(self.messages.len());
            self.messages.drain(0..oldest_pair);
        }
        self.last_touched_at = Utc::now();
    }
}

/// Process-wide map of chat sessions.
pub struct SessionManager {
    max_history: usize,
    sessions: Mutex<FxHashMap<Uuid, Arc<tokio::sync::Mutex<Session>>>>,
}

impl SessionManager {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            sessions: Mutex::new(FxHashMap::default()),
        }
    }

    /// Fetch the session for `requested`, or create a fresh one when no id
    /// was supplied or the id is unknown.
    pub fn get_or_create(&self, requested: Option<Uuid>) -> (Uuid, Arc<tokio::sync::Mutex<Session>>) {
        let mut sessions = self.sessions.lock().expect("session registry poisoned");
        if let Some(id) = requested {
            if let Some(session) = sessions.get(&id) {
                return (id, Arc::clone(session));
            }
        }
        let id = Uuid::new_v4();
        let session = Arc::new(tokio::sync::Mutex::new(Session::new(id, self.max_history)));
        sessions.insert(id, Arc::clone(&session));
        tracing::info!(session = %id, "created chat session");
        (id, session)
    }

    fn get(&self, id: Uuid) -> Result<Arc<tokio::sync::Mutex<Session>>, AgentError> {
        self.sessions
            .lock()
            .expect("session registry poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| AgentError::SessionNotFound {
                session_id: id.to_string(),
            })
    }

    /// History snapshot for an existing session.
    pub async fn history(&self, id: Uuid) -> Result<Vec<Message>, AgentError> {
        let session = self.get(id)?;
        let guard = session.lock().await;
        Ok(guard.messages.clone())
    }

    /// Drop a session entirely.
    pub fn clear(&self, id: Uuid) -> Result<(), AgentError> {
        let removed = self
            .sessions
            .lock()
            .expect("session registry poisoned")
            .remove(&id);
        match removed {
            Some(_) => {
                tracing::info!(session = %id, "cleared chat session");
                Ok(())
            }
            None => Err(AgentError::SessionNotFound {
                session_id: id.to_string(),
            }),
        }
    }
}
