//! Conversation messages.
//!
//! Messages are the unit of session history: each completed turn appends a
//! user/assistant pair, and the generator receives the bounded tail of
//! this history alongside the fused context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message in a conversation: role, text content, and when it was said.
///
/// # Examples
///
/// ```
/// use studyweave::message::Message;
///
/// let question = Message::user("What is a rational number?");
/// assert_eq!(question.role, Message::USER);
///
/// let answer = Message::assistant("A number expressible as p/q.");
/// assert!(answer.has_role(Message::ASSISTANT));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the sender (`user`, `assistant`, or `system`).
    pub role: String,
    /// The text content.
    pub content: String,
    /// When the message entered the session.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// User input message role.
    pub const USER: &'static str = "user";
    /// Assistant response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System prompt message role.
    pub const SYSTEM: &'static str = "system";

    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

impl From<&str> for Message {
    /// A bare string is a user message.
    fn from(content: &str) -> Self {
        Self::user(content)
    }
}

impl From<(&str, &str)> for Message {
    /// A `(role, content)` tuple builds a message with that role.
    fn from((role, content): (&str, &str)) -> Self {
        Self::new(role, content)
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.role, self.content)
    }
}
