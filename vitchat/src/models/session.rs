//! In-memory chat session: an append-only, insertion-ordered message list.

use serde::{Deserialize, Serialize};

use super::message::Message;

/// An ordered sequence of messages for one conversation.
///
/// Mutable only by appending; "new chat" resets it to empty. Nothing is
/// persisted across sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatSession {
    messages: Vec<Message>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, returning a reference to the stored copy.
    pub fn push(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        self.messages.last().unwrap()
    }

    /// Append a user message built from raw text.
    pub fn push_user(&mut self, content: impl Into<String>) -> &Message {
        self.push(Message::user(content))
    }

    /// Append an assistant message built from raw text.
    pub fn push_assistant(&mut self, content: impl Into<String>) -> &Message {
        self.push(Message::assistant(content))
    }

    /// All messages in insertion order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Reset to an empty session ("new chat").
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
