//! Conversation entities
//!
//! A [`ConversationState`] is the unit the continuation store persists:
//! an ordered message history addressed by an opaque id, replayed verbatim
//! to backends on the next turn. Messages are only appended, or trimmed
//! from the oldest end under the store's per-conversation cap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in a conversation (Entity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Persisted state of one conversation (Entity)
///
/// Owned exclusively by the continuation store; callers mutate it only
/// between a `get` and the single `set` that ends their turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    /// Opaque conversation id, minted as a random token
    pub id: String,
    /// Ordered message history; insertion order is meaningful
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Free-form attribution (tool, provider, model used)
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ConversationState {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: Vec::new(),
            created_at: now,
            last_accessed: now,
            metadata: HashMap::new(),
        }
    }

    /// Mint a fresh conversation id
    pub fn mint_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Append a message, preserving insertion order
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Keep only the `max` most recent messages, dropping the oldest.
    ///
    /// Returns how many messages were dropped.
    pub fn trim_to(&mut self, max: usize) -> usize {
        if self.messages.len() <= max {
            return 0;
        }
        let dropped = self.messages.len() - max;
        self.messages.drain(..dropped);
        dropped
    }

    pub fn touch(&mut self) {
        self.last_accessed = Utc::now();
    }
}
