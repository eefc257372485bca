//! Continuation store port
//!
//! A keyed, TTL-bounded map from conversation id to conversation state.
//! Any backend may implement this; the reference in-memory backend lives
//! in the infrastructure layer. Operations on distinct ids must appear
//! atomic to concurrent callers; same-id serialization is the caller's
//! job (the use cases write once per turn, after all phase computation).

use async_trait::async_trait;
use conclave_domain::ConversationState;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Store operation failures
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Invalid conversation identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Invalid conversation state: {0}")]
    InvalidState(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Store snapshot for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub count: usize,
    pub backend: &'static str,
}

#[async_trait]
pub trait ContinuationStore: Send + Sync {
    /// Upsert a conversation.
    ///
    /// Bumps `last_accessed`; preserves the original `created_at` across
    /// updates. Fails with [`StoreError::InvalidIdentifier`] for an
    /// empty/malformed id and [`StoreError::InvalidState`] when the state
    /// does not belong to that id.
    async fn set(&self, id: &str, state: ConversationState) -> Result<(), StoreError>;

    /// Fetch a conversation. Absent is a normal outcome, not an error;
    /// backends treat read failures as absent.
    async fn get(&self, id: &str) -> Option<ConversationState>;

    /// Remove a conversation; `true` if something was removed.
    async fn delete(&self, id: &str) -> bool;

    async fn exists(&self, id: &str) -> bool;

    /// Remove entries whose `last_accessed` is older than `max_age`,
    /// returning how many were removed. Also runs on the store's own
    /// background timer, never driven by callers.
    async fn cleanup(&self, max_age: Duration) -> usize;

    async fn stats(&self) -> StoreStats;
}
