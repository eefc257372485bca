//! In-memory continuation store
//!
//! Reference backend for ephemeral sessions where conversations only need
//! to persist for the life of the process. Bounded in two dimensions:
//! total conversation count (oldest-inserted evicted first, simple FIFO so
//! eviction stays O(1)) and messages per conversation (oldest trimmed).
//! A background sweeper removes entries whose `last_accessed` exceeds the
//! TTL; it is owned by the store — spawned on construction, stopped by
//! [`shutdown`](InMemoryContinuationStore::shutdown).

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use conclave_application::ports::continuation_store::{ContinuationStore, StoreError, StoreStats};
use conclave_domain::ConversationState;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Tuning for the in-memory backend
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Total conversation bound; exceeding it evicts the oldest-inserted
    pub max_conversations: usize,
    /// Per-conversation message bound; exceeding it drops the oldest
    pub max_messages: usize,
    /// Entries untouched for longer than this are swept
    pub ttl: Duration,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_conversations: 1000,
            max_messages: 100,
            ttl: Duration::from_secs(3 * 3600),
        }
    }
}

impl MemoryStoreConfig {
    pub fn with_max_conversations(mut self, max: usize) -> Self {
        self.max_conversations = max;
        self
    }

    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = max;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

struct Inner {
    entries: HashMap<String, ConversationState>,
    /// Ids in insertion order; may hold ids already removed, which the
    /// eviction loop skips
    insertion_order: VecDeque<String>,
}

/// Thread-safe in-memory store for conversation state
pub struct InMemoryContinuationStore {
    inner: Mutex<Inner>,
    config: MemoryStoreConfig,
    shutdown: CancellationToken,
}

impl InMemoryContinuationStore {
    /// Create the store and spawn its background sweeper.
    ///
    /// Must be called from within a tokio runtime. The sweeper runs at
    /// one tenth of the TTL, clamped to at least five minutes, and stops
    /// when [`shutdown`](Self::shutdown) is called or the store is dropped.
    pub fn new(config: MemoryStoreConfig) -> Arc<Self> {
        let store = Arc::new(Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                insertion_order: VecDeque::new(),
            }),
            config: config.clone(),
            shutdown: CancellationToken::new(),
        });

        let interval = (config.ttl / 10).max(Duration::from_secs(300));
        info!(
            "In-memory store initialized: {} conversations max, ttl {:?}, sweep every {:?}",
            config.max_conversations, config.ttl, interval
        );

        let weak = Arc::downgrade(&store);
        let token = store.shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(store) = weak.upgrade() else { break };
                        let removed = store.cleanup(store.config.ttl).await;
                        if removed > 0 {
                            debug!("Sweeper removed {} stale conversations", removed);
                        }
                    }
                }
            }
        });

        store
    }

    /// Stop the background sweeper
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn validate_id(id: &str) -> Result<(), StoreError> {
        if id.is_empty() || id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(StoreError::InvalidIdentifier(id.to_string()));
        }
        Ok(())
    }

    fn is_expired(&self, last_accessed: DateTime<Utc>) -> bool {
        let max_age = TimeDelta::from_std(self.config.ttl).unwrap_or(TimeDelta::MAX);
        Utc::now().signed_duration_since(last_accessed) > max_age
    }

    /// Pop insertion-order ids until one actually removes an entry;
    /// already-removed ids are skipped.
    fn evict_oldest(inner: &mut Inner) {
        while let Some(oldest) = inner.insertion_order.pop_front() {
            if inner.entries.remove(&oldest).is_some() {
                debug!("Evicted oldest conversation {}", oldest);
                break;
            }
        }
    }
}

impl Drop for InMemoryContinuationStore {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl ContinuationStore for InMemoryContinuationStore {
    async fn set(&self, id: &str, mut state: ConversationState) -> Result<(), StoreError> {
        Self::validate_id(id)?;
        if state.id != id {
            return Err(StoreError::InvalidState(format!(
                "state belongs to conversation '{}', not '{}'",
                state.id, id
            )));
        }

        let dropped = state.trim_to(self.config.max_messages);
        if dropped > 0 {
            debug!("Trimmed {} oldest messages from conversation {}", dropped, id);
        }
        state.touch();

        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if let Some(original_created_at) = inner.entries.get(id).map(|e| e.created_at) {
            state.created_at = original_created_at;
            inner.entries.insert(id.to_string(), state);
        } else {
            if inner.entries.len() >= self.config.max_conversations {
                Self::evict_oldest(&mut inner);
            }
            inner.insertion_order.push_back(id.to_string());
            inner.entries.insert(id.to_string(), state);
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Option<ConversationState> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let expired = match inner.entries.get(id) {
            Some(state) => self.is_expired(state.last_accessed),
            None => return None,
        };
        if expired {
            inner.entries.remove(id);
            debug!("Conversation {} expired on read", id);
            return None;
        }
        inner.entries.get(id).cloned()
    }

    async fn delete(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.entries.remove(id).is_some()
    }

    async fn exists(&self, id: &str) -> bool {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner
            .entries
            .get(id)
            .is_some_and(|state| !self.is_expired(state.last_accessed))
    }

    async fn cleanup(&self, max_age: Duration) -> usize {
        let cutoff = TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX);
        let now = Utc::now();
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let stale: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, state)| now.signed_duration_since(state.last_accessed) > cutoff)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            inner.entries.remove(id);
        }
        stale.len()
    }

    async fn stats(&self) -> StoreStats {
        let inner = self.inner.lock().expect("store mutex poisoned");
        StoreStats {
            count: inner.entries.len(),
            backend: "memory",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_domain::Message;

    fn small_store(max_conversations: usize) -> Arc<InMemoryContinuationStore> {
        InMemoryContinuationStore::new(
            MemoryStoreConfig::default().with_max_conversations(max_conversations),
        )
    }

    fn state_with_messages(id: &str, count: usize) -> ConversationState {
        let mut state = ConversationState::new(id);
        for i in 0..count {
            state.push(Message::user(format!("msg-{}", i)));
        }
        state
    }

    #[tokio::test]
    async fn test_set_get_round_trip() {
        let store = small_store(10);
        store.set("c1", state_with_messages("c1", 3)).await.unwrap();

        let state = store.get("c1").await.unwrap();
        assert_eq!(state.messages.len(), 3);
        assert_eq!(state.messages[0].content, "msg-0");
        assert!(store.exists("c1").await);
    }

    #[tokio::test]
    async fn test_get_unknown_id_is_absent_not_an_error() {
        let store = small_store(10);
        assert!(store.get("missing").await.is_none());
        assert!(!store.exists("missing").await);
    }

    #[tokio::test]
    async fn test_invalid_identifiers_are_rejected() {
        let store = small_store(10);
        for id in ["", "has space", "has\nnewline", "has\tcontrol"] {
            let result = store.set(id, ConversationState::new(id)).await;
            assert!(
                matches!(result, Err(StoreError::InvalidIdentifier(_))),
                "id {:?} should be rejected",
                id
            );
        }
    }

    #[tokio::test]
    async fn test_mismatched_state_id_is_invalid_state() {
        let store = small_store(10);
        let result = store.set("c1", ConversationState::new("c2")).await;
        assert!(matches!(result, Err(StoreError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_update_preserves_created_at() {
        let store = small_store(10);
        store.set("c1", state_with_messages("c1", 1)).await.unwrap();
        let first = store.get("c1").await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        store.set("c1", state_with_messages("c1", 2)).await.unwrap();
        let second = store.get("c1").await.unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert!(second.last_accessed > first.last_accessed);
    }

    #[tokio::test]
    async fn test_fifo_eviction_at_conversation_cap() {
        let store = small_store(2);
        store.set("c1", ConversationState::new("c1")).await.unwrap();
        store.set("c2", ConversationState::new("c2")).await.unwrap();
        store.set("c3", ConversationState::new("c3")).await.unwrap();

        // Oldest-inserted goes first, regardless of access
        assert!(!store.exists("c1").await);
        assert!(store.exists("c2").await);
        assert!(store.exists("c3").await);
        assert_eq!(store.stats().await.count, 2);
    }

    #[tokio::test]
    async fn test_upsert_does_not_count_as_new_insertion() {
        let store = small_store(2);
        store.set("c1", ConversationState::new("c1")).await.unwrap();
        store.set("c2", ConversationState::new("c2")).await.unwrap();
        // Re-writing c1 must not evict anything
        store.set("c1", state_with_messages("c1", 1)).await.unwrap();

        assert!(store.exists("c1").await);
        assert!(store.exists("c2").await);
    }

    #[tokio::test]
    async fn test_eviction_skips_already_deleted_ids() {
        let store = small_store(2);
        store.set("c1", ConversationState::new("c1")).await.unwrap();
        store.set("c2", ConversationState::new("c2")).await.unwrap();
        assert!(store.delete("c1").await);

        // c1's queue slot is stale; inserting two more must evict c2, not
        // silently fail on the stale id.
        store.set("c3", ConversationState::new("c3")).await.unwrap();
        store.set("c4", ConversationState::new("c4")).await.unwrap();

        assert!(!store.exists("c2").await);
        assert!(store.exists("c3").await);
        assert!(store.exists("c4").await);
    }

    #[tokio::test]
    async fn test_message_cap_drops_oldest() {
        let store = InMemoryContinuationStore::new(
            MemoryStoreConfig::default().with_max_messages(5),
        );
        store.set("c1", state_with_messages("c1", 8)).await.unwrap();

        let state = store.get("c1").await.unwrap();
        assert_eq!(state.messages.len(), 5);
        assert_eq!(state.messages[0].content, "msg-3");
        assert_eq!(state.messages[4].content, "msg-7");
    }

    #[tokio::test]
    async fn test_delete_reports_whether_something_was_removed() {
        let store = small_store(10);
        store.set("c1", ConversationState::new("c1")).await.unwrap();

        assert!(store.delete("c1").await);
        assert!(!store.delete("c1").await);
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_stale_entries() {
        let store = small_store(10);
        store.set("c1", ConversationState::new("c1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        store.set("c2", ConversationState::new("c2")).await.unwrap();

        // c1 is ~30ms old, c2 is fresh
        let removed = store.cleanup(Duration::from_millis(15)).await;
        assert_eq!(removed, 1);
        assert!(!store.exists("c1").await);
        assert!(store.exists("c2").await);

        assert_eq!(store.cleanup(Duration::from_secs(3600)).await, 0);
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent() {
        let store = InMemoryContinuationStore::new(
            MemoryStoreConfig::default().with_ttl(Duration::from_millis(30)),
        );
        store.set("c1", ConversationState::new("c1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(store.get("c1").await.is_none());
    }

    #[tokio::test]
    async fn test_stats_reports_backend_and_count() {
        let store = small_store(10);
        store.set("c1", ConversationState::new("c1")).await.unwrap();

        let stats = store.stats().await;
        assert_eq!(stats.count, 1);
        assert_eq!(stats.backend, "memory");
    }
}
