//! Run Chat use case.
//!
//! Executes a single-provider chat exchange — the continuation store's
//! second caller. Unlike [`RunConsensusUseCase`](super::run_consensus::RunConsensusUseCase),
//! a backend failure here is a hard error: there is one provider and no
//! partial-result semantics.

use crate::ports::context_loader::{ContextLoader, NoContext};
use crate::ports::continuation_store::ContinuationStore;
use crate::ports::provider_gateway::{
    InvokeOptions, ProviderError, ProviderErrorCode, ProviderGateway, ProviderRegistry,
    ResolutionError,
};
use conclave_domain::{
    ChatPrompt, ConversationState, DomainError, Message, OutcomeMetadata,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that fail a chat exchange
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Invalid request: {0}")]
    Validation(DomainError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Input for the [`RunChatUseCase`]
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: Option<f32>,
    /// Conversation to continue; unknown ids start a fresh one
    pub continuation_id: Option<String>,
    /// File paths to embed as context before the prompt
    pub files: Vec<String>,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            temperature: None,
            continuation_id: None,
            files: Vec::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_continuation(mut self, id: impl Into<String>) -> Self {
        self.continuation_id = Some(id.into());
        self
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.prompt.trim().is_empty() {
            return Err(DomainError::EmptyPrompt);
        }
        Ok(())
    }
}

/// Output of a chat exchange
#[derive(Debug, Clone, Serialize)]
pub struct ChatResult {
    pub conversation_id: String,
    pub model: String,
    pub provider: String,
    pub content: String,
    pub metadata: OutcomeMetadata,
}

/// Use case for a single-provider chat exchange
pub struct RunChatUseCase {
    registry: Arc<dyn ProviderRegistry>,
    store: Arc<dyn ContinuationStore>,
    context: Arc<dyn ContextLoader>,
    default_temperature: f32,
}

impl RunChatUseCase {
    pub fn new(registry: Arc<dyn ProviderRegistry>, store: Arc<dyn ContinuationStore>) -> Self {
        Self {
            registry,
            store,
            context: Arc::new(NoContext),
            default_temperature: 0.2,
        }
    }

    pub fn with_context_loader(mut self, context: Arc<dyn ContextLoader>) -> Self {
        self.context = context;
        self
    }

    pub fn with_default_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = temperature;
        self
    }

    pub async fn execute(&self, request: ChatRequest) -> Result<ChatResult, ChatError> {
        request.validate().map_err(ChatError::Validation)?;

        let gateway = self.registry.resolve(&request.model)?;
        info!("Chat with {} via {}", request.model, gateway.kind());

        let (conversation_id, mut state) =
            self.load_or_create(request.continuation_id.as_deref()).await;

        let bundle = self.context.load(&request.files).await;
        for failure in &bundle.failures {
            warn!("Context input {} skipped: {}", failure.path, failure.reason);
        }

        let mut conversation = vec![Message::system(ChatPrompt::system())];
        conversation.extend(state.messages.iter().cloned());
        conversation.extend(bundle.messages);
        conversation.push(Message::user(&request.prompt));

        let budget = gateway.capabilities(&request.model).timeout;
        let options = InvokeOptions::new(&request.model)
            .with_temperature(request.temperature.unwrap_or(self.default_temperature))
            .with_timeout(budget);

        let started = Instant::now();
        let response = match tokio::time::timeout(budget, gateway.invoke(&conversation, &options)).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(ChatError::Provider(ProviderError::new(
                    ProviderErrorCode::Timeout,
                    format!("Invocation timed out after {}s", budget.as_secs()),
                )));
            }
        };
        debug!("Model {} responded in {:?}", request.model, started.elapsed());

        state.push(Message::user(&request.prompt));
        state.push(Message::assistant(&response.content));
        state.set_meta("tool", serde_json::json!("chat"));
        state.set_meta("provider", serde_json::json!(gateway.kind().as_str()));
        state.set_meta("model", serde_json::json!(request.model));
        if let Err(error) = self.store.set(&conversation_id, state).await {
            warn!("Failed to persist chat turn: {}", error);
        }

        Ok(ChatResult {
            conversation_id,
            model: request.model,
            provider: gateway.kind().to_string(),
            content: response.content,
            metadata: OutcomeMetadata {
                response_time_ms: Some(started.elapsed().as_millis() as u64),
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
        })
    }

    async fn load_or_create(&self, continuation_id: Option<&str>) -> (String, ConversationState) {
        if let Some(id) = continuation_id
            && !id.trim().is_empty()
            && let Some(state) = self.store.get(id).await
        {
            debug!("Continuing conversation {} ({} messages)", id, state.messages.len());
            return (id.to_string(), state);
        }

        let id = ConversationState::mint_id();
        debug!("Starting new conversation {}", id);
        let state = ConversationState::new(&id);
        (id, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::continuation_store::{StoreError, StoreStats};
    use crate::ports::provider_gateway::{
        InvokeResponse, ModelCapabilities, ProviderGateway,
    };
    use async_trait::async_trait;
    use conclave_domain::{ProviderKind, Role};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    // ==================== Test Mocks ====================

    struct MockGateway {
        reply: Option<String>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl MockGateway {
        fn replying(text: &str) -> Self {
            Self {
                reply: Some(text.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ProviderGateway for MockGateway {
        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }

        fn is_available(&self) -> bool {
            true
        }

        fn capabilities(&self, _model: &str) -> ModelCapabilities {
            ModelCapabilities {
                timeout: Duration::from_secs(5),
            }
        }

        async fn invoke(
            &self,
            conversation: &[Message],
            _options: &InvokeOptions,
        ) -> Result<InvokeResponse, ProviderError> {
            self.seen.lock().unwrap().push(conversation.to_vec());
            match &self.reply {
                Some(text) => Ok(InvokeResponse::new(text.clone(), "stop")),
                None => Err(ProviderError::new(
                    ProviderErrorCode::RateLimited,
                    "slow down",
                )),
            }
        }
    }

    struct MockRegistry {
        gateway: Arc<MockGateway>,
    }

    impl ProviderRegistry for MockRegistry {
        fn resolve(&self, model: &str) -> Result<Arc<dyn ProviderGateway>, ResolutionError> {
            if ProviderKind::infer(model).is_some() {
                Ok(Arc::clone(&self.gateway) as Arc<dyn ProviderGateway>)
            } else {
                Err(ResolutionError::UnknownModel(model.to_string()))
            }
        }
    }

    struct MockStore {
        entries: Mutex<HashMap<String, ConversationState>>,
        fail_writes: bool,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                entries: Mutex::new(HashMap::new()),
                fail_writes: false,
            }
        }
    }

    #[async_trait]
    impl ContinuationStore for MockStore {
        async fn set(&self, id: &str, state: ConversationState) -> Result<(), StoreError> {
            if self.fail_writes {
                return Err(StoreError::Backend("write refused".to_string()));
            }
            self.entries.lock().unwrap().insert(id.to_string(), state);
            Ok(())
        }

        async fn get(&self, id: &str) -> Option<ConversationState> {
            self.entries.lock().unwrap().get(id).cloned()
        }

        async fn delete(&self, id: &str) -> bool {
            self.entries.lock().unwrap().remove(id).is_some()
        }

        async fn exists(&self, id: &str) -> bool {
            self.entries.lock().unwrap().contains_key(id)
        }

        async fn cleanup(&self, _max_age: Duration) -> usize {
            0
        }

        async fn stats(&self) -> StoreStats {
            StoreStats {
                count: self.entries.lock().unwrap().len(),
                backend: "mock",
            }
        }
    }

    fn chat(gateway: MockGateway, store: Arc<MockStore>) -> (Arc<MockGateway>, RunChatUseCase) {
        let gateway = Arc::new(gateway);
        let uc = RunChatUseCase::new(
            Arc::new(MockRegistry {
                gateway: Arc::clone(&gateway),
            }),
            store,
        );
        (gateway, uc)
    }

    // ==================== Tests ====================

    #[tokio::test]
    async fn test_chat_round_trips_the_conversation() {
        let store = Arc::new(MockStore::new());
        let (_gateway, uc) = chat(MockGateway::replying("hello back"), Arc::clone(&store));

        let result = uc.execute(ChatRequest::new("hello", "gpt-4o")).await.unwrap();

        assert_eq!(result.content, "hello back");
        assert_eq!(result.provider, "openai");

        let state = store.get(&result.conversation_id).await.unwrap();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].role, Role::User);
        assert_eq!(state.messages[1].content, "hello back");
    }

    #[tokio::test]
    async fn test_chat_replays_prior_history_to_the_backend() {
        let store = Arc::new(MockStore::new());
        store
            .set("c1", {
                let mut s = ConversationState::new("c1");
                s.push(Message::user("first question"));
                s.push(Message::assistant("first answer"));
                s
            })
            .await
            .unwrap();
        let (gateway, uc) = chat(MockGateway::replying("second answer"), Arc::clone(&store));

        let request = ChatRequest::new("second question", "gpt-4o").with_continuation("c1");
        let result = uc.execute(request).await.unwrap();

        assert_eq!(result.conversation_id, "c1");

        let seen = gateway.seen.lock().unwrap();
        let contents: Vec<&str> = seen[0].iter().map(|m| m.content.as_str()).collect();
        // system prompt, replayed history in order, then the new prompt
        assert!(contents[1..].starts_with(&["first question", "first answer", "second question"]));

        let state = store.get("c1").await.unwrap();
        assert_eq!(state.messages.len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_continuation_mints_fresh_id() {
        let store = Arc::new(MockStore::new());
        let (_gateway, uc) = chat(MockGateway::replying("hi"), Arc::clone(&store));

        let request = ChatRequest::new("hello", "gpt-4o").with_continuation("gone");
        let result = uc.execute(request).await.unwrap();

        assert_ne!(result.conversation_id, "gone");
        assert!(store.exists(&result.conversation_id).await);
    }

    #[tokio::test]
    async fn test_empty_prompt_is_rejected() {
        let (_gateway, uc) = chat(MockGateway::replying("hi"), Arc::new(MockStore::new()));

        let result = uc.execute(ChatRequest::new("   ", "gpt-4o")).await;
        assert!(matches!(
            result,
            Err(ChatError::Validation(DomainError::EmptyPrompt))
        ));
    }

    #[tokio::test]
    async fn test_unresolvable_model_is_a_hard_error() {
        let (_gateway, uc) = chat(MockGateway::replying("hi"), Arc::new(MockStore::new()));

        let result = uc.execute(ChatRequest::new("hello", "mystery-model")).await;
        assert!(matches!(result, Err(ChatError::Resolution(_))));
    }

    #[tokio::test]
    async fn test_provider_failure_propagates_with_code() {
        let (_gateway, uc) = chat(MockGateway::failing(), Arc::new(MockStore::new()));

        let result = uc.execute(ChatRequest::new("hello", "gpt-4o")).await;
        match result {
            Err(ChatError::Provider(error)) => {
                assert_eq!(error.code, ProviderErrorCode::RateLimited);
            }
            other => panic!("Expected provider error, got {:?}", other.map(|r| r.content)),
        }
    }

    #[tokio::test]
    async fn test_store_write_failure_is_swallowed() {
        let store = Arc::new(MockStore {
            entries: Mutex::new(HashMap::new()),
            fail_writes: true,
        });
        let (_gateway, uc) = chat(MockGateway::replying("hi"), store);

        let result = uc.execute(ChatRequest::new("hello", "gpt-4o")).await;
        assert!(result.is_ok());
    }
}
