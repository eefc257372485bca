//! Context loader port
//!
//! Boundary to the context-processing collaborator: given file paths,
//! produce zero-or-more messages to splice into the conversation before
//! the user prompt, plus per-input failures that never abort the request.

use async_trait::async_trait;
use conclave_domain::Message;

/// One context input that could not be loaded
#[derive(Debug, Clone)]
pub struct ContextFailure {
    pub path: String,
    pub reason: String,
}

/// The loader's output for one batch of paths
#[derive(Debug, Clone, Default)]
pub struct ContextBundle {
    pub messages: Vec<Message>,
    pub failures: Vec<ContextFailure>,
}

#[async_trait]
pub trait ContextLoader: Send + Sync {
    async fn load(&self, paths: &[String]) -> ContextBundle;
}

/// No-op loader used when a caller supplies no context inputs
pub struct NoContext;

#[async_trait]
impl ContextLoader for NoContext {
    async fn load(&self, _paths: &[String]) -> ContextBundle {
        ContextBundle::default()
    }
}
