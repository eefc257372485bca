//! Provider gateway port
//!
//! Defines the unified invocation contract every model backend conforms
//! to, and the registry that maps model names onto backends. The
//! orchestrator never inspects vendor-specific shapes beyond this surface.

use async_trait::async_trait;
use conclave_domain::{Message, ProviderKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Machine-readable classification of provider failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderErrorCode {
    RateLimited,
    InvalidCredential,
    ModelNotFound,
    ContextTooLarge,
    Timeout,
    Network,
    Backend,
}

impl ProviderErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorCode::RateLimited => "rate-limited",
            ProviderErrorCode::InvalidCredential => "invalid-credential",
            ProviderErrorCode::ModelNotFound => "model-not-found",
            ProviderErrorCode::ContextTooLarge => "context-too-large",
            ProviderErrorCode::Timeout => "timeout",
            ProviderErrorCode::Network => "network",
            ProviderErrorCode::Backend => "backend",
        }
    }
}

impl std::fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A normalized backend failure: a machine-readable code plus a human
/// message.
#[derive(Error, Debug, Clone)]
#[error("{message} ({code})")]
pub struct ProviderError {
    pub code: ProviderErrorCode,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Options for a single invocation
#[derive(Debug, Clone)]
pub struct InvokeOptions {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    /// Per-call budget from the model's capability profile; adapters
    /// should also enforce it at the transport level.
    pub timeout: Option<Duration>,
}

impl InvokeOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_output_tokens: None,
            timeout: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Token accounting reported by the backend, when available
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// A completed invocation
#[derive(Debug, Clone)]
pub struct InvokeResponse {
    pub content: String,
    pub stop_reason: String,
    pub usage: TokenUsage,
}

impl InvokeResponse {
    pub fn new(content: impl Into<String>, stop_reason: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            stop_reason: stop_reason.into(),
            usage: TokenUsage::default(),
        }
    }
}

/// Per-model invocation profile
///
/// Deep-reasoning models get documented longer budgets from their
/// adapters; everything else uses the configured default.
#[derive(Debug, Clone, Copy)]
pub struct ModelCapabilities {
    pub timeout: Duration,
}

/// A model backend reachable through the unified invocation contract
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether this backend currently has usable credentials
    fn is_available(&self) -> bool;

    /// Invocation profile for a specific model
    fn capabilities(&self, model: &str) -> ModelCapabilities;

    /// Send the conversation and return the model's reply
    async fn invoke(
        &self,
        conversation: &[Message],
        options: &InvokeOptions,
    ) -> Result<InvokeResponse, ProviderError>;
}

/// Why a model spec could not be mapped to a usable backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("No known backend serves model '{0}'")]
    UnknownModel(String),

    #[error("Backend {kind} for model '{model}' is not available")]
    Unavailable { model: String, kind: ProviderKind },

    #[error("No backend is currently available")]
    NoneAvailable,
}

/// Maps model names onto backends using the static name rules plus
/// availability. Resolution failures are per-model data for the
/// orchestrator, never request-level faults.
pub trait ProviderRegistry: Send + Sync {
    fn resolve(&self, model: &str) -> Result<Arc<dyn ProviderGateway>, ResolutionError>;
}
