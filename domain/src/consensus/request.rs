//! Consensus request types

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// One model to consult, with optional per-model overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub model: String,
    /// Overrides the request-level sampling temperature for this model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ModelSpec {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Input for a consensus run
///
/// Model order is preserved into the result buckets. A model appearing
/// twice is consulted twice; there is no de-duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusRequest {
    /// The problem or proposal to gather consensus on
    pub prompt: String,
    /// Models to consult, in output order
    pub models: Vec<ModelSpec>,
    /// Whether models see each other's answers in a refinement phase
    #[serde(default = "default_true")]
    pub enable_cross_feedback: bool,
    /// Custom refinement prompt, used verbatim when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_feedback_prompt: Option<String>,
    /// Shared sampling temperature (per-model overrides win)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Conversation to continue; unknown ids start a fresh one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_id: Option<String>,
    /// File paths to embed as context before the prompt
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl ConsensusRequest {
    pub fn new(prompt: impl Into<String>, models: Vec<ModelSpec>) -> Self {
        Self {
            prompt: prompt.into(),
            models,
            enable_cross_feedback: true,
            cross_feedback_prompt: None,
            temperature: None,
            continuation_id: None,
            files: Vec::new(),
        }
    }

    pub fn without_cross_feedback(mut self) -> Self {
        self.enable_cross_feedback = false;
        self
    }

    pub fn with_cross_feedback_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.cross_feedback_prompt = Some(prompt.into());
        self
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

    /// Fail-fast validation, checked before any backend I/O
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.prompt.trim().is_empty() {
            return Err(DomainError::EmptyPrompt);
        }
        if self.models.is_empty() {
            return Err(DomainError::NoModels);
        }
        Ok(())
    }
}
