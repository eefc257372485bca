//! Consensus outcome value objects - immutable per-model, per-phase results.
//!
//! These types represent the outputs of each consensus phase:
//! - [`ModelOutcome`] - One model's result from the initial phase (or a
//!   resolution failure recorded before any phase ran)
//! - [`RefinedOutcome`] - One model's result from the cross-feedback phase
//! - [`ConsensusResult`] - The aggregate the caller receives
//!
//! All counts on [`ConsensusResult`] are derived from the buckets rather
//! than tracked separately, so they cannot drift.

use serde::{Deserialize, Serialize};

/// Terminal status of an initial-phase consultation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

/// Terminal status of a cross-feedback consultation
///
/// `Partial` means the refinement call failed; the initial-phase response
/// is retained and stands as the model's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefinedStatus {
    Refined,
    Partial,
}

/// Timing and token accounting for a single invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutcomeMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
}

/// Result of consulting one model in the initial phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOutcome {
    /// The model that was consulted
    pub model: String,
    /// Backend that served (or would have served) the model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub status: OutcomeStatus,
    /// The model's answer, present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Failure description, present on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: OutcomeMetadata,
}

impl ModelOutcome {
    pub fn success(
        model: impl Into<String>,
        provider: impl Into<String>,
        response: impl Into<String>,
        metadata: OutcomeMetadata,
    ) -> Self {
        Self {
            model: model.into(),
            provider: Some(provider.into()),
            status: OutcomeStatus::Success,
            response: Some(response.into()),
            error: None,
            metadata,
        }
    }

    pub fn failure(
        model: impl Into<String>,
        provider: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            provider,
            status: OutcomeStatus::Failed,
            response: None,
            error: Some(error.into()),
            metadata: OutcomeMetadata::default(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Result of one model's cross-feedback consultation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinedOutcome {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub status: RefinedStatus,
    /// The phase-1 answer this refinement started from
    pub initial_response: String,
    /// The refined answer; `None` when the refinement call failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refined_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: OutcomeMetadata,
}

impl RefinedOutcome {
    pub fn refined(
        model: impl Into<String>,
        provider: Option<String>,
        initial_response: impl Into<String>,
        refined_response: impl Into<String>,
        metadata: OutcomeMetadata,
    ) -> Self {
        Self {
            model: model.into(),
            provider,
            status: RefinedStatus::Refined,
            initial_response: initial_response.into(),
            refined_response: Some(refined_response.into()),
            error: None,
            metadata,
        }
    }

    /// Refinement failed; the initial response stands.
    pub fn partial(
        model: impl Into<String>,
        provider: Option<String>,
        initial_response: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            provider,
            status: RefinedStatus::Partial,
            initial_response: initial_response.into(),
            refined_response: None,
            error: Some(error.into()),
            metadata: OutcomeMetadata::default(),
        }
    }

    /// The answer that stands for this model: refined when available,
    /// otherwise the retained initial response.
    pub fn final_response(&self) -> &str {
        self.refined_response
            .as_deref()
            .unwrap_or(&self.initial_response)
    }
}

/// Complete result of a consensus run
///
/// Bucket order matches the order of models in the request, never
/// completion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// Conversation this run was persisted under
    pub conversation_id: String,
    /// The original question
    pub prompt: String,
    /// Phase 1 successes, in request order
    pub initial: Vec<ModelOutcome>,
    /// Cross-feedback results; absent when the phase did not run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refined: Option<Vec<RefinedOutcome>>,
    /// Resolution and phase-1 failures, in request order
    pub failed: Vec<ModelOutcome>,
}

impl ConsensusResult {
    pub fn new(
        conversation_id: impl Into<String>,
        prompt: impl Into<String>,
        initial: Vec<ModelOutcome>,
        refined: Option<Vec<RefinedOutcome>>,
        failed: Vec<ModelOutcome>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            prompt: prompt.into(),
            initial,
            refined,
            failed,
        }
    }

    /// Total number of models in the request
    pub fn models_consulted(&self) -> usize {
        self.initial.len() + self.failed.len()
    }

    pub fn successful_initial(&self) -> usize {
        self.initial.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn refined_count(&self) -> usize {
        self.refined.as_ref().map_or(0, |r| r.len())
    }

    /// Model names that produced an answer, in request order
    pub fn responding_models(&self) -> Vec<&str> {
        self.initial.iter().map(|o| o.model.as_str()).collect()
    }

    /// The answer that stands for an initial-phase success: the refined
    /// response when the model refined, otherwise its initial response.
    pub fn final_response_for(&self, model: &str) -> Option<&str> {
        if let Some(refined) = &self.refined
            && let Some(r) = refined.iter().find(|r| r.model == model)
        {
            return Some(r.final_response());
        }
        self.initial
            .iter()
            .find(|o| o.model == model)
            .and_then(|o| o.response.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(model: &str) -> ModelOutcome {
        ModelOutcome::success(model, "openai", format!("{} says yes", model), OutcomeMetadata::default())
    }

    #[test]
    fn test_counts_are_derived_from_buckets() {
        let result = ConsensusResult::new(
            "c1",
            "q",
            vec![success("a"), success("b")],
            None,
            vec![ModelOutcome::failure("c", None, "no backend")],
        );
        assert_eq!(result.models_consulted(), 3);
        assert_eq!(result.successful_initial(), 2);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.refined_count(), 0);
    }

    #[test]
    fn test_partial_refinement_keeps_initial_response() {
        let outcome = RefinedOutcome::partial("a", Some("openai".into()), "first answer", "timed out");
        assert_eq!(outcome.status, RefinedStatus::Partial);
        assert!(outcome.refined_response.is_none());
        assert_eq!(outcome.final_response(), "first answer");
    }

    #[test]
    fn test_final_response_prefers_refined() {
        let result = ConsensusResult::new(
            "c1",
            "q",
            vec![success("a")],
            Some(vec![RefinedOutcome::refined(
                "a",
                Some("openai".into()),
                "a says yes",
                "a refined",
                OutcomeMetadata::default(),
            )]),
            vec![],
        );
        assert_eq!(result.final_response_for("a"), Some("a refined"));
    }

    #[test]
    fn test_failed_outcome_serializes_without_response() {
        let outcome = ModelOutcome::failure("x", None, "unknown backend");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert!(json.get("response").is_none());
        assert_eq!(json["error"], "unknown backend");
    }
}
