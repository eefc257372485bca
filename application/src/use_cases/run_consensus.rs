//! Run Consensus use case
//!
//! Orchestrates the two-phase consensus fan-out: every resolved model
//! answers the question concurrently, then (optionally) each phase-1
//! success refines its answer after seeing the other models' responses.
//!
//! The central contract: the run's own success is decoupled from any
//! individual backend's success. Resolution failures, invocation errors
//! and timeouts all surface as per-model outcome data; only request
//! validation and caller cancellation fail the whole operation.

use crate::config::ConsensusParams;
use crate::ports::context_loader::{ContextLoader, NoContext};
use crate::ports::continuation_store::ContinuationStore;
use crate::ports::provider_gateway::{
    InvokeOptions, ProviderGateway, ProviderRegistry, ResolutionError,
};
use conclave_domain::{
    ConsensusPrompt, ConsensusRequest, ConsensusResult, ConversationState, DomainError, Message,
    ModelOutcome, OutcomeMetadata, RefinedOutcome,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that fail a whole consensus run
#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("Invalid request: {0}")]
    Validation(DomainError),

    #[error("Consensus run cancelled")]
    Cancelled,
}

/// One request entry that resolved to a usable backend
struct ResolvedModel {
    /// Position in the request's model list
    index: usize,
    model: String,
    temperature: f32,
    timeout: Duration,
    gateway: Arc<dyn ProviderGateway>,
}

/// Use case for running a consensus fan-out
pub struct RunConsensusUseCase {
    registry: Arc<dyn ProviderRegistry>,
    store: Arc<dyn ContinuationStore>,
    context: Arc<dyn ContextLoader>,
    params: ConsensusParams,
}

impl RunConsensusUseCase {
    pub fn new(registry: Arc<dyn ProviderRegistry>, store: Arc<dyn ContinuationStore>) -> Self {
        Self {
            registry,
            store,
            context: Arc::new(NoContext),
            params: ConsensusParams::default(),
        }
    }

    pub fn with_context_loader(mut self, context: Arc<dyn ContextLoader>) -> Self {
        self.context = context;
        self
    }

    pub fn with_params(mut self, params: ConsensusParams) -> Self {
        self.params = params;
        self
    }

    /// Execute the run without external cancellation
    pub async fn execute(&self, request: ConsensusRequest) -> Result<ConsensusResult, ConsensusError> {
        self.execute_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Execute the run; cancelling the token aborts all in-flight
    /// invocations of the current phase and discards partial results.
    pub async fn execute_with_cancellation(
        &self,
        request: ConsensusRequest,
        cancel: CancellationToken,
    ) -> Result<ConsensusResult, ConsensusError> {
        request.validate().map_err(ConsensusError::Validation)?;

        let total = request.models.len();
        info!("Starting consensus for {} models", total);

        // Resolution: record failures immediately, keep the rest
        let mut slots: Vec<Option<ModelOutcome>> = (0..total).map(|_| None).collect();
        let mut resolved = Vec::new();
        for (index, spec) in request.models.iter().enumerate() {
            match self.registry.resolve(&spec.model) {
                Ok(gateway) => {
                    let timeout = gateway.capabilities(&spec.model).timeout;
                    let temperature = spec
                        .temperature
                        .or(request.temperature)
                        .unwrap_or(self.params.temperature);
                    resolved.push(ResolvedModel {
                        index,
                        model: spec.model.clone(),
                        temperature,
                        timeout,
                        gateway,
                    });
                }
                Err(error) => {
                    debug!("Model {} excluded: {}", spec.model, error);
                    let provider = match &error {
                        ResolutionError::Unavailable { kind, .. } => Some(kind.to_string()),
                        _ => None,
                    };
                    slots[index] = Some(ModelOutcome::failure(&spec.model, provider, error.to_string()));
                }
            }
        }

        // Conversation assembly
        let (conversation_id, mut state) = self.load_or_create(request.continuation_id.as_deref()).await;
        let bundle = self.context.load(&request.files).await;
        for failure in &bundle.failures {
            warn!("Context input {} skipped: {}", failure.path, failure.reason);
        }

        let mut conversation = vec![Message::system(ConsensusPrompt::system())];
        conversation.extend(state.messages.iter().cloned());
        conversation.extend(bundle.messages);
        conversation.push(Message::user(&request.prompt));

        // Phase 1: independent answers
        if !resolved.is_empty() {
            if cancel.is_cancelled() {
                return Err(ConsensusError::Cancelled);
            }
            self.phase_initial(&resolved, &conversation, &mut slots, &cancel)
                .await?;
        }

        // Partition into request-ordered buckets
        let mut initial = Vec::new();
        let mut failed = Vec::new();
        for outcome in slots.into_iter().flatten() {
            if outcome.is_success() {
                initial.push(outcome);
            } else {
                failed.push(outcome);
            }
        }

        // Phase 2: cross-feedback, only with at least two peers
        let refined = if request.enable_cross_feedback && initial.len() > 1 {
            if cancel.is_cancelled() {
                return Err(ConsensusError::Cancelled);
            }
            Some(self.phase_refine(&resolved, &initial, &request, &cancel).await?)
        } else {
            debug!(
                "Skipping cross-feedback phase ({} successes, enabled: {})",
                initial.len(),
                request.enable_cross_feedback
            );
            None
        };

        let result = ConsensusResult::new(&conversation_id, &request.prompt, initial, refined, failed);
        info!(
            "Consensus complete: {} of {} models responded, {} refined",
            result.successful_initial(),
            result.models_consulted(),
            result.refined_count()
        );

        // Persistence: exactly once, after all phase computation. A store
        // failure must not turn a computed consensus into an error.
        state.push(Message::user(&request.prompt));
        state.push(Message::assistant(ConsensusPrompt::storage_summary(&result)));
        state.set_meta("tool", serde_json::json!("consensus"));
        state.set_meta("provider", serde_json::json!("multi-model-consensus"));
        state.set_meta("models", serde_json::json!(result.responding_models()));
        if let Err(error) = self.store.set(&conversation_id, state).await {
            warn!("Failed to persist consensus turn: {}", error);
        }

        Ok(result)
    }

    /// Load the prior conversation, or mint a fresh one when the id is
    /// missing, malformed, or unknown. Never a fatal error.
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

    /// Phase timeout: the largest per-call budget plus the coordination
    /// buffer. Bounds the worst case only — a phase whose tasks all settle
    /// early completes early.
    fn phase_timeout(&self, budgets: impl Iterator<Item = Duration>) -> Duration {
        budgets.max().unwrap_or_default() + self.params.phase_buffer
    }

    /// Phase 1: invoke every resolved model concurrently, each within its
    /// own per-call budget, and index results back into request order.
    async fn phase_initial(
        &self,
        resolved: &[ResolvedModel],
        conversation: &[Message],
        slots: &mut [Option<ModelOutcome>],
        cancel: &CancellationToken,
    ) -> Result<(), ConsensusError> {
        let phase_timeout = self.phase_timeout(resolved.iter().map(|r| r.timeout));
        info!("Phase 1: consulting {} models (budget {:?})", resolved.len(), phase_timeout);

        let mut join_set = JoinSet::new();
        for entry in resolved {
            let gateway = Arc::clone(&entry.gateway);
            let conversation = conversation.to_vec();
            let options = InvokeOptions::new(&entry.model)
                .with_temperature(entry.temperature)
                .with_timeout(entry.timeout);
            let model = entry.model.clone();
            let index = entry.index;
            let budget = entry.timeout;

            join_set.spawn(async move {
                let outcome = consult(gateway, &conversation, options, &model, budget).await;
                (index, outcome)
            });
        }

        let deadline = tokio::time::Instant::now() + phase_timeout;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    join_set.abort_all();
                    warn!("Phase 1 cancelled with {} invocations in flight", join_set.len());
                    return Err(ConsensusError::Cancelled);
                }
                joined = join_set.join_next() => {
                    match joined {
                        None => break,
                        Some(Ok((index, outcome))) => slots[index] = Some(outcome),
                        Some(Err(error)) => warn!("Invocation task failed to join: {}", error),
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    warn!("Phase 1 deadline reached with {} invocations outstanding", join_set.len());
                    join_set.abort_all();
                    break;
                }
            }
        }

        // Anything still unfilled was abandoned at the deadline
        for entry in resolved {
            if slots[entry.index].is_none() {
                slots[entry.index] = Some(ModelOutcome::failure(
                    &entry.model,
                    Some(entry.gateway.kind().to_string()),
                    format!("Phase timeout exceeded ({}s)", phase_timeout.as_secs()),
                ));
            }
        }
        Ok(())
    }

    /// Phase 2: each phase-1 success refines its answer after seeing every
    /// other success. A refinement failure keeps the phase-1 response.
    async fn phase_refine(
        &self,
        resolved: &[ResolvedModel],
        initial: &[ModelOutcome],
        request: &ConsensusRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<RefinedOutcome>, ConsensusError> {
        info!("Phase 2: cross-feedback for {} models", initial.len());

        // Successes keep request order, so matching resolved entries by
        // name in order handles duplicate model names correctly.
        let mut remaining: Vec<&ResolvedModel> = resolved.iter().collect();
        let mut participants = Vec::new();
        for outcome in initial {
            let position = remaining
                .iter()
                .position(|r| r.model == outcome.model)
                .expect("phase-1 success without resolved entry");
            participants.push((remaining.remove(position), outcome));
        }

        let mut join_set = JoinSet::new();
        for (slot, (entry, outcome)) in participants.iter().enumerate() {
            let own_response = outcome.response.clone().unwrap_or_default();
            let others: Vec<(String, String)> = participants
                .iter()
                .enumerate()
                .filter(|(other_slot, _)| *other_slot != slot)
                .map(|(_, (_, other))| {
                    (other.model.clone(), other.response.clone().unwrap_or_default())
                })
                .collect();

            let prompt = match &request.cross_feedback_prompt {
                Some(custom) => custom.clone(),
                None => ConsensusPrompt::cross_feedback(&request.prompt, &own_response, &others),
            };
            let conversation = vec![Message::system(ConsensusPrompt::system()), Message::user(prompt)];

            let gateway = Arc::clone(&entry.gateway);
            let options = InvokeOptions::new(&entry.model)
                .with_temperature(entry.temperature)
                .with_timeout(entry.timeout);
            let model = entry.model.clone();
            let budget = entry.timeout;

            join_set.spawn(async move {
                let outcome = refine(gateway, &conversation, options, &model, own_response, budget).await;
                (slot, outcome)
            });
        }

        let phase_timeout = self.phase_timeout(participants.iter().map(|(entry, _)| entry.timeout));
        let mut slots: Vec<Option<RefinedOutcome>> = (0..participants.len()).map(|_| None).collect();
        let deadline = tokio::time::Instant::now() + phase_timeout;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    join_set.abort_all();
                    warn!("Phase 2 cancelled with {} refinements in flight", join_set.len());
                    return Err(ConsensusError::Cancelled);
                }
                joined = join_set.join_next() => {
                    match joined {
                        None => break,
                        Some(Ok((slot, outcome))) => slots[slot] = Some(outcome),
                        Some(Err(error)) => warn!("Refinement task failed to join: {}", error),
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    warn!("Phase 2 deadline reached with {} refinements outstanding", join_set.len());
                    join_set.abort_all();
                    break;
                }
            }
        }

        let refined = participants
            .iter()
            .zip(slots)
            .map(|((entry, outcome), refined)| {
                refined.unwrap_or_else(|| {
                    RefinedOutcome::partial(
                        &entry.model,
                        Some(entry.gateway.kind().to_string()),
                        outcome.response.clone().unwrap_or_default(),
                        format!("Phase timeout exceeded ({}s)", phase_timeout.as_secs()),
                    )
                })
            })
            .collect();
        Ok(refined)
    }
}

/// One phase-1 invocation. Every failure mode lands in the outcome; a
/// timeout here is a hard, non-retryable failure.
async fn consult(
    gateway: Arc<dyn ProviderGateway>,
    conversation: &[Message],
    options: InvokeOptions,
    model: &str,
    budget: Duration,
) -> ModelOutcome {
    let provider = gateway.kind();
    let started = Instant::now();
    match tokio::time::timeout(budget, gateway.invoke(conversation, &options)).await {
        Ok(Ok(response)) => {
            debug!("Model {} responded in {:?}", model, started.elapsed());
            ModelOutcome::success(
                model,
                provider.as_str(),
                response.content,
                OutcomeMetadata {
                    response_time_ms: Some(started.elapsed().as_millis() as u64),
                    input_tokens: response.usage.input_tokens,
                    output_tokens: response.usage.output_tokens,
                },
            )
        }
        Ok(Err(error)) => {
            warn!("Model {} failed: {}", model, error);
            ModelOutcome::failure(model, Some(provider.to_string()), error.to_string())
        }
        Err(_) => {
            warn!("Model {} timed out after {:?}", model, budget);
            ModelOutcome::failure(
                model,
                Some(provider.to_string()),
                format!("Invocation timed out after {}s", budget.as_secs()),
            )
        }
    }
}

/// One phase-2 invocation. Failure keeps the phase-1 response.
async fn refine(
    gateway: Arc<dyn ProviderGateway>,
    conversation: &[Message],
    options: InvokeOptions,
    model: &str,
    initial_response: String,
    budget: Duration,
) -> RefinedOutcome {
    let provider = gateway.kind();
    let started = Instant::now();
    match tokio::time::timeout(budget, gateway.invoke(conversation, &options)).await {
        Ok(Ok(response)) => RefinedOutcome::refined(
            model,
            Some(provider.to_string()),
            initial_response,
            response.content,
            OutcomeMetadata {
                response_time_ms: Some(started.elapsed().as_millis() as u64),
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
        ),
        Ok(Err(error)) => {
            warn!("Model {} refinement failed: {}", model, error);
            RefinedOutcome::partial(model, Some(provider.to_string()), initial_response, error.to_string())
        }
        Err(_) => {
            warn!("Model {} refinement timed out after {:?}", model, budget);
            RefinedOutcome::partial(
                model,
                Some(provider.to_string()),
                initial_response,
                format!("Refinement timed out after {}s", budget.as_secs()),
            )
        }
    }
}
