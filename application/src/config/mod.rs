//! Consensus parameters — fan-out tuning.
//!
//! [`ConsensusParams`] groups the static parameters that control timeout
//! layering and sampling in
//! [`RunConsensusUseCase`](crate::use_cases::run_consensus::RunConsensusUseCase).
//! These are application-layer concerns, not domain policy; the per-call
//! budget itself comes from each backend's capability profile.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fan-out control parameters.
///
/// The phase buffer is added on top of the largest per-call budget in a
/// phase to absorb coordination overhead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusParams {
    /// Coordination buffer added to the largest per-call budget.
    pub phase_buffer: Duration,
    /// Default sampling temperature when neither the request nor the
    /// model spec overrides it.
    pub temperature: f32,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            phase_buffer: Duration::from_secs(60),
            temperature: 0.2,
        }
    }
}

impl ConsensusParams {
    pub fn with_phase_buffer(mut self, buffer: Duration) -> Self {
        self.phase_buffer = buffer;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}
