//! Domain error types

use thiserror::Error;

/// Domain-level errors
///
/// Only request validation and caller-initiated cancellation surface as
/// hard errors. Per-backend failures are captured as outcome data instead.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("At least one model is required")]
    NoModels,

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}
