//! Application layer for conclave
//!
//! This crate contains use cases, port definitions, and application
//! configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::ConsensusParams;
pub use ports::{
    context_loader::{ContextBundle, ContextFailure, ContextLoader, NoContext},
    continuation_store::{ContinuationStore, StoreError, StoreStats},
    provider_gateway::{
        InvokeOptions, InvokeResponse, ModelCapabilities, ProviderError, ProviderErrorCode,
        ProviderGateway, ProviderRegistry, ResolutionError, TokenUsage,
    },
};
pub use use_cases::run_chat::{ChatError, ChatRequest, ChatResult, RunChatUseCase};
pub use use_cases::run_consensus::{ConsensusError, RunConsensusUseCase};
