//! Configuration file schema
//!
//! Everything here has a sensible default so a bare environment works
//! with zero configuration; a `conclave.toml` or `CONCLAVE_*` environment
//! variables override per field. Provider credentials are deliberately
//! not part of this schema — they come from the conventional environment
//! variables (`OPENAI_API_KEY` and friends).

use conclave_application::ConsensusParams;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::store::memory::MemoryStoreConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub consensus: ConsensusSection,
    #[serde(default)]
    pub store: StoreSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusSection {
    /// Fallback per-invocation budget, in seconds
    pub model_timeout_secs: u64,
    /// Coordination buffer added to each phase's largest budget, in seconds
    pub phase_buffer_secs: u64,
    /// Default sampling temperature
    pub temperature: f32,
}

impl Default for ConsensusSection {
    fn default() -> Self {
        Self {
            model_timeout_secs: 180,
            phase_buffer_secs: 60,
            temperature: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    pub max_conversations: usize,
    pub max_messages: usize,
    pub ttl_hours: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            max_conversations: 1000,
            max_messages: 100,
            ttl_hours: 3,
        }
    }
}

impl FileConfig {
    /// Per-invocation fallback budget handed to provider adapters
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.consensus.model_timeout_secs)
    }

    pub fn consensus_params(&self) -> ConsensusParams {
        ConsensusParams::default()
            .with_phase_buffer(Duration::from_secs(self.consensus.phase_buffer_secs))
            .with_temperature(self.consensus.temperature)
    }

    pub fn store_config(&self) -> MemoryStoreConfig {
        MemoryStoreConfig::default()
            .with_max_conversations(self.store.max_conversations)
            .with_max_messages(self.store.max_messages)
            .with_ttl(Duration::from_secs(self.store.ttl_hours * 3600))
    }
}
