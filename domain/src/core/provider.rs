//! Provider kind value object and model-name resolution rules
//!
//! Model specs name models, not backends. The mapping from a model name to
//! the backend that serves it is a small static lookup so it stays
//! testable; the registry applies it and layers availability on top.

use serde::{Deserialize, Serialize};

/// The sentinel model name that resolves to the first available backend.
pub const AUTO_MODEL: &str = "auto";

/// Known provider backends (Value Object)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Google,
    Xai,
    Custom,
}

impl ProviderKind {
    /// Get the string identifier for this provider
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Google => "google",
            ProviderKind::Xai => "xai",
            ProviderKind::Custom => "custom",
        }
    }

    /// Infer the backend for a model name.
    ///
    /// Rules, in priority order:
    /// 1. contains `grok` -> X.AI
    /// 2. contains `gpt`, or starts with `o3`/`o4` -> OpenAI
    /// 3. contains `gemini`, `flash` or `pro` -> Google
    ///
    /// Returns `None` for names no rule covers (including [`AUTO_MODEL`],
    /// which is resolved by availability, not by name).
    pub fn infer(model: &str) -> Option<ProviderKind> {
        let name = model.to_ascii_lowercase();
        if name.contains("grok") {
            Some(ProviderKind::Xai)
        } else if name.contains("gpt") || name.starts_with("o3") || name.starts_with("o4") {
            Some(ProviderKind::OpenAi)
        } else if name.contains("gemini") || name.contains("flash") || name.contains("pro") {
            Some(ProviderKind::Google)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
