//! Static provider registry
//!
//! Applies the model-name inference rules from the domain layer on top of
//! the configured backends, layering availability (credential presence)
//! over name resolution. `auto` resolves to the first backend currently
//! reporting itself available.

use super::openai_compatible::OpenAiCompatibleProvider;
use conclave_application::ports::provider_gateway::{
    ProviderGateway, ProviderRegistry, ResolutionError,
};
use conclave_domain::{AUTO_MODEL, ProviderKind};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Credentials for the known backends, conventionally sourced from the
/// environment
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub xai_api_key: Option<String>,
    pub custom_api_url: Option<String>,
    pub custom_api_key: Option<String>,
}

impl ProviderCredentials {
    /// Read credentials from the conventional environment variables
    pub fn from_env() -> Self {
        fn non_empty(name: &str) -> Option<String> {
            env::var(name).ok().filter(|v| !v.trim().is_empty())
        }
        Self {
            openai_api_key: non_empty("OPENAI_API_KEY"),
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            xai_api_key: non_empty("XAI_API_KEY"),
            custom_api_url: non_empty("CUSTOM_API_URL"),
            custom_api_key: non_empty("CUSTOM_API_KEY"),
        }
    }
}

/// Registry over a fixed set of backends, resolved by the static name
/// rules plus availability
pub struct StaticProviderRegistry {
    providers: Vec<Arc<dyn ProviderGateway>>,
}

impl StaticProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn ProviderGateway>>) -> Self {
        Self { providers }
    }

    /// Build the standard backend set. Every known backend is registered
    /// so that resolution can distinguish "unavailable" from "unknown";
    /// the custom backend joins only when a base URL is configured.
    pub fn from_credentials(credentials: ProviderCredentials, default_timeout: Duration) -> Self {
        let mut providers: Vec<Arc<dyn ProviderGateway>> = vec![
            Arc::new(OpenAiCompatibleProvider::openai(
                credentials.openai_api_key,
                default_timeout,
            )),
            Arc::new(OpenAiCompatibleProvider::google(
                credentials.gemini_api_key,
                default_timeout,
            )),
            Arc::new(OpenAiCompatibleProvider::xai(
                credentials.xai_api_key,
                default_timeout,
            )),
        ];
        if let Some(base_url) = credentials.custom_api_url {
            // Custom endpoints (e.g. Ollama) may legitimately need no key
            let api_key = Some(credentials.custom_api_key.unwrap_or_default());
            providers.push(Arc::new(OpenAiCompatibleProvider::custom(
                base_url,
                api_key,
                default_timeout,
            )));
        }

        let available: Vec<&str> = providers
            .iter()
            .filter(|p| p.is_available())
            .map(|p| p.kind().as_str())
            .collect();
        info!("Configured backends, available: [{}]", available.join(", "));

        Self::new(providers)
    }

    fn find(&self, kind: ProviderKind) -> Option<&Arc<dyn ProviderGateway>> {
        self.providers.iter().find(|p| p.kind() == kind)
    }
}

impl ProviderRegistry for StaticProviderRegistry {
    fn resolve(&self, model: &str) -> Result<Arc<dyn ProviderGateway>, ResolutionError> {
        if model == AUTO_MODEL {
            return self
                .providers
                .iter()
                .find(|p| p.is_available())
                .cloned()
                .ok_or(ResolutionError::NoneAvailable);
        }

        let Some(kind) = ProviderKind::infer(model) else {
            debug!("No resolution rule matches model '{}'", model);
            return Err(ResolutionError::UnknownModel(model.to_string()));
        };

        match self.find(kind) {
            Some(provider) if provider.is_available() => Ok(Arc::clone(provider)),
            _ => Err(ResolutionError::Unavailable {
                model: model.to_string(),
                kind,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conclave_application::ports::provider_gateway::{
        InvokeOptions, InvokeResponse, ModelCapabilities, ProviderError,
    };
    use conclave_domain::Message;

    // -- Mock gateway ----------------------------------------------------------

    struct MockProvider {
        kind: ProviderKind,
        available: bool,
    }

    impl MockProvider {
        fn new(kind: ProviderKind, available: bool) -> Arc<dyn ProviderGateway> {
            Arc::new(Self { kind, available })
        }
    }

    #[async_trait]
    impl ProviderGateway for MockProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn capabilities(&self, _model: &str) -> ModelCapabilities {
            ModelCapabilities {
                timeout: Duration::from_secs(1),
            }
        }

        async fn invoke(
            &self,
            _conversation: &[Message],
            _options: &InvokeOptions,
        ) -> Result<InvokeResponse, ProviderError> {
            Ok(InvokeResponse::new("ok", "stop"))
        }
    }

    // -- Resolution rule tests -------------------------------------------------

    #[test]
    fn test_name_rules_route_to_the_right_backend() {
        let registry = StaticProviderRegistry::new(vec![
            MockProvider::new(ProviderKind::OpenAi, true),
            MockProvider::new(ProviderKind::Google, true),
            MockProvider::new(ProviderKind::Xai, true),
        ]);

        assert_eq!(registry.resolve("gpt-4o").unwrap().kind(), ProviderKind::OpenAi);
        assert_eq!(registry.resolve("o3-mini").unwrap().kind(), ProviderKind::OpenAi);
        assert_eq!(
            registry.resolve("gemini-2.5-flash").unwrap().kind(),
            ProviderKind::Google
        );
        assert_eq!(registry.resolve("grok-3").unwrap().kind(), ProviderKind::Xai);
    }

    #[test]
    fn test_unknown_model_name_is_distinguished_from_unavailable() {
        let registry = StaticProviderRegistry::new(vec![
            MockProvider::new(ProviderKind::OpenAi, true),
            MockProvider::new(ProviderKind::Xai, false),
        ]);

        assert!(matches!(
            registry.resolve("claude-sonnet"),
            Err(ResolutionError::UnknownModel(_))
        ));
        assert!(matches!(
            registry.resolve("grok-3"),
            Err(ResolutionError::Unavailable {
                kind: ProviderKind::Xai,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_backend_for_inferred_kind_is_unavailable() {
        let registry = StaticProviderRegistry::new(vec![MockProvider::new(ProviderKind::OpenAi, true)]);

        assert!(matches!(
            registry.resolve("gemini-pro"),
            Err(ResolutionError::Unavailable {
                kind: ProviderKind::Google,
                ..
            })
        ));
    }

    #[test]
    fn test_auto_resolves_to_first_available_backend() {
        let registry = StaticProviderRegistry::new(vec![
            MockProvider::new(ProviderKind::OpenAi, false),
            MockProvider::new(ProviderKind::Google, true),
            MockProvider::new(ProviderKind::Xai, true),
        ]);

        assert_eq!(registry.resolve(AUTO_MODEL).unwrap().kind(), ProviderKind::Google);
    }

    #[test]
    fn test_auto_with_no_available_backend_fails() {
        let registry = StaticProviderRegistry::new(vec![
            MockProvider::new(ProviderKind::OpenAi, false),
        ]);

        assert!(matches!(
            registry.resolve(AUTO_MODEL),
            Err(ResolutionError::NoneAvailable)
        ));
    }

    // -- from_credentials tests ------------------------------------------------

    #[test]
    fn test_standard_backends_are_always_registered() {
        let registry = StaticProviderRegistry::from_credentials(
            ProviderCredentials {
                openai_api_key: Some("key".into()),
                ..Default::default()
            },
            Duration::from_secs(180),
        );

        // OpenAI resolves; Google is registered but unavailable
        assert!(registry.resolve("gpt-4o").is_ok());
        assert!(matches!(
            registry.resolve("gemini-flash"),
            Err(ResolutionError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_custom_backend_requires_base_url() {
        let without_url =
            StaticProviderRegistry::from_credentials(ProviderCredentials::default(), Duration::from_secs(5));
        assert!(without_url.find(ProviderKind::Custom).is_none());

        let with_url = StaticProviderRegistry::from_credentials(
            ProviderCredentials {
                custom_api_url: Some("http://localhost:11434/v1".into()),
                ..Default::default()
            },
            Duration::from_secs(5),
        );
        // Keyless custom endpoints are still considered available
        assert!(with_url.find(ProviderKind::Custom).is_some_and(|p| p.is_available()));
    }
}
