//! OpenAI-compatible provider adapter
//!
//! OpenAI, X.AI and Google all expose the same chat-completions surface,
//! so one adapter parameterized by base URL and credential covers every
//! backend this server talks to. Vendor error shapes are normalized into
//! [`ProviderErrorCode`] at this boundary; callers never see them.

use async_trait::async_trait;
use conclave_application::ports::provider_gateway::{
    InvokeOptions, InvokeResponse, ModelCapabilities, ProviderError, ProviderErrorCode,
    ProviderGateway, TokenUsage,
};
use conclave_domain::{Message, ProviderKind, Role};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const XAI_BASE_URL: &str = "https://api.x.ai/v1";
const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Budget for deep-reasoning models (o3/o4 family), which routinely run
/// far past the standard per-call default.
const DEEP_REASONING_TIMEOUT: Duration = Duration::from_secs(600);

/// Adapter for any backend speaking the OpenAI chat-completions protocol
pub struct OpenAiCompatibleProvider {
    kind: ProviderKind,
    base_url: String,
    api_key: Option<String>,
    default_timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        kind: ProviderKind,
        base_url: impl Into<String>,
        api_key: Option<String>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            kind,
            base_url: base_url.into(),
            api_key,
            default_timeout,
            client: reqwest::Client::new(),
        }
    }

    pub fn openai(api_key: Option<String>, default_timeout: Duration) -> Self {
        Self::new(ProviderKind::OpenAi, OPENAI_BASE_URL, api_key, default_timeout)
    }

    pub fn xai(api_key: Option<String>, default_timeout: Duration) -> Self {
        Self::new(ProviderKind::Xai, XAI_BASE_URL, api_key, default_timeout)
    }

    pub fn google(api_key: Option<String>, default_timeout: Duration) -> Self {
        Self::new(ProviderKind::Google, GOOGLE_BASE_URL, api_key, default_timeout)
    }

    pub fn custom(
        base_url: impl Into<String>,
        api_key: Option<String>,
        default_timeout: Duration,
    ) -> Self {
        Self::new(ProviderKind::Custom, base_url, api_key, default_timeout)
    }
}

/// Map transport-level status codes onto the normalized error taxonomy
fn error_code_for_status(status: StatusCode) -> ProviderErrorCode {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderErrorCode::InvalidCredential,
        StatusCode::NOT_FOUND => ProviderErrorCode::ModelNotFound,
        StatusCode::PAYLOAD_TOO_LARGE => ProviderErrorCode::ContextTooLarge,
        StatusCode::TOO_MANY_REQUESTS => ProviderErrorCode::RateLimited,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderErrorCode::Timeout,
        _ => ProviderErrorCode::Backend,
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl<'a> ChatCompletionRequest<'a> {
    fn build(conversation: &'a [Message], options: &'a InvokeOptions) -> Self {
        Self {
            model: &options.model,
            messages: conversation
                .iter()
                .map(|m| WireMessage {
                    role: role_name(m.role),
                    content: &m.content,
                })
                .collect(),
            temperature: options.temperature,
            max_tokens: options.max_output_tokens,
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Pull the vendor's human-readable message out of an error body, falling
/// back to the raw text.
fn error_message_from_body(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body)
        && let Some(message) = parsed.error.and_then(|e| e.message)
    {
        return message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "backend returned an error with no body".to_string()
    } else {
        trimmed.chars().take(500).collect()
    }
}

#[async_trait]
impl ProviderGateway for OpenAiCompatibleProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn capabilities(&self, model: &str) -> ModelCapabilities {
        let name = model.to_ascii_lowercase();
        let timeout = if name.starts_with("o3") || name.starts_with("o4") {
            self.default_timeout.max(DEEP_REASONING_TIMEOUT)
        } else {
            self.default_timeout
        };
        ModelCapabilities { timeout }
    }

    async fn invoke(
        &self,
        conversation: &[Message],
        options: &InvokeOptions,
    ) -> Result<InvokeResponse, ProviderError> {
        let Some(api_key) = &self.api_key else {
            return Err(ProviderError::new(
                ProviderErrorCode::InvalidCredential,
                format!("{} backend has no credential configured", self.kind),
            ));
        };

        let body = ChatCompletionRequest::build(conversation, options);
        debug!(
            "POST {}/chat/completions model={} messages={}",
            self.base_url,
            options.model,
            conversation.len()
        );

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body);
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|error| {
            if error.is_timeout() {
                ProviderError::new(
                    ProviderErrorCode::Timeout,
                    format!("request to {} timed out", self.kind),
                )
            } else {
                ProviderError::new(
                    ProviderErrorCode::Network,
                    format!("request to {} failed: {}", self.kind, error),
                )
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message_from_body(&body);
            warn!("{} returned {}: {}", self.kind, status, message);
            return Err(ProviderError::new(error_code_for_status(status), message));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|error| {
            ProviderError::new(
                ProviderErrorCode::Backend,
                format!("{} returned an unparseable response: {}", self.kind, error),
            )
        })?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            ProviderError::new(
                ProviderErrorCode::Backend,
                format!("{} returned no choices", self.kind),
            )
        })?;

        Ok(InvokeResponse {
            content: choice.message.content.unwrap_or_default(),
            stop_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage: parsed
                .usage
                .map(|u| TokenUsage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                })
                .unwrap_or_default(),
        })
    }
}
