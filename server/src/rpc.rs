//! Request/response wire types and dispatch
//!
//! The transport is line-delimited JSON over stdio: one request object per
//! line in, one response object per line out. Errors carry a machine
//! readable code and a human message, mirroring the provider error
//! surface.

use crate::schema;
use conclave_application::{
    ChatError, ChatRequest, ConsensusError, RunChatUseCase, RunConsensusUseCase,
};
use conclave_domain::{ConsensusRequest, ConsensusResult};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct Request {
    /// Echoed back verbatim in the response
    #[serde(default)]
    pub id: Value,
    pub op: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl Response {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn fail(id: Value, code: &str, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(ErrorBody {
                code: code.to_string(),
                message: message.into(),
            }),
        }
    }
}

/// Parameters for the `chat` operation
#[derive(Debug, Deserialize)]
struct ChatParams {
    prompt: String,
    #[serde(default = "default_model")]
    model: String,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default)]
    continuation_id: Option<String>,
    #[serde(default)]
    files: Vec<String>,
}

fn default_model() -> String {
    conclave_domain::AUTO_MODEL.to_string()
}

/// Routes parsed requests to the use cases
pub struct Dispatcher {
    chat: RunChatUseCase,
    consensus: RunConsensusUseCase,
}

impl Dispatcher {
    pub fn new(chat: RunChatUseCase, consensus: RunConsensusUseCase) -> Self {
        Self { chat, consensus }
    }

    pub async fn dispatch(&self, request: Request) -> Response {
        debug!("Dispatching op '{}'", request.op);
        let Request { id, op, params } = request;
        match op.as_str() {
            "chat" => self.handle_chat(id, params).await,
            "consensus" => self.handle_consensus(id, params).await,
            "list_operations" => match serde_json::to_value(schema::operations()) {
                Ok(ops) => Response::ok(id, json!({ "operations": ops })),
                Err(error) => Response::fail(id, "internal", error.to_string()),
            },
            other => Response::fail(id, "unknown-operation", format!("unknown operation '{}'", other)),
        }
    }

    async fn handle_chat(&self, id: Value, params: Value) -> Response {
        let params: ChatParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(error) => return Response::fail(id, "invalid-params", error.to_string()),
        };

        let mut request = ChatRequest::new(params.prompt, params.model).with_files(params.files);
        if let Some(temperature) = params.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(continuation_id) = params.continuation_id {
            request = request.with_continuation(continuation_id);
        }

        match self.chat.execute(request).await {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(value) => Response::ok(id, value),
                Err(error) => Response::fail(id, "internal", error.to_string()),
            },
            Err(ChatError::Validation(error)) => Response::fail(id, "validation", error.to_string()),
            Err(ChatError::Resolution(error)) => Response::fail(id, "resolution", error.to_string()),
            Err(ChatError::Provider(error)) => {
                Response::fail(id, error.code.as_str(), error.message)
            }
        }
    }

    async fn handle_consensus(&self, id: Value, params: Value) -> Response {
        let request: ConsensusRequest = match serde_json::from_value(params) {
            Ok(request) => request,
            Err(error) => return Response::fail(id, "invalid-params", error.to_string()),
        };

        match self.consensus.execute(request).await {
            Ok(result) => Response::ok(id, consensus_to_wire(&result)),
            Err(ConsensusError::Validation(error)) => {
                Response::fail(id, "validation", error.to_string())
            }
            Err(ConsensusError::Cancelled) => Response::fail(id, "cancelled", "consensus run cancelled"),
        }
    }
}

/// Wire shape for a consensus result: the buckets plus the derived counts
/// callers use to distinguish full, partial and failed runs without
/// parsing prose.
fn consensus_to_wire(result: &ConsensusResult) -> Value {
    let mut wire = json!({
        "status": "consensus_complete",
        "conversation_id": result.conversation_id,
        "prompt": result.prompt,
        "models_consulted": result.models_consulted(),
        "successful_initial": result.successful_initial(),
        "failed_count": result.failed_count(),
        "refined_count": result.refined_count(),
        "initial": result.initial,
        "failed": result.failed,
    });
    // Absent, not null, when the refinement phase did not run
    if let Some(refined) = &result.refined {
        wire["refined"] = json!(refined);
    }
    wire
}
