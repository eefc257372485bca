//! Operation schema declarations
//!
//! The schemas the server advertises for its exposed operations. The
//! transport validates nothing itself — these are published so callers
//! can introspect the surface via `list_operations`.

use serde::Serialize;
use serde_json::{Value, json};

#[derive(Debug, Clone, Serialize)]
pub struct OperationSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// All operations this server exposes
pub fn operations() -> Vec<OperationSchema> {
    vec![
        OperationSchema {
            name: "chat",
            description: "General chat with a single model. Supports conversation \
                          continuation and file context.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "The question or request. Include context."
                    },
                    "model": {
                        "type": "string",
                        "default": "auto",
                        "description": "Model to use; 'auto' picks the first available backend."
                    },
                    "temperature": {
                        "type": "number",
                        "minimum": 0.0,
                        "maximum": 1.0,
                        "description": "Sampling temperature (0.0 to 1.0)."
                    },
                    "continuation_id": {
                        "type": "string",
                        "description": "Conversation id for multi-turn exchanges."
                    },
                    "files": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Optional files for additional context (absolute paths)."
                    }
                },
                "required": ["prompt"]
            }),
        },
        OperationSchema {
            name: "consensus",
            description: "Parallel multi-model consensus with cross-model feedback. \
                          Models answer independently, then optionally refine after \
                          seeing each other's responses. Handles partial failures \
                          gracefully.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "The problem or proposal to gather consensus on."
                    },
                    "models": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "model": {"type": "string"}
                            },
                            "required": ["model"]
                        },
                        "description": "Models to consult. Example: [{\"model\": \"o3\"}, {\"model\": \"flash\"}]"
                    },
                    "enable_cross_feedback": {
                        "type": "boolean",
                        "default": true,
                        "description": "Enable refinement phase where models see others' responses."
                    },
                    "cross_feedback_prompt": {
                        "type": "string",
                        "description": "Optional custom prompt for the refinement phase."
                    },
                    "temperature": {
                        "type": "number",
                        "minimum": 0.0,
                        "maximum": 1.0,
                        "default": 0.2,
                        "description": "Sampling temperature (0.0 to 1.0)."
                    },
                    "continuation_id": {
                        "type": "string",
                        "description": "Conversation id for multi-turn exchanges."
                    },
                    "files": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Optional files for additional context (absolute paths)."
                    }
                },
                "required": ["prompt", "models"]
            }),
        },
        OperationSchema {
            name: "list_operations",
            description: "List the operations this server exposes, with their input schemas.",
            input_schema: json!({"type": "object", "properties": {}}),
        },
    ]
}
