//! Prompt templates for the chat and consensus flows

use crate::consensus::outcome::ConsensusResult;

/// Templates for the single-provider chat flow
pub struct ChatPrompt;

impl ChatPrompt {
    /// System prompt for chat exchanges
    pub fn system() -> &'static str {
        r#"You are a senior engineering collaborator.
Answer the user's question directly, using any conversation history and context files provided.
Be concrete and technically precise; say so when you are unsure."#
    }
}

/// Templates for the prompts sent at each consensus stage
pub struct ConsensusPrompt;

impl ConsensusPrompt {
    /// System prompt shared by both consensus phases
    pub fn system() -> &'static str {
        r#"You are one of several AI models consulted in parallel on the same question.
Provide your own best answer: state your approach, why it works, and its trade-offs.
Be direct and technically precise. Do not speculate about what other models might say."#
    }

    /// Default refinement prompt for the cross-feedback phase.
    ///
    /// Quotes the original question, the model's own initial answer, and
    /// every *other* model's answer labeled by model name. Peer output is
    /// embedded verbatim.
    pub fn cross_feedback(
        original_prompt: &str,
        own_response: &str,
        others: &[(String, String)],
    ) -> String {
        let mut prompt = format!(
            r#"You previously analyzed the following question/proposal:

{}

Your initial response was:
{}

Other AI models have also provided their perspectives on this same question. Here are their responses:
"#,
            original_prompt, own_response
        );

        for (i, (model, response)) in others.iter().enumerate() {
            prompt.push_str(&format!(
                "\n=== Response {} from {} ===\n{}\n",
                i + 1,
                model,
                response
            ));
        }

        prompt.push_str(
            r#"
Review all solutions including yours. Focus on:

1. Is there a better approach here that you missed?
2. Does someone have a key insight that makes the problem simpler?
3. Can you improve on the best approach you see?

If you see a superior solution, adopt and enhance it.
If your approach remains best, explain why clearly.

IMPORTANT: Your response will replace your initial one, so make it complete and self-contained."#,
        );

        prompt
    }

    /// Format a consensus result as the synthetic assistant turn appended
    /// to the conversation. Stores the standing answer per model, not the
    /// full result structure.
    pub fn storage_summary(result: &ConsensusResult) -> String {
        let mut parts = vec![format!(
            "Consensus gathering complete - {} of {} models responded",
            result.successful_initial(),
            result.models_consulted()
        )];

        if !result.initial.is_empty() {
            parts.push("\n\nModel responses:".to_string());
            for outcome in &result.initial {
                let content = result.final_response_for(&outcome.model).unwrap_or("");
                parts.push(format!("\n\n--- {} ---\n{}", outcome.model, content));
            }
        }

        if !result.failed.is_empty() {
            parts.push(format!("\n\nFailed models: {}", result.failed_count()));
            for failed in &result.failed {
                parts.push(format!(
                    "\n- {}: {}",
                    failed.model,
                    failed.error.as_deref().unwrap_or("unknown error")
                ));
            }
        }

        parts.concat()
    }
}
