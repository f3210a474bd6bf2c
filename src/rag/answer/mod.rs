#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::Result;
use crate::config::AssistantConfig;
use crate::index::ScoredPassage;
use crate::llm::{LanguageModel, render_answer_prompt};

/// What to do when no passage clears the score threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyContextPolicy {
    /// Reply with the configured fallback answer without calling the model
    #[default]
    Fallback,
    /// Call the model with an empty context and let it say it does not know
    AskModel,
}

/// Produces the final answer from a standalone question and its passages
#[derive(Clone)]
pub struct AnswerAssembler {
    model: Arc<dyn LanguageModel>,
    persona: String,
    policy: EmptyContextPolicy,
    fallback_answer: String,
}

impl std::fmt::Debug for AnswerAssembler {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerAssembler")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl AnswerAssembler {
    #[inline]
    pub fn new(model: Arc<dyn LanguageModel>, config: &AssistantConfig) -> Self {
        Self {
            model,
            persona: config.persona.clone(),
            policy: config.empty_context_policy,
            fallback_answer: config.fallback_answer.clone(),
        }
    }

    #[inline]
    pub async fn answer(&self, question: &str, passages: &[ScoredPassage]) -> Result<String> {
        if passages.is_empty() {
            match self.policy {
                EmptyContextPolicy::Fallback => {
                    info!("No passages qualified; replying with the fallback answer");
                    return Ok(self.fallback_answer.clone());
                }
                EmptyContextPolicy::AskModel => {
                    info!("No passages qualified; asking the model without context");
                }
            }
        }

        let context = format_context(passages);
        let prompt = render_answer_prompt(&self.persona, &context, question);
        debug!(
            "Answer prompt has {} passages, {} chars",
            passages.len(),
            prompt.len()
        );

        self.model.generate(&prompt).await
    }
}

/// `Source: {url}` followed by the passage text, one block per passage
#[inline]
pub fn format_context(passages: &[ScoredPassage]) -> String {
    passages
        .iter()
        .map(|scored| format!("Source: {}\n{}", scored.passage.url, scored.passage.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}
