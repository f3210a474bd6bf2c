
use std::sync::Arc;
use tracing::debug;

use crate::Result;
use crate::history::ConversationHistory;
use crate::llm::{LanguageModel, render_condense_prompt};

/// Rewrites a follow-up into a question that stands on its own
#[derive(Clone)]
pub struct QueryCondenser {
    model: Arc<dyn LanguageModel>,
}

impl std::fmt::Debug for QueryCondenser {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCondenser").finish_non_exhaustive()
    }
}

impl QueryCondenser {
    #[inline]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// One model call per question, with or without history
    #[inline]
    pub async fn condense(&self, question: &str, history: &ConversationHistory) -> Result<String> {
        let prompt = render_condense_prompt(&format_chat_history(history), question);
        let standalone = self.model.generate(&prompt).await?.trim().to_string();

        debug!("Condensed {:?} into {:?}", question, standalone);
        Ok(standalone)
    }
}

/// `Human:`/`Assistant:` lines, oldest exchange first
#[inline]
pub fn format_chat_history(history: &ConversationHistory) -> String {
    history
        .exchanges()
        .iter()
        .map(|exchange| format!("Human: {}\nAssistant: {}", exchange.question, exchange.answer))
        .collect::<Vec<_>>()
        .join("\n")
}
