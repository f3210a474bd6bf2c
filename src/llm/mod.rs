// Language model collaborator
// Prompt rendering lives in `prompt`; concrete models implement `LanguageModel`

pub mod prompt;

use async_trait::async_trait;

use crate::Result;

pub use prompt::{render_answer_prompt, render_condense_prompt};

/// A text-in, text-out completion model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}
