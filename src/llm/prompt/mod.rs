
const CONDENSE_INSTRUCTIONS: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.";

const ANSWER_RULES: &str = "In case of a greeting, introduce yourself and what you can help with.
If the question is not related to the documentation you support, say so and suggest better questions to ask.
If you don't know the answer, just say that you don't know, don't try to make up an answer.
Be as descriptive as possible, while also concise.
Don't use any placeholder text.
Make sure to answer in the same language as asked.
If a feature is not present in the context, answer that it does not exist.";

/// Render the prompt that turns a follow-up into a standalone question
#[inline]
pub fn render_condense_prompt(chat_history: &str, question: &str) -> String {
    // Appended verbatim; user text may itself contain braces
    let mut prompt =
        String::with_capacity(CONDENSE_INSTRUCTIONS.len() + chat_history.len() + question.len() + 64);
    prompt.push_str(CONDENSE_INSTRUCTIONS);
    prompt.push_str("\n\nChat History:\n");
    prompt.push_str(chat_history);
    prompt.push_str("\nFollow Up Input: ");
    prompt.push_str(question);
    prompt.push_str("\nStandalone question:");
    prompt
}

/// Render the grounded answer prompt; `context` may be empty
#[inline]
pub fn render_answer_prompt(persona: &str, context: &str, question: &str) -> String {
    let mut prompt = String::with_capacity(
        persona.len() + ANSWER_RULES.len() + context.len() + question.len() + 128,
    );

    let persona = persona.trim();
    if !persona.is_empty() {
        prompt.push_str(persona);
        prompt.push('\n');
    }
    prompt.push_str(ANSWER_RULES);
    prompt.push_str("\nAnswer the question based only on the following context.\n");
    prompt.push_str(context);
    prompt.push_str("\nQuestion: ");
    prompt.push_str(question);
    prompt.push_str("\nHelpful Answer:\nHelpful links (only if you know the actual links):\n");
    prompt
}
