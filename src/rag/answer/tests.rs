use super::*;
use crate::DocsError;
use crate::test_support::{ScriptedModel, passage};

fn scored(url: &str, text: &str, score: f32) -> ScoredPassage {
    ScoredPassage {
        passage: passage(0, url, text),
        score,
    }
}

fn config(policy: EmptyContextPolicy) -> AssistantConfig {
    AssistantConfig {
        persona: "You are the Mapeo support agent.".to_string(),
        empty_context_policy: policy,
        fallback_answer: "Sorry, the documentation does not cover that.".to_string(),
        ..AssistantConfig::default()
    }
}

fn assembler(model: &Arc<ScriptedModel>, policy: EmptyContextPolicy) -> AnswerAssembler {
    let model: Arc<ScriptedModel> = Arc::clone(model);
    AnswerAssembler::new(model, &config(policy))
}

#[test]
fn context_blocks_keep_score_order() {
    let passages = vec![
        scored("https://docs.mapeo.app/sync", "Sync over wifi.", 0.92),
        scored("https://docs.mapeo.app/export", "Export to GeoJSON.", 0.81),
    ];

    assert_eq!(
        format_context(&passages),
        "Source: https://docs.mapeo.app/sync\nSync over wifi.\n\n\
         Source: https://docs.mapeo.app/export\nExport to GeoJSON."
    );
    assert_eq!(format_context(&[]), "");
}

#[tokio::test]
async fn answer_prompt_carries_persona_context_and_question() {
    let model = Arc::new(ScriptedModel::new("unused", "Use the sync screen."));
    let passages = vec![scored("https://docs.mapeo.app/sync", "Sync over wifi.", 0.9)];

    let answer = assembler(&model, EmptyContextPolicy::Fallback)
        .answer("How do I sync?", &passages)
        .await
        .expect("answer should succeed");

    assert_eq!(answer, "Use the sync screen.");

    let prompts = model.answer_prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].starts_with("You are the Mapeo support agent.\n"));
    assert!(prompts[0].contains("Source: https://docs.mapeo.app/sync\nSync over wifi."));
    assert!(prompts[0].contains("Question: How do I sync?\nHelpful Answer:"));
}

#[tokio::test]
async fn fallback_policy_skips_the_model() {
    let model = Arc::new(ScriptedModel::new("unused", "should not be used"));

    let answer = assembler(&model, EmptyContextPolicy::Fallback)
        .answer("What is the airspeed of a swallow?", &[])
        .await
        .expect("empty context never fails");

    assert_eq!(answer, "Sorry, the documentation does not cover that.");
    assert!(model.prompts().is_empty());
}

#[tokio::test]
async fn ask_model_policy_sends_empty_context() {
    let model = Arc::new(ScriptedModel::new("unused", "I don't know."));

    let answer = assembler(&model, EmptyContextPolicy::AskModel)
        .answer("What is the airspeed of a swallow?", &[])
        .await
        .expect("empty context never fails");

    assert_eq!(answer, "I don't know.");
    let prompts = model.answer_prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(
        "based only on the following context.\n\nQuestion: What is the airspeed of a swallow?"
    ));
}

#[tokio::test]
async fn model_errors_propagate() {
    let model = Arc::new(ScriptedModel::failing());
    let passages = vec![scored("https://docs.mapeo.app/sync", "Sync over wifi.", 0.9)];

    let error = assembler(&model, EmptyContextPolicy::Fallback)
        .answer("How do I sync?", &passages)
        .await
        .expect_err("model failure should propagate");

    assert!(matches!(error, DocsError::Model(_)));
}

#[test]
fn policy_names() {
    #[derive(Deserialize)]
    struct Wrapper {
        policy: EmptyContextPolicy,
    }

    let parsed: Wrapper = toml::from_str("policy = \"ask_model\"").expect("valid toml");
    assert_eq!(parsed.policy, EmptyContextPolicy::AskModel);
}
