mod http_stub;

use std::time::Duration;

use api_lib::adapters::GeminiStoryAdapter;
use http_stub::{HttpStub, Reply};
use serde_json::{json, Value};
use story_engine_core::domain::{AgeBracket, ChildProfile, GenerationRequest, Theme};
use story_engine_core::prompt::build_request;
use story_engine_core::StoryBackend;
use uuid::Uuid;

fn text_reply(text: &str) -> Reply {
    Reply::Json(
        200,
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        }),
    )
}

fn adapter(stub: &HttpStub) -> GeminiStoryAdapter {
    GeminiStoryAdapter::new(
        stub.base_url.clone(),
        "test-key".to_string(),
        vec!["gemini-fast".to_string(), "gemini-slow".to_string()],
        vec!["v1beta".to_string(), "v1".to_string()],
        Duration::from_secs(20),
    )
    .expect("build adapter")
}

fn request() -> GenerationRequest {
    let profile = ChildProfile {
        id: Uuid::new_v4(),
        name: "Mia".to_string(),
        age_bracket: AgeBracket::EarlyReader,
        theme: Theme::SpaceAdventure,
    };
    build_request(&profile, &["Feed the cat".to_string()], None, 1, 10)
}

#[tokio::test]
async fn falls_back_to_the_next_api_version() {
    let stub = HttpStub::spawn(|path, body| {
        if path.starts_with("/v1beta/") {
            Reply::Json(404, json!({ "error": { "message": "model not found" } }))
        } else {
            let prompt = body
                .pointer("/contents/0/parts/0/text")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !prompt.contains("Feed the cat") {
                return Reply::Json(
                    400,
                    json!({ "error": { "message": "prompt lost the task titles" } }),
                );
            }
            text_reply("Chapter 1: Comet Cat\nMia fed the comet cat.")
        }
    });

    let text = adapter(&stub).generate_chapter(&request()).await.unwrap();

    assert_eq!(text, "Chapter 1: Comet Cat\nMia fed the comet cat.");
    assert_eq!(
        stub.paths(),
        vec![
            "/v1beta/models/gemini-fast:generateContent".to_string(),
            "/v1/models/gemini-fast:generateContent".to_string(),
        ]
    );
}

#[tokio::test]
async fn blocked_responses_move_on_to_the_next_model() {
    let stub = HttpStub::spawn(|path, _| {
        if path.contains("gemini-fast") {
            Reply::Json(
                200,
                json!({ "candidates": [{ "content": { "parts": [] }, "finishReason": "SAFETY" }] }),
            )
        } else {
            text_reply("Chapter 1: Moon Nap\nA sleepy tale.")
        }
    });

    let text = adapter(&stub).generate_chapter(&request()).await.unwrap();
    assert!(text.contains("Moon Nap"));
    assert_eq!(stub.paths().len(), 3);
}

#[tokio::test]
async fn a_hung_model_does_not_use_up_the_whole_budget() {
    let stub = HttpStub::spawn(|path, _| {
        if path.contains("gemini-fast") {
            Reply::Hang
        } else {
            text_reply("Chapter 1: Slow Boat\nMia sailed past the moon.")
        }
    });
    // Two options share one second, well inside the orchestrator's budget.
    let adapter = GeminiStoryAdapter::new(
        stub.base_url.clone(),
        "test-key".to_string(),
        vec!["gemini-fast".to_string(), "gemini-slow".to_string()],
        vec!["v1".to_string()],
        Duration::from_secs(1),
    )
    .expect("build adapter");

    let text = tokio::time::timeout(Duration::from_secs(2), adapter.generate_chapter(&request()))
        .await
        .expect("cascade finished within the budget")
        .unwrap();

    assert!(text.contains("Slow Boat"));
    assert_eq!(
        stub.paths(),
        vec![
            "/v1/models/gemini-fast:generateContent".to_string(),
            "/v1/models/gemini-slow:generateContent".to_string(),
        ]
    );
}

#[tokio::test]
async fn exhausting_every_option_reports_the_last_failure() {
    let stub = HttpStub::spawn(|_, _| {
        Reply::Json(500, json!({ "error": { "message": "overloaded" } }))
    });

    let err = adapter(&stub)
        .generate_chapter(&request())
        .await
        .unwrap_err()
        .to_string();

    assert!(err.contains("all Gemini models failed"));
    assert!(err.contains("overloaded"));
    assert_eq!(stub.paths().len(), 4);
}

#[tokio::test]
async fn moderation_reads_the_one_word_verdict() {
    let stub = HttpStub::spawn(|_, body| {
        let prompt = body
            .pointer("/contents/0/parts/0/text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if prompt.contains("gloomy") {
            text_reply("UNSAFE")
        } else {
            text_reply("SAFE")
        }
    });
    let adapter = adapter(&stub);

    assert!(adapter.moderate_content("A sunny picnic.").await.unwrap());
    assert!(!adapter.moderate_content("A gloomy cellar.").await.unwrap());
}
