//! End-to-end API integration tests
//!
//! These tests drive the HTTP router with a scripted generator:
//! - Health check
//! - Single task and batch submission
//! - Per-task failure isolation
//! - Chat history hand-back and local quiz grading
//! - Outline-driven section slides

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use quickstudy_api::agents::{AgentSet, Coordinator, TaskKind};
use quickstudy_api::api::{router, AppState};
use quickstudy_api::llm::{GenerationError, StubGenerator, StubReply};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for oneshot

/// A reply that reads as a slide and also carries a one-question quiz
const SLIDE_AND_QUIZ: &str = "# Photosynthesis\n\
Plants turn light into chemical energy stored as sugar.\n\
- Happens in chloroplasts\n\
```json\n\
[{\"question\": \"Where does photosynthesis happen?\", \"options\": [\"Chloroplasts\", \"Nucleus\"], \"answer\": \"Chloroplasts\"}]\n\
```";

fn setup_app(stub: StubGenerator) -> Router {
    router(AppState::new(Coordinator::with_generator(Arc::new(stub))))
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let app = setup_app(StubGenerator::replying("unused"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn test_content_and_quiz_batch_both_succeed() {
    let app = setup_app(StubGenerator::replying(SLIDE_AND_QUIZ));

    let (status, json) = post_json(
        app,
        "/api/tasks/batch",
        json!({
            "tasks": [
                {"id": "7d1d6c2e-1f1a-4a55-9a53-2f8c1d3b9a01", "kind": "generate_content", "payload": {"text": "Photosynthesis notes"}},
                {"id": "7d1d6c2e-1f1a-4a55-9a53-2f8c1d3b9a02", "kind": "create_quiz", "payload": {"text": "Photosynthesis notes", "count": 1}}
            ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let outcomes = &json["outcomes"];
    assert_eq!(outcomes.as_object().unwrap().len(), 2);

    let content = &outcomes["7d1d6c2e-1f1a-4a55-9a53-2f8c1d3b9a01"];
    assert_eq!(content["status"], "succeeded");
    assert_eq!(content["output"]["type"], "slides");
    assert_eq!(content["output"]["slides"][0]["title"], "Photosynthesis");

    let quiz = &outcomes["7d1d6c2e-1f1a-4a55-9a53-2f8c1d3b9a02"];
    assert_eq!(quiz["status"], "succeeded");
    assert_eq!(quiz["output"]["type"], "quiz");
    assert_eq!(quiz["output"]["questions"].as_array().unwrap().len(), 1);
    assert_eq!(
        quiz["output"]["questions"][0]["correct_answers"][0],
        "Chloroplasts"
    );
}

#[tokio::test]
async fn test_failing_task_does_not_sink_the_batch() {
    let stub = StubGenerator::replying("# Cells\nCells are the unit of life.")
        .when_prompt_contains("Mermaid", StubReply::Fail(GenerationError::Timeout(
            std::time::Duration::from_secs(30),
        )));
    let app = setup_app(stub);

    let (status, json) = post_json(
        app,
        "/api/tasks/batch",
        json!({
            "tasks": [
                {"id": "00000000-0000-4000-8000-000000000001", "kind": "generate_content", "payload": {"text": "Cells"}},
                {"id": "00000000-0000-4000-8000-000000000002", "kind": "generate_diagram", "payload": {"topic": "Cells"}},
                {"id": "00000000-0000-4000-8000-000000000003", "kind": "create_quiz", "payload": {}},
                {"id": "00000000-0000-4000-8000-000000000004", "kind": "summon_dragon", "payload": {}}
            ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let outcomes = &json["outcomes"];
    assert_eq!(outcomes.as_object().unwrap().len(), 4);
    assert_eq!(outcomes["00000000-0000-4000-8000-000000000001"]["status"], "succeeded");
    assert_eq!(
        outcomes["00000000-0000-4000-8000-000000000002"]["cause"],
        "external_service"
    );
    assert_eq!(
        outcomes["00000000-0000-4000-8000-000000000003"]["cause"],
        "invalid_payload"
    );
    assert_eq!(
        outcomes["00000000-0000-4000-8000-000000000004"]["cause"],
        "unknown_agent_kind"
    );
}

#[tokio::test]
async fn test_empty_batch() {
    let app = setup_app(StubGenerator::replying("unused"));

    let (status, json) = post_json(app, "/api/tasks/batch", json!({"tasks": []})).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["outcomes"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn test_single_task_failure_is_data() {
    let app = setup_app(StubGenerator::replying("unused"));

    let (status, json) = post_json(
        app,
        "/api/tasks",
        json!({"kind": "answer_query", "payload": {"context": "no question here"}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "failed");
    assert_eq!(json["cause"], "invalid_payload");
    assert_eq!(json["kind"], "answer_query");
}

#[tokio::test]
async fn test_unregistered_agent_is_reported() {
    let coordinator = Coordinator::new(
        AgentSet::standard(Arc::new(StubGenerator::replying("x"))).without(TaskKind::SelectImage),
    );
    let app = router(AppState::new(coordinator));

    let (status, json) = post_json(
        app,
        "/api/tasks",
        json!({"kind": "select_image", "payload": {"topic": "t", "candidates": []}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cause"], "unknown_agent_kind");
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let app = setup_app(StubGenerator::replying("unused"));

    let (status, _) = post_json(app, "/api/tasks/batch", json!({"jobs": []})).await;

    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_chat_returns_extended_history() {
    let app = setup_app(StubGenerator::replying("Chlorophyll absorbs light."));

    let (status, json) = post_json(
        app,
        "/api/chat",
        json!({
            "question": "What absorbs light?",
            "context": "Chlorophyll is a pigment.",
            "history": [
                {"role": "user", "content": "Hi"},
                {"role": "assistant", "content": "Hello! Ask me about the document."}
            ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["answer"], "Chlorophyll absorbs light.");
    let history = json["history"].as_array().unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[2]["role"], "user");
    assert_eq!(history[2]["content"], "What absorbs light?");
    assert_eq!(history[3]["role"], "assistant");
}

#[tokio::test]
async fn test_chat_upstream_failure_is_bad_gateway() {
    let app = setup_app(StubGenerator::failing(GenerationError::Status {
        status: 503,
        body: "overloaded".to_string(),
    }));

    let (status, json) = post_json(app, "/api/chat", json!({"question": "Why?"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_quiz_grading() {
    let app = setup_app(StubGenerator::replying("unused"));
    let question = json!({
        "question": "Which are primary colors?",
        "question_type": "multi_select",
        "options": ["Red", "Green", "Blue", "Yellow"],
        "correct_answers": ["Red", "Blue", "Yellow"]
    });

    let (status, json) = post_json(
        app.clone(),
        "/api/quiz/grade",
        json!({"question": question, "selected": ["yellow", "Red", "Blue"]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["correct"], true);

    let (_, json) = post_json(
        app,
        "/api/quiz/grade",
        json!({"question": question, "selected": ["Red"]}),
    )
    .await;
    assert_eq!(json["correct"], false);
    assert_eq!(json["correct_answers"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_short_answer_grading_is_rejected() {
    let app = setup_app(StubGenerator::replying("unused"));

    let (status, _) = post_json(
        app,
        "/api/quiz/grade",
        json!({
            "question": {
                "question": "Explain osmosis.",
                "question_type": "short_answer",
                "correct_answers": ["Water moves across a membrane"]
            },
            "selected": ["something"]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_outline_drives_section_slides() {
    let stub = StubGenerator::replying("# Division\nCells split in two.\nImage: dividing cell")
        .when_prompt_contains(
            "table of contents",
            StubReply::Text(r#"{"sections": [{"title": "Cell Division", "subtopics": ["Mitosis"]}]}"#.to_string()),
        );
    let app = setup_app(stub);
    let document = "Cell Division\nCells split in two during mitosis.";

    let (status, outline) = post_json(
        app.clone(),
        "/api/tasks",
        json!({"kind": "generate_outline", "payload": {"text": document}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(outline["kind"], "generate_outline");
    assert_eq!(outline["output"]["type"], "outline");
    let sections = outline["output"]["sections"].clone();
    assert_eq!(sections[0]["subtopics"][0], "Mitosis");

    let (status, content) = post_json(
        app,
        "/api/tasks",
        json!({"kind": "generate_content", "payload": {"text": document, "sections": sections}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let slide = &content["output"]["slides"][0];
    assert_eq!(slide["section_title"], "Cell Division");
    assert_eq!(slide["image_prompt"], "dividing cell");
    assert_eq!(slide["content"], "Cells split in two.");
}
