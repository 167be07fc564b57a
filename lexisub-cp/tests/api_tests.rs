//! Integration tests for lexisub-cp API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use lexisub_cp::media::MediaResolver;
use lexisub_cp::pipeline::ChunkProcessor;
use lexisub_cp::registry::TaskRegistry;
use lexisub_cp::vocab::{LemmaClassifier, MemoryKnowledgeStore, Tier, VocabularyFilter};
use lexisub_cp::ws::ConnectionManager;
use lexisub_cp::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

/// Test helper: app over a temporary media library and in-memory knowledge
fn create_test_app() -> (axum::Router, Arc<TaskRegistry>, tempfile::TempDir) {
    let library = tempfile::tempdir().expect("Failed to create temp dir");
    std::fs::write(library.path().join("e01.mp4"), b"").expect("write video");
    std::fs::write(
        library.path().join("e01.srt"),
        "1\n00:00:01,000 --> 00:00:02,500\nIch gehe nach Hause\n",
    )
    .expect("write subtitles");

    let store = MemoryKnowledgeStore::new()
        .with_known("42", "ich", "de")
        .with_tier("gehen", "de", Tier::A2)
        .with_tier("nach", "de", Tier::A1)
        .with_level("42", Tier::A1);

    let registry = Arc::new(TaskRegistry::new());
    let connections = Arc::new(ConnectionManager::new());
    lexisub_cp::bridge_registry_updates(&registry, connections.clone());

    let filter = VocabularyFilter::new(Arc::new(LemmaClassifier::new()), Arc::new(store));
    let processor = Arc::new(ChunkProcessor::new(
        registry.clone(),
        MediaResolver::new(library.path().to_path_buf()),
        filter,
        None,
    ));

    let state = AppState::new(registry.clone(), connections, processor, "de".to_string());
    (lexisub_cp::build_router(state), registry, library)
}

async fn post_json(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let value = serde_json::from_slice(&bytes).expect("json body");
    (status, value)
}

fn process_request() -> Value {
    json!({
        "video_ref": "e01",
        "start_secs": 0.0,
        "end_secs": 10.0,
        "user_id": "42",
        "task_id": "t-1"
    })
}

/// Poll the status endpoint until the task reaches a terminal state
async fn await_terminal(app: &axum::Router, task_id: &str) -> Value {
    for _ in 0..100 {
        let (status, body) = get_json(app, &format!("/chunks/status/{}", task_id)).await;
        assert_eq!(status, StatusCode::OK);
        let state = body["state"].as_str().expect("state");
        if matches!(state, "completed" | "error" | "cancelled") {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("task {} never reached a terminal state", task_id);
}

#[tokio::test]
async fn process_returns_accepted_and_completes() {
    let (app, _registry, _library) = create_test_app();

    let (status, body) = post_json(&app, "/chunks/process", process_request()).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["task_id"], "t-1");
    assert_eq!(body["state"], "pending");

    let record = await_terminal(&app, "t-1").await;
    assert_eq!(record["state"], "completed");
    assert_eq!(record["progress"], 100);
    let blocking = record["result"]["analysis"]["blocking_words"]
        .as_array()
        .expect("blocking words");
    assert!(blocking.iter().any(|v| v == "gehen"));
}

#[tokio::test]
async fn duplicate_task_id_is_conflict() {
    let (app, _registry, _library) = create_test_app();

    let (status, _) = post_json(&app, "/chunks/process", process_request()).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    // Same task id again, while the first registration exists
    let (status, body) = post_json(&app, "/chunks/process", process_request()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn task_id_is_generated_when_omitted() {
    let (app, _registry, _library) = create_test_app();

    let (status, body) = post_json(
        &app,
        "/chunks/process",
        json!({
            "video_ref": "e01",
            "start_secs": 0.0,
            "end_secs": 10.0,
            "user_id": "42"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(!body["task_id"].as_str().expect("task id").is_empty());
}

#[tokio::test]
async fn invalid_time_range_is_bad_request() {
    let (app, _registry, _library) = create_test_app();

    let (status, body) = post_json(
        &app,
        "/chunks/process",
        json!({
            "video_ref": "e01",
            "start_secs": 10.0,
            "end_secs": 5.0,
            "user_id": "42"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn status_of_unknown_task_is_not_found() {
    let (app, _registry, _library) = create_test_app();
    let (status, body) = get_json(&app, "/chunks/status/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn cancel_marks_task_cancelled() {
    let (app, registry, _library) = create_test_app();

    registry.create("t-9", "42").expect("create task");
    let (status, body) = post_json(&app, "/chunks/cancel/t-9", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "cancelled");

    // Cancelling a terminal task is rejected
    let (status, body) = post_json(&app, "/chunks/cancel/t-9", Value::Null).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn cancel_unknown_task_is_not_found() {
    let (app, _registry, _library) = create_test_app();
    let (status, body) = post_json(&app, "/chunks/cancel/nope", Value::Null).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn health_reports_service_identity() {
    let (app, _registry, _library) = create_test_app();
    let (status, body) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "lexisub-cp");
    assert_eq!(body["connections"], 0);
}
