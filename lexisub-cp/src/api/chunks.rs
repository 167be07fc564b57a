//! Chunk processing API handlers
//!
//! POST /chunks/process, GET /chunks/status/:task_id,
//! POST /chunks/cancel/:task_id

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{TaskRecord, TaskState};
use crate::pipeline::ChunkRequest;
use crate::subtitle::TimeRange;
use crate::AppState;

/// POST /chunks/process request
#[derive(Debug, Deserialize)]
pub struct ProcessChunkRequest {
    /// Episode identifier or path relative to the media root
    pub video_ref: String,
    pub start_secs: f64,
    pub end_secs: f64,
    pub user_id: String,
    /// Source language; the configured default when omitted
    #[serde(default)]
    pub language: Option<String>,
    /// Caller-supplied task id; generated when omitted
    #[serde(default)]
    pub task_id: Option<String>,
}

/// POST /chunks/process response
#[derive(Debug, Serialize)]
pub struct ProcessChunkResponse {
    pub task_id: String,
    pub state: TaskState,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// POST /chunks/cancel/:task_id response
#[derive(Debug, Serialize)]
pub struct CancelChunkResponse {
    pub task_id: String,
    pub state: TaskState,
    pub cancelled_at: chrono::DateTime<chrono::Utc>,
}

/// POST /chunks/process
///
/// Register a chunk task and start processing in the background.
/// Returns 202 Accepted with the task id.
pub async fn process_chunk(
    State(state): State<AppState>,
    Json(request): Json<ProcessChunkRequest>,
) -> ApiResult<(StatusCode, Json<ProcessChunkResponse>)> {
    if request.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user_id must not be empty".to_string()));
    }
    let range = TimeRange::new(request.start_secs, request.end_secs)?;

    let task_id = request
        .task_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let language = request
        .language
        .unwrap_or_else(|| state.default_language.clone());

    // Duplicate task ids map to 409
    let record = state.registry.create(&task_id, &request.user_id)?;

    let cancel = CancellationToken::new();
    state
        .cancellation_tokens
        .write()
        .await
        .insert(task_id.clone(), cancel.clone());

    let chunk_request = ChunkRequest {
        task_id: task_id.clone(),
        user_id: request.user_id,
        video_ref: request.video_ref,
        range,
        language,
    };

    tracing::info!(
        task_id = %task_id,
        video_ref = %chunk_request.video_ref,
        "Chunk task registered"
    );

    let processor = state.processor.clone();
    let tokens = state.cancellation_tokens.clone();
    let spawned_task_id = task_id.clone();
    tokio::spawn(async move {
        processor.run(chunk_request, cancel).await;
        tokens.write().await.remove(&spawned_task_id);
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ProcessChunkResponse {
            task_id: record.task_id,
            state: record.state,
            created_at: record.created_at,
        }),
    ))
}

/// GET /chunks/status/:task_id
pub async fn chunk_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskRecord>> {
    let record = state
        .registry
        .get(&task_id)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown task: {}", task_id)))?;
    Ok(Json(record))
}

/// POST /chunks/cancel/:task_id
///
/// Write the cancelled terminal state and fire the task's cancellation
/// token. Cancelling an already-terminal task is a 400.
pub async fn cancel_chunk(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<CancelChunkResponse>> {
    let record = state.registry.cancel(&task_id)?;

    if let Some(token) = state.cancellation_tokens.write().await.remove(&task_id) {
        token.cancel();
    }

    tracing::info!(task_id = %task_id, "Chunk task cancelled");
    Ok(Json(CancelChunkResponse {
        task_id: record.task_id,
        state: record.state,
        cancelled_at: record.updated_at,
    }))
}

/// Build chunk processing routes
pub fn chunk_routes() -> Router<AppState> {
    Router::new()
        .route("/chunks/process", post(process_chunk))
        .route("/chunks/status/:task_id", get(chunk_status))
        .route("/chunks/cancel/:task_id", post(cancel_chunk))
}
