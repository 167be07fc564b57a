//! lexisub-cp library interface
//!
//! Exposes public APIs for integration testing

pub mod api;
pub mod error;
pub mod media;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod subtitle;
pub mod transcribe;
pub mod vocab;
pub mod ws;

pub use crate::error::{ApiError, ApiResult};

use crate::pipeline::ChunkProcessor;
use crate::registry::TaskRegistry;
use crate::ws::ConnectionManager;
use axum::Router;
use chrono::{DateTime, Utc};
use lexisub_common::protocol::ServerMessage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Task progress registry
    pub registry: Arc<TaskRegistry>,
    /// Live WebSocket connections
    pub connections: Arc<ConnectionManager>,
    /// Chunk pipeline orchestrator
    pub processor: Arc<ChunkProcessor>,
    /// Cancellation tokens for active tasks
    pub cancellation_tokens: Arc<RwLock<HashMap<String, CancellationToken>>>,
    /// Language used when a request does not name one
    pub default_language: String,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        registry: Arc<TaskRegistry>,
        connections: Arc<ConnectionManager>,
        processor: Arc<ChunkProcessor>,
        default_language: String,
    ) -> Self {
        Self {
            registry,
            connections,
            processor,
            cancellation_tokens: Arc::new(RwLock::new(HashMap::new())),
            default_language,
            startup_time: Utc::now(),
        }
    }
}

/// Wire registry updates into the connection manager: every task update is
/// pushed to the owning user's connections, and a completed task's payload
/// follows as a separate result message.
pub fn bridge_registry_updates(registry: &TaskRegistry, connections: Arc<ConnectionManager>) {
    registry.on_update(move |record| {
        let progress = ServerMessage::TaskProgress {
            task_id: record.task_id.clone(),
            status: record.state.as_str().to_string(),
            progress: record.progress,
            current_step: record.current_step.clone(),
            message: if let Some(error) = &record.error {
                error.clone()
            } else {
                record.message.clone()
            },
        };
        connections.send_to_user(&record.user_id, &progress);

        if let Some(result) = &record.result {
            let message = ServerMessage::TaskResult {
                task_id: record.task_id.clone(),
                result: result.clone(),
            };
            connections.send_to_user(&record.user_id, &message);
        }
    });
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::chunk_routes())
        .route("/ws", get(ws::ws_handler))
        .merge(api::health_routes())
        .with_state(state)
}
