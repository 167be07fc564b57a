//! Chunk processing pipeline
//!
//! Orchestrates one chunk request end to end: resolve the video, obtain a
//! subtitle document (on-disk SRT or external transcription), restrict to
//! the requested window, classify vocabulary, and write the terminal record.
//!
//! Cancellation is checked at stage boundaries. A stage already underway
//! runs to completion; its registry write then fails against the cancelled
//! record and the pipeline stops. All progress flows through the registry,
//! which fans out to connected clients.

use crate::media::MediaResolver;
use crate::models::{TaskState, TaskUpdate};
use crate::registry::TaskRegistry;
use crate::subtitle::{self, SubtitleSegment, TimeRange};
use crate::transcribe::TranscriptionService;
use crate::vocab::VocabularyFilter;
use lexisub_common::{Error, Result};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// One chunk processing request
#[derive(Debug, Clone)]
pub struct ChunkRequest {
    pub task_id: String,
    pub user_id: String,
    pub video_ref: String,
    pub range: TimeRange,
    pub language: String,
}

/// The orchestrator: owns the stage collaborators, writes all task progress
pub struct ChunkProcessor {
    registry: Arc<TaskRegistry>,
    media: MediaResolver,
    filter: VocabularyFilter,
    transcriber: Option<Arc<dyn TranscriptionService>>,
}

impl ChunkProcessor {
    pub fn new(
        registry: Arc<TaskRegistry>,
        media: MediaResolver,
        filter: VocabularyFilter,
        transcriber: Option<Arc<dyn TranscriptionService>>,
    ) -> Self {
        Self {
            registry,
            media,
            filter,
            transcriber,
        }
    }

    /// Drive a chunk request to a terminal state.
    ///
    /// Never returns an error to the caller: failures are written to the
    /// registry as the `error` terminal state. If the task was cancelled
    /// externally the terminal record already exists and the late write is
    /// absorbed.
    pub async fn run(&self, request: ChunkRequest, cancel: CancellationToken) {
        let task_id = request.task_id.clone();
        match self.execute(&request, &cancel).await {
            Ok(result) => {
                let update = TaskUpdate::new()
                    .state(TaskState::Completed)
                    .progress(100)
                    .step("Completed")
                    .message("Chunk processed")
                    .result(result);
                match self.registry.update(&task_id, update) {
                    Ok(_) => info!(task_id = %task_id, "Chunk processing complete"),
                    Err(Error::TerminalState(_)) => {
                        debug!(task_id = %task_id, "Result discarded, task already terminal")
                    }
                    Err(e) => error!(task_id = %task_id, error = %e, "Failed to record completion"),
                }
            }
            Err(Error::TerminalState(_)) => {
                // Cancelled underneath us; the registry already holds the
                // terminal record.
                debug!(task_id = %task_id, "Pipeline stopped, task already terminal");
            }
            Err(e) => {
                error!(task_id = %task_id, error = %e, "Chunk processing failed");
                let update = TaskUpdate::new()
                    .state(TaskState::Error)
                    .step("Failed")
                    .message(e.to_string())
                    .error(e.to_string());
                if let Err(write_err) = self.registry.update(&task_id, update) {
                    match write_err {
                        Error::TerminalState(_) => {
                            debug!(task_id = %task_id, "Error discarded, task already terminal")
                        }
                        other => {
                            error!(task_id = %task_id, error = %other, "Failed to record error")
                        }
                    }
                }
            }
        }
    }

    async fn execute(
        &self,
        request: &ChunkRequest,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value> {
        let task_id = &request.task_id;

        self.checkpoint(task_id, cancel)?;
        self.registry.update(
            task_id,
            TaskUpdate::new()
                .state(TaskState::Starting)
                .progress(5)
                .step("Resolving media"),
        )?;

        let video = self.media.resolve_video(&request.video_ref)?;

        self.checkpoint(task_id, cancel)?;
        let segments = self.obtain_segments(task_id, &video, &request.language).await?;

        let windowed = subtitle::window(&segments, &request.range);
        debug!(
            task_id = %task_id,
            total = segments.len(),
            windowed = windowed.len(),
            "Windowed subtitle segments"
        );

        self.checkpoint(task_id, cancel)?;
        self.registry.update(
            task_id,
            TaskUpdate::new()
                .state(TaskState::Processing)
                .progress(30)
                .step("Classifying vocabulary"),
        )?;

        let analysis = self
            .filter
            .classify(&windowed, &request.user_id, &request.language, &|progress, step| {
                // Mid-stage progress is advisory; a failed write here must
                // not abort the classification itself
                let _ = self.registry.update(
                    task_id,
                    TaskUpdate::new().progress(progress).step(step),
                );
            })
            .await?;

        self.checkpoint(task_id, cancel)?;
        let document = subtitle::write(&windowed);
        let analysis = serde_json::to_value(&analysis)
            .map_err(|e| Error::Internal(format!("result serialization: {}", e)))?;

        Ok(json!({
            "video_ref": request.video_ref,
            "video_path": video.to_string_lossy(),
            "range": { "start": request.range.start, "end": request.range.end },
            "language": request.language,
            "subtitle_document": document,
            "analysis": analysis,
        }))
    }

    /// Source subtitle segments: on-disk SRT next to the video, otherwise
    /// the external transcription service.
    async fn obtain_segments(
        &self,
        task_id: &str,
        video: &std::path::Path,
        language: &str,
    ) -> Result<Vec<SubtitleSegment>> {
        if let Some(subtitle_path) = self.media.subtitle_for(video) {
            self.registry.update(
                task_id,
                TaskUpdate::new().progress(10).step("Reading subtitles"),
            )?;
            let document = tokio::fs::read_to_string(&subtitle_path).await?;
            return subtitle::parse(&document);
        }

        self.registry.update(
            task_id,
            TaskUpdate::new().progress(10).step("Transcribing audio"),
        )?;
        let transcriber = self.transcriber.as_ref().ok_or_else(|| {
            Error::UpstreamUnavailable("no transcription service configured".to_string())
        })?;
        transcriber.transcribe(video, language).await
    }

    /// Stage-boundary cancellation check. Maps a fired token onto the same
    /// error a write against the cancelled record produces, so `run` treats
    /// both paths identically.
    fn checkpoint(&self, task_id: &str, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::TerminalState(task_id.to_string()));
        }
        match self.registry.get(task_id) {
            Some(record) if record.is_terminal() => {
                Err(Error::TerminalState(task_id.to_string()))
            }
            _ => Ok(()),
        }
    }
}
