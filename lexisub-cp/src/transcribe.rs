//! Transcription service client
//!
//! Optional external collaborator that produces time-stamped segments from a
//! media file when no subtitle document exists on disk. The pipeline treats
//! an absent or unreachable transcriber identically: the chunk fails with an
//! upstream error, it never falls back to empty subtitles.

use crate::subtitle::SubtitleSegment;
use async_trait::async_trait;
use lexisub_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

const USER_AGENT: &str = "lexisub-cp/0.1.0";

/// Produces time-stamped segments from a media file
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe(&self, media: &Path, language: &str) -> Result<Vec<SubtitleSegment>>;
}

/// Request body for the transcription endpoint
#[derive(Debug, Serialize)]
struct TranscribeRequest<'a> {
    media_path: &'a str,
    language: &'a str,
}

/// One segment as returned by the transcription endpoint
#[derive(Debug, Deserialize)]
struct TranscribedSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    segments: Vec<TranscribedSegment>,
}

/// HTTP client for an external transcription server
pub struct HttpTranscriber {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpTranscriber {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::UpstreamUnavailable(format!("transcriber: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TranscriptionService for HttpTranscriber {
    async fn transcribe(&self, media: &Path, language: &str) -> Result<Vec<SubtitleSegment>> {
        let url = format!("{}/transcribe", self.base_url);
        let request = TranscribeRequest {
            media_path: &media.to_string_lossy(),
            language,
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("transcriber: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamUnavailable(format!(
                "transcriber returned {}: {}",
                status, body
            )));
        }

        let parsed: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("transcriber response: {}", e)))?;

        let segments: Vec<SubtitleSegment> = parsed
            .segments
            .into_iter()
            .filter(|s| s.end > s.start && !s.text.trim().is_empty())
            .map(|s| SubtitleSegment::new(s.start, s.end, s.text))
            .collect();

        info!(
            media = %media.display(),
            language = %language,
            segments = segments.len(),
            "Transcription complete"
        );
        Ok(segments)
    }
}
