//! lexisub-cp - Chunk Processing Service
//!
//! Turns (video, time range, user) requests into classified subtitle
//! documents: resolves media, parses or transcribes subtitles, classifies
//! vocabulary against the user's knowledge, and streams progress to
//! connected WebSocket clients.

use anyhow::Result;
use lexisub_common::config::ServiceConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use lexisub_cp::media::MediaResolver;
use lexisub_cp::pipeline::ChunkProcessor;
use lexisub_cp::registry::TaskRegistry;
use lexisub_cp::transcribe::{HttpTranscriber, TranscriptionService};
use lexisub_cp::vocab::{LemmaClassifier, SqliteKnowledgeStore, VocabularyFilter};
use lexisub_cp::ws::ConnectionManager;
use lexisub_cp::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting lexisub-cp (Chunk Processing) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args().nth(1);
    let config = ServiceConfig::load(config_path.as_deref())?;
    info!("Media root: {}", config.media_root.display());
    info!("Vocabulary database: {}", config.vocab_db.display());

    let db_options = SqliteConnectOptions::new()
        .filename(&config.vocab_db)
        .read_only(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(db_options)
        .await?;
    info!("Vocabulary database connection established");

    let registry = Arc::new(TaskRegistry::new());
    let connections = Arc::new(ConnectionManager::new());
    lexisub_cp::bridge_registry_updates(&registry, connections.clone());

    let store = Arc::new(SqliteKnowledgeStore::new(db_pool));
    let classifier = Arc::new(LemmaClassifier::new());
    let filter = VocabularyFilter::new(classifier, store);

    let transcriber: Option<Arc<dyn TranscriptionService>> = match &config.transcription_url {
        Some(url) => {
            info!("Transcription service: {}", url);
            Some(Arc::new(HttpTranscriber::new(
                url,
                config.external_timeout_secs,
            )?))
        }
        None => {
            info!("No transcription service configured");
            None
        }
    };

    let processor = Arc::new(ChunkProcessor::new(
        registry.clone(),
        MediaResolver::new(config.media_root.clone()),
        filter,
        transcriber,
    ));

    let state = AppState::new(
        registry,
        connections,
        processor,
        config.default_language.clone(),
    );
    let app = lexisub_cp::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("Listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
