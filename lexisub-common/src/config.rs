//! Configuration loading and media root resolution
//!
//! Resolution priority, highest first:
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Service configuration for lexisub-cp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Directory scanned for video and subtitle files
    pub media_root: PathBuf,
    /// HTTP bind address
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Path to the sqlite vocabulary database
    pub vocab_db: PathBuf,
    /// Base URL of a Whisper-compatible transcription endpoint.
    /// None means no transcription service is configured.
    #[serde(default)]
    pub transcription_url: Option<String>,
    /// Timeout for external service calls (transcription, knowledge store)
    #[serde(default = "default_timeout_secs")]
    pub external_timeout_secs: u64,
    /// Language assumed when a request does not specify one
    #[serde(default = "default_language")]
    pub default_language: String,
}

fn default_bind() -> String {
    "127.0.0.1:5741".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_language() -> String {
    "de".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let root = default_data_dir();
        Self {
            media_root: root.join("media"),
            bind: default_bind(),
            vocab_db: root.join("vocabulary.db"),
            transcription_url: None,
            external_timeout_secs: default_timeout_secs(),
            default_language: default_language(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration with CLI → env → TOML → default priority.
    ///
    /// `cli_path` is an explicit config file path from the command line.
    pub fn load(cli_path: Option<&str>) -> Result<Self> {
        let mut config = if let Some(path) = cli_path {
            Self::from_file(Path::new(path))?
        } else if let Ok(path) = std::env::var("LEXISUB_CONFIG") {
            Self::from_file(Path::new(&path))?
        } else if let Some(path) = default_config_path() {
            if path.exists() {
                Self::from_file(&path)?
            } else {
                Self::default()
            }
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read config failed ({}): {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse config failed ({}): {}", path.display(), e)))
    }

    /// Individual environment variables override file values
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LEXISUB_MEDIA_ROOT") {
            self.media_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LEXISUB_BIND") {
            self.bind = v;
        }
        if let Ok(v) = std::env::var("LEXISUB_VOCAB_DB") {
            self.vocab_db = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LEXISUB_TRANSCRIPTION_URL") {
            if v.trim().is_empty() {
                self.transcription_url = None;
            } else {
                self.transcription_url = Some(v);
            }
        }
        if let Ok(v) = std::env::var("LEXISUB_EXTERNAL_TIMEOUT_SECS") {
            if let Ok(secs) = v.parse() {
                self.external_timeout_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("LEXISUB_DEFAULT_LANGUAGE") {
            self.default_language = v;
        }
    }
}

/// Default configuration file path for the platform
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lexisub").join("lexisub-cp.toml"))
}

/// OS-dependent default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("lexisub"))
        .unwrap_or_else(|| PathBuf::from("./lexisub_data"))
}
