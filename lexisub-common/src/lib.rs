//! # Lexisub Common Library
//!
//! Shared code for the lexisub services including:
//! - Error taxonomy (pipeline + registry + connection errors)
//! - Configuration loading (CLI → env → TOML → compiled default)
//! - Subtitle timestamp utilities
//! - WebSocket wire-protocol types

pub mod config;
pub mod error;
pub mod protocol;
pub mod time;

pub use error::{Error, Result};
