//! Subtitle timestamp utilities
//!
//! SRT timestamps have the form `HH:MM:SS,mmm`. Parsing and formatting must
//! round-trip byte-identically so that rewritten subtitle documents keep
//! timing fields the pipeline did not alter.

use crate::{Error, Result};
use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse an SRT timestamp (`HH:MM:SS,mmm`) into seconds
pub fn parse_timestamp(s: &str) -> Result<f64> {
    let s = s.trim();
    let (hms, millis) = s
        .split_once(',')
        .ok_or_else(|| Error::Subtitle(format!("Bad timestamp (no millis): {:?}", s)))?;

    let mut parts = hms.split(':');
    let hours: u64 = next_field(&mut parts, s)?;
    let minutes: u64 = next_field(&mut parts, s)?;
    let seconds: u64 = next_field(&mut parts, s)?;
    if parts.next().is_some() || minutes > 59 || seconds > 59 {
        return Err(Error::Subtitle(format!("Bad timestamp: {:?}", s)));
    }

    let millis: u64 = millis
        .parse()
        .map_err(|_| Error::Subtitle(format!("Bad milliseconds: {:?}", s)))?;
    if millis > 999 {
        return Err(Error::Subtitle(format!("Bad milliseconds: {:?}", s)));
    }

    Ok((hours * 3600 + minutes * 60 + seconds) as f64 + millis as f64 / 1000.0)
}

fn next_field<'a>(parts: &mut impl Iterator<Item = &'a str>, full: &str) -> Result<u64> {
    parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| Error::Subtitle(format!("Bad timestamp: {:?}", full)))
}

/// Format seconds as an SRT timestamp (`HH:MM:SS,mmm`)
pub fn format_timestamp(secs: f64) -> String {
    let total_millis = (secs.max(0.0) * 1000.0).round() as u64;
    let millis = total_millis % 1000;
    let total_secs = total_millis / 1000;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total_secs / 3600,
        (total_secs / 60) % 60,
        total_secs % 60,
        millis
    )
}
