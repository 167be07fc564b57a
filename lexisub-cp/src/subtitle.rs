//! Subtitle document parser/writer (SRT timed text)
//!
//! Parses an SRT document into an ordered list of time-stamped segments and
//! serializes a list back. Timing and text of segments the pipeline does not
//! alter round-trip byte-identically. Overlapping segments are legal in
//! source data and are preserved, never merged.

use lexisub_common::time::{format_timestamp, parse_timestamp};
use lexisub_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// One time-stamped subtitle cue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds, always > start
    pub end: f64,
    /// Source-language text (multi-line cues joined with '\n')
    pub text: String,
    /// Optional target-language translation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

impl SubtitleSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            translation: None,
        }
    }

    /// Whether this segment overlaps the half-open window `[start, end)`.
    /// A segment starting exactly at the window end does not overlap.
    pub fn overlaps(&self, window: &TimeRange) -> bool {
        self.start < window.end && self.end > window.start
    }
}

/// Requested time window within an episode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() || start < 0.0 || end <= start {
            return Err(Error::InvalidInput(format!(
                "Invalid time range: {}..{}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }
}

/// Parse an SRT document into ordered segments.
///
/// Cue index lines are accepted but not preserved; ordering is by start
/// time, with the original relative order kept for equal start times.
pub fn parse(document: &str) -> Result<Vec<SubtitleSegment>> {
    let normalized = document.replace("\r\n", "\n");
    let mut segments = Vec::new();

    for block in normalized.split("\n\n") {
        let mut lines = block.lines().filter(|l| !l.trim().is_empty()).peekable();

        // Optional numeric index line
        if let Some(first) = lines.peek() {
            if first.trim().chars().all(|c| c.is_ascii_digit()) {
                lines.next();
            }
        }

        let Some(timing) = lines.next() else {
            continue; // blank block
        };
        let (start_raw, end_raw) = timing
            .split_once("-->")
            .ok_or_else(|| Error::Subtitle(format!("Missing '-->' in cue timing: {:?}", timing)))?;
        let start = parse_timestamp(start_raw)?;
        let end = parse_timestamp(end_raw)?;
        if end <= start {
            return Err(Error::Subtitle(format!(
                "Cue ends before it starts: {:?}",
                timing.trim()
            )));
        }

        let text = lines.collect::<Vec<_>>().join("\n");
        if text.is_empty() {
            continue; // cue with timing but no text carries nothing to classify
        }
        segments.push(SubtitleSegment::new(start, end, text));
    }

    // Stable: preserves source order for overlapping cues with equal starts
    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    Ok(segments)
}

/// Serialize segments back to SRT.
///
/// Cues are renumbered sequentially. A stored translation is emitted as an
/// extra cue line after the source text.
pub fn write(segments: &[SubtitleSegment]) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n",
            i + 1,
            format_timestamp(segment.start),
            format_timestamp(segment.end),
            segment.text
        ));
        if let Some(translation) = &segment.translation {
            out.push_str(translation);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// Restrict segments to the requested window, inclusive of partial overlap
pub fn window(segments: &[SubtitleSegment], range: &TimeRange) -> Vec<SubtitleSegment> {
    segments
        .iter()
        .filter(|s| s.overlaps(range))
        .cloned()
        .collect()
}
