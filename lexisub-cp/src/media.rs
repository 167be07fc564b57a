//! Media library resolution
//!
//! Maps a video reference (an episode identifier or relative path) to files
//! on disk under the configured media root: the video itself and, when one
//! exists alongside it, an SRT subtitle document with the same stem.

use lexisub_common::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "avi", "mov"];

/// Locates video and subtitle files under the media root
pub struct MediaResolver {
    root: PathBuf,
}

impl MediaResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a video reference to a file on disk.
    ///
    /// A reference with an extension is treated as a path relative to the
    /// media root; a bare reference is matched against file stems anywhere
    /// under the root, first match in walk order wins.
    pub fn resolve_video(&self, video_ref: &str) -> Result<PathBuf> {
        // Reject traversal out of the media root
        if video_ref.contains("..") || Path::new(video_ref).is_absolute() {
            return Err(Error::InvalidInput(format!(
                "Invalid video reference: {}",
                video_ref
            )));
        }

        let direct = self.root.join(video_ref);
        if direct.is_file() && is_video(&direct) {
            return Ok(direct);
        }

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !is_video(path) {
                continue;
            }
            let stem_matches = path
                .file_stem()
                .map(|s| s.to_string_lossy() == video_ref)
                .unwrap_or(false);
            if stem_matches {
                debug!(video_ref = %video_ref, path = %path.display(), "Resolved video");
                return Ok(path.to_path_buf());
            }
        }

        Err(Error::NotFound(format!("Video not found: {}", video_ref)))
    }

    /// The SRT document sitting next to a video, if present
    pub fn subtitle_for(&self, video: &Path) -> Option<PathBuf> {
        let candidate = video.with_extension("srt");
        candidate.is_file().then_some(candidate)
    }
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_ascii_lowercase();
            VIDEO_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn library() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("s01")).unwrap();
        fs::write(dir.path().join("s01/e01.mp4"), b"").unwrap();
        fs::write(dir.path().join("s01/e01.srt"), b"").unwrap();
        fs::write(dir.path().join("s01/e02.mkv"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        dir
    }

    #[test]
    fn resolves_by_relative_path() {
        let dir = library();
        let resolver = MediaResolver::new(dir.path());
        let video = resolver.resolve_video("s01/e01.mp4").unwrap();
        assert_eq!(video, dir.path().join("s01/e01.mp4"));
    }

    #[test]
    fn resolves_by_stem() {
        let dir = library();
        let resolver = MediaResolver::new(dir.path());
        let video = resolver.resolve_video("e02").unwrap();
        assert_eq!(video, dir.path().join("s01/e02.mkv"));
    }

    #[test]
    fn missing_video_is_not_found() {
        let dir = library();
        let resolver = MediaResolver::new(dir.path());
        assert!(matches!(
            resolver.resolve_video("e99").unwrap_err(),
            Error::NotFound(_)
        ));
        // Non-video files never match, even with the right stem
        assert!(resolver.resolve_video("notes").is_err());
    }

    #[test]
    fn rejects_path_traversal() {
        let dir = library();
        let resolver = MediaResolver::new(dir.path());
        assert!(matches!(
            resolver.resolve_video("../outside.mp4").unwrap_err(),
            Error::InvalidInput(_)
        ));
    }

    #[test]
    fn subtitle_lookup_by_stem() {
        let dir = library();
        let resolver = MediaResolver::new(dir.path());
        let e01 = dir.path().join("s01/e01.mp4");
        let e02 = dir.path().join("s01/e02.mkv");
        assert_eq!(resolver.subtitle_for(&e01), Some(dir.path().join("s01/e01.srt")));
        assert_eq!(resolver.subtitle_for(&e02), None);
    }
}
