//! Source metadata and session slots.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which of the two compared videos a source belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    /// The reference video driving the timeline.
    Primary,
    /// The video blended over the primary.
    Shadow,
}

impl Slot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Primary => "primary",
            Slot::Shadow => "shadow",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a video source reports once opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// File the source was opened from.
    pub path: PathBuf,

    /// Frames per second. Zero or negative means the container did not
    /// report a usable rate.
    pub fps: f64,

    /// Total number of decodable frames.
    pub total_frames: u64,

    /// Native frame width in pixels.
    pub width: u32,

    /// Native frame height in pixels.
    pub height: u32,
}

impl SourceMetadata {
    /// Duration in seconds (`total_frames / fps`), or zero without a usable fps.
    pub fn duration_secs(&self) -> f64 {
        if self.has_usable_fps() {
            self.total_frames as f64 / self.fps
        } else {
            0.0
        }
    }

    pub fn has_usable_fps(&self) -> bool {
        self.fps.is_finite() && self.fps > 0.0
    }

    /// Whether index/time conversions are meaningful for this source.
    pub fn is_playable(&self) -> bool {
        self.has_usable_fps() && self.total_frames > 0
    }

    /// Index of the last decodable frame.
    pub fn last_frame(&self) -> u64 {
        self.total_frames.saturating_sub(1)
    }

    /// File name for display, falling back to the full path.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(fps: f64, total_frames: u64) -> SourceMetadata {
        SourceMetadata {
            path: PathBuf::from("/videos/run.mp4"),
            fps,
            total_frames,
            width: 1280,
            height: 720,
        }
    }

    #[test]
    fn test_duration() {
        assert!((meta(30.0, 300).duration_secs() - 10.0).abs() < 1e-9);
        assert_eq!(meta(0.0, 300).duration_secs(), 0.0);
    }

    #[test]
    fn test_playable_requires_fps_and_frames() {
        assert!(meta(25.0, 10).is_playable());
        assert!(!meta(0.0, 10).is_playable());
        assert!(!meta(-1.0, 10).is_playable());
        assert!(!meta(f64::NAN, 10).is_playable());
        assert!(!meta(25.0, 0).is_playable());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(meta(30.0, 1).display_name(), "run.mp4");
    }

    #[test]
    fn test_slot_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Slot::Shadow).unwrap(), "\"shadow\"");
    }
}
