//! Timeline mapping: from a playback position to per-source frame indices.
//!
//! The primary source drives the timeline. The shadow source is addressed
//! in the time domain (`primary_time + offset`), so sources with different
//! frame rates stay aligned whatever the offset. Every lookup clamps into
//! `[0, total_frames - 1]`, which holds the first/last frame at the
//! extremes instead of wrapping or failing.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::metadata::SourceMetadata;

/// Frame indices resolved for one timeline position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramePair {
    pub primary: u64,
    pub shadow: u64,
}

/// Frame of the primary source shown at `time_secs`.
pub fn primary_frame_index(time_secs: f64, fps: f64, total_frames: u64) -> u64 {
    time_to_index(time_secs, fps, total_frames)
}

/// Frame of the shadow source paired with primary time `primary_time_secs`.
pub fn shadow_frame_index(
    primary_time_secs: f64,
    offset_secs: f64,
    shadow_fps: f64,
    shadow_total_frames: u64,
) -> u64 {
    time_to_index(primary_time_secs + offset_secs, shadow_fps, shadow_total_frames)
}

/// Shadow index before clamping. May be negative or past the end.
pub fn unclamped_shadow_index(primary_time_secs: f64, offset_secs: f64, shadow_fps: f64) -> i64 {
    ((primary_time_secs + offset_secs) * shadow_fps).floor() as i64
}

/// Presentation time of `index` at `fps`, or zero without a usable rate.
pub fn frame_time(index: u64, fps: f64) -> f64 {
    if fps.is_finite() && fps > 0.0 {
        index as f64 / fps
    } else {
        0.0
    }
}

/// Resolve both sources for a primary frame index.
///
/// The primary index is clamped first, then converted to time and pushed
/// through [`shadow_frame_index`].
pub fn resolve_pair(
    primary_index: u64,
    primary: &SourceMetadata,
    shadow: &SourceMetadata,
    offset_secs: f64,
) -> FramePair {
    let primary_index = primary_index.min(primary.last_frame());
    let time = frame_time(primary_index, primary.fps);
    FramePair {
        primary: primary_index,
        shadow: shadow_frame_index(time, offset_secs, shadow.fps, shadow.total_frames),
    }
}

/// Primary frames covered by `[start_secs, end_secs)`, with both ends
/// clamped like [`primary_frame_index`].
pub fn export_frame_span(start_secs: f64, end_secs: f64, fps: f64, total_frames: u64) -> Range<u64> {
    let start = primary_frame_index(start_secs, fps, total_frames);
    let end = primary_frame_index(end_secs, fps, total_frames);
    start..end.max(start)
}

/// Shadow index paired with primary frame `frame` during export.
///
/// Export fixes the alignment once at the start of the range and then
/// advances both streams frame-for-frame.
pub fn lockstep_shadow_index(start_primary: u64, start_shadow: u64, frame: u64) -> u64 {
    start_shadow + frame.saturating_sub(start_primary)
}

/// Difference, in shadow frames, between the lockstep index used by export
/// and the time-derived index used by interactive playback.
pub fn lockstep_drift_frames(
    lockstep_index: u64,
    primary_index: u64,
    primary_fps: f64,
    offset_secs: f64,
    shadow_fps: f64,
) -> i64 {
    let time = frame_time(primary_index, primary_fps);
    lockstep_index as i64 - unclamped_shadow_index(time, offset_secs, shadow_fps)
}

fn time_to_index(time_secs: f64, fps: f64, total_frames: u64) -> u64 {
    if total_frames == 0 || !fps.is_finite() || fps <= 0.0 {
        return 0;
    }
    let raw = (time_secs * fps).floor();
    let last = total_frames - 1;
    if raw.is_nan() || raw <= 0.0 {
        0
    } else if raw >= last as f64 {
        last
    } else {
        raw as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn meta(fps: f64, total_frames: u64) -> SourceMetadata {
        SourceMetadata {
            path: PathBuf::from("clip.mp4"),
            fps,
            total_frames,
            width: 64,
            height: 36,
        }
    }

    #[test]
    fn test_primary_index_floors() {
        assert_eq!(primary_frame_index(0.0, 30.0, 300), 0);
        assert_eq!(primary_frame_index(1.0, 30.0, 300), 30);
        assert_eq!(primary_frame_index(1.099, 30.0, 300), 32);
    }

    #[test]
    fn test_primary_index_clamps_both_ends() {
        assert_eq!(primary_frame_index(-4.0, 30.0, 300), 0);
        assert_eq!(primary_frame_index(10.0, 30.0, 300), 299);
        assert_eq!(primary_frame_index(f64::INFINITY, 30.0, 300), 299);
        assert_eq!(primary_frame_index(f64::NAN, 30.0, 300), 0);
    }

    #[test]
    fn test_unusable_inputs_map_to_zero() {
        assert_eq!(primary_frame_index(3.0, 0.0, 300), 0);
        assert_eq!(primary_frame_index(3.0, -30.0, 300), 0);
        assert_eq!(primary_frame_index(3.0, 30.0, 0), 0);
    }

    #[test]
    fn test_shadow_index_applies_offset_in_time() {
        // 2s on the primary plus 0.5s offset = 2.5s into a 25fps shadow.
        assert_eq!(shadow_frame_index(2.0, 0.5, 25.0, 250), 62);
        // Negative offset before the shadow start holds frame 0.
        assert_eq!(shadow_frame_index(1.0, -3.0, 25.0, 250), 0);
        // Past the shadow end holds the last frame.
        assert_eq!(shadow_frame_index(9.0, 5.0, 25.0, 250), 249);
    }

    #[test]
    fn test_resolve_pair_mixed_rates() {
        let primary = meta(30.0, 300);
        let shadow = meta(25.0, 250);
        let pair = resolve_pair(60, &primary, &shadow, 0.0);
        assert_eq!(pair, FramePair { primary: 60, shadow: 50 });

        let clamped = resolve_pair(10_000, &primary, &shadow, 0.0);
        assert_eq!(clamped.primary, 299);
    }

    #[test]
    fn test_export_span() {
        assert_eq!(export_frame_span(2.0, 4.0, 30.0, 300), 60..120);
        // The end clamps to the last frame like any other lookup.
        assert_eq!(export_frame_span(9.0, 10.0, 30.0, 300), 270..299);
        assert!(export_frame_span(5.0, 5.0, 30.0, 300).is_empty());
    }

    #[test]
    fn test_lockstep_and_drift() {
        assert_eq!(lockstep_shadow_index(60, 50, 60), 50);
        assert_eq!(lockstep_shadow_index(60, 50, 119), 109);

        // 30fps vs 25fps, aligned at primary 60 / shadow 50: thirty
        // lockstep frames later the shadow sits at 80 while time says 75.
        let drift = lockstep_drift_frames(80, 90, 30.0, 0.0, 25.0);
        assert_eq!(drift, 80 - 75);
    }
}
