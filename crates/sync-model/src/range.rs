//! Export time ranges.

use std::fmt;
use std::str::FromStr;

use gymkhana_common::error::{GymkhanaError, GymkhanaResult};
use serde::{Deserialize, Serialize};

use crate::metadata::SourceMetadata;
use crate::timeline::export_frame_span;

/// A half-open time span `[start, end)` on the primary timeline, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExportRange {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl ExportRange {
    /// Build a range, rejecting non-finite bounds, negative starts, and
    /// `start >= end`.
    pub fn new(start_secs: f64, end_secs: f64) -> GymkhanaResult<Self> {
        if !start_secs.is_finite() || !end_secs.is_finite() {
            return Err(GymkhanaError::invalid_range(
                "start and end time must be finite",
            ));
        }
        if start_secs < 0.0 {
            return Err(GymkhanaError::invalid_range(format!(
                "start time {start_secs:.3}s is negative"
            )));
        }
        if start_secs >= end_secs {
            return Err(GymkhanaError::invalid_range(format!(
                "start time {start_secs:.3}s must be less than end time {end_secs:.3}s"
            )));
        }
        Ok(Self {
            start_secs,
            end_secs,
        })
    }

    /// A window of `radius_secs` either side of `center_secs`, trimmed to
    /// `[0, duration_secs]`.
    pub fn around(center_secs: f64, radius_secs: f64, duration_secs: f64) -> GymkhanaResult<Self> {
        let start = (center_secs - radius_secs).max(0.0);
        let end = (center_secs + radius_secs).min(duration_secs);
        Self::new(start, end)
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// Check the range against the primary source it will be cut from and
    /// return the number of primary frames it covers.
    pub fn validate_against(&self, primary: &SourceMetadata) -> GymkhanaResult<u64> {
        Self::new(self.start_secs, self.end_secs)?;
        if !primary.is_playable() {
            return Err(GymkhanaError::invalid_range(format!(
                "primary source {} has no usable frame rate",
                primary.display_name()
            )));
        }
        let duration = primary.duration_secs();
        if self.end_secs > duration {
            return Err(GymkhanaError::invalid_range(format!(
                "end time {:.3}s exceeds video duration ({duration:.1}s)",
                self.end_secs
            )));
        }
        let span = export_frame_span(
            self.start_secs,
            self.end_secs,
            primary.fps,
            primary.total_frames,
        );
        let frames = span.end - span.start;
        if frames == 0 {
            return Err(GymkhanaError::invalid_range(format!(
                "range {self} covers no whole primary frame"
            )));
        }
        Ok(frames)
    }
}

impl fmt::Display for ExportRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}s-{:.1}s", self.start_secs, self.end_secs)
    }
}

/// Fixed ranges offered as one-click shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuickRange {
    FirstTen,
    TenToThirty,
    ThirtyToSixty,
}

impl QuickRange {
    pub fn range(&self) -> ExportRange {
        let (start_secs, end_secs) = match self {
            QuickRange::FirstTen => (0.0, 10.0),
            QuickRange::TenToThirty => (10.0, 30.0),
            QuickRange::ThirtyToSixty => (30.0, 60.0),
        };
        ExportRange {
            start_secs,
            end_secs,
        }
    }
}

impl FromStr for QuickRange {
    type Err = GymkhanaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0-10" => Ok(QuickRange::FirstTen),
            "10-30" => Ok(QuickRange::TenToThirty),
            "30-60" => Ok(QuickRange::ThirtyToSixty),
            other => Err(GymkhanaError::invalid_range(format!(
                "unknown quick range '{other}'; use 0-10, 10-30, or 30-60"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn primary(fps: f64, total_frames: u64) -> SourceMetadata {
        SourceMetadata {
            path: PathBuf::from("main.mp4"),
            fps,
            total_frames,
            width: 640,
            height: 360,
        }
    }

    #[test]
    fn test_new_rejects_empty_and_reversed() {
        assert!(ExportRange::new(5.0, 5.0).is_err());
        assert!(ExportRange::new(6.0, 5.0).is_err());
        assert!(ExportRange::new(-1.0, 5.0).is_err());
        assert!(ExportRange::new(0.0, f64::NAN).is_err());
        assert!(ExportRange::new(0.0, 0.1).is_ok());
    }

    #[test]
    fn test_validate_against_duration() {
        let main = primary(30.0, 300);
        assert_eq!(ExportRange::new(2.0, 4.0).unwrap().validate_against(&main).unwrap(), 60);
        let err = ExportRange::new(2.0, 10.5)
            .unwrap()
            .validate_against(&main)
            .unwrap_err();
        assert!(err.to_string().contains("exceeds video duration"));
    }

    #[test]
    fn test_validate_rejects_sub_frame_range() {
        let main = primary(30.0, 300);
        let range = ExportRange::new(2.0, 2.01).unwrap();
        assert!(range.validate_against(&main).is_err());
    }

    #[test]
    fn test_validate_rejects_unplayable_primary() {
        let main = primary(0.0, 300);
        assert!(ExportRange::new(0.0, 1.0).unwrap().validate_against(&main).is_err());
    }

    #[test]
    fn test_around_trims_to_bounds() {
        let range = ExportRange::around(3.0, 5.0, 20.0).unwrap();
        assert_eq!(range.start_secs, 0.0);
        assert_eq!(range.end_secs, 8.0);

        let tail = ExportRange::around(18.0, 5.0, 20.0).unwrap();
        assert_eq!(tail.start_secs, 13.0);
        assert_eq!(tail.end_secs, 20.0);
    }

    #[test]
    fn test_quick_ranges() {
        let r: QuickRange = "10-30".parse().unwrap();
        assert_eq!(r.range().start_secs, 10.0);
        assert_eq!(r.range().end_secs, 30.0);
        assert!("5-6".parse::<QuickRange>().is_err());
    }
}
