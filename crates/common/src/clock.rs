//! Clock and pacing utilities for playback and export.
//!
//! - Tick intervals derived from a frame rate and speed multiplier
//! - ETA estimation for long-running jobs
//! - Wall-clock stamps and human-readable clock strings

use std::time::Duration;

/// Interval between two playback ticks at `fps` scaled by `speed`.
///
/// Returns `None` when the product is not a positive finite rate.
pub fn frame_interval(fps: f64, speed: f64) -> Option<Duration> {
    let rate = fps * speed;
    if !rate.is_finite() || rate <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / rate).ok()
}

/// Estimated seconds remaining given elapsed time and completed fraction.
pub fn eta_secs(elapsed_secs: f64, fraction: f64) -> f64 {
    if fraction <= 0.0 || !fraction.is_finite() {
        return 0.0;
    }
    ((elapsed_secs / fraction.min(1.0)) - elapsed_secs).max(0.0)
}

/// Current wall-clock time as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Format seconds as `mm:ss.s` (minutes grow past 59 rather than rolling
/// into hours).
pub fn format_clock(secs: f64) -> String {
    let secs = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
    let tenths = (secs * 10.0).round() as u64;
    let minutes = tenths / 600;
    let rem = tenths % 600;
    format!("{:02}:{:02}.{}", minutes, rem / 10, rem % 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_interval_scales_with_speed() {
        let normal = frame_interval(30.0, 1.0).unwrap();
        let double = frame_interval(30.0, 2.0).unwrap();
        assert!((normal.as_secs_f64() - 1.0 / 30.0).abs() < 1e-9);
        assert!((double.as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_frame_interval_rejects_unusable_rates() {
        assert!(frame_interval(0.0, 1.0).is_none());
        assert!(frame_interval(30.0, 0.0).is_none());
        assert!(frame_interval(f64::NAN, 1.0).is_none());
    }

    #[test]
    fn test_eta() {
        assert_eq!(eta_secs(10.0, 0.0), 0.0);
        assert!((eta_secs(10.0, 0.5) - 10.0).abs() < 1e-9);
        assert_eq!(eta_secs(10.0, 1.0), 0.0);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "00:00.0");
        assert_eq!(format_clock(65.25), "01:05.3");
        assert_eq!(format_clock(-3.0), "00:00.0");
    }

    #[test]
    fn test_now_rfc3339_parses_back() {
        let stamp = now_rfc3339();
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());
    }
}
