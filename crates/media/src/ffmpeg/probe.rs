//! `ffprobe` metadata extraction.

use std::path::Path;
use std::process::Command;

use gymkhana_common::error::{GymkhanaError, GymkhanaResult};
use gymkhana_sync_model::metadata::SourceMetadata;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    tags: Option<ProbeTags>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

impl ProbeStream {
    /// Display rotation in degrees, from the display matrix side data or
    /// the legacy `rotate` tag.
    fn rotation(&self) -> f64 {
        self.side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.trim().parse::<f64>().ok())
            })
            .filter(|r| r.is_finite())
            .unwrap_or(0.0)
    }
}

/// Whether a rotation of `degrees` turns the picture on its side.
fn is_quarter_turn(degrees: f64) -> bool {
    let quarters = (degrees / 90.0).round();
    (degrees - quarters * 90.0).abs() < 1.0 && quarters.rem_euclid(2.0) == 1.0
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Run `ffprobe` on `path` and build its metadata.
pub fn probe(ffprobe_bin: &str, path: &Path) -> GymkhanaResult<SourceMetadata> {
    if !path.is_file() {
        return Err(GymkhanaError::cannot_open(path, "file does not exist"));
    }

    let out = Command::new(ffprobe_bin)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| GymkhanaError::cannot_open(path, format!("failed to run {ffprobe_bin}: {e}")))?;

    if !out.status.success() {
        return Err(GymkhanaError::cannot_open(
            path,
            format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            ),
        ));
    }

    parse_probe_output(path, &out.stdout)
}

/// Build metadata from `ffprobe -print_format json` output.
///
/// Uses the first video stream. The decoder auto-rotates, so a stream
/// rotated by a quarter turn reports its width and height swapped. The frame rate comes from `avg_frame_rate`,
/// then `r_frame_rate`. The frame count comes from `nb_frames`, then from
/// `floor(duration * fps)` with the stream duration preferred over the
/// container's.
pub fn parse_probe_output(path: &Path, json: &[u8]) -> GymkhanaResult<SourceMetadata> {
    let parsed: ProbeOutput = serde_json::from_slice(json)
        .map_err(|e| GymkhanaError::cannot_open(path, format!("unreadable ffprobe output: {e}")))?;

    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| GymkhanaError::cannot_open(path, "no video stream"))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(GymkhanaError::cannot_open(
                path,
                "video stream has no frame size",
            ))
        }
    };
    let (width, height) = if is_quarter_turn(stream.rotation()) {
        (height, width)
    } else {
        (width, height)
    };

    let fps = [&stream.avg_frame_rate, &stream.r_frame_rate]
        .into_iter()
        .filter_map(|r| r.as_deref().and_then(parse_ff_ratio))
        .find(|fps| *fps > 0.0)
        .unwrap_or(0.0);

    let counted = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<u64>().ok())
        .filter(|n| *n > 0);
    let total_frames = match counted {
        Some(n) => n,
        None => {
            let duration = stream
                .duration
                .as_deref()
                .or(parsed.format.as_ref().and_then(|f| f.duration.as_deref()))
                .and_then(|d| d.trim().parse::<f64>().ok())
                .filter(|d| d.is_finite() && *d > 0.0)
                .unwrap_or(0.0);
            (duration * fps).floor() as u64
        }
    };

    Ok(SourceMetadata {
        path: path.to_path_buf(),
        fps,
        total_frames,
        width,
        height,
    })
}

/// Parse an ffmpeg rational such as `30000/1001` (or a bare number).
/// Returns `None` for `0/0` and malformed input.
pub fn parse_ff_ratio(s: &str) -> Option<f64> {
    let s = s.trim();
    let value = match s.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => s.parse::<f64>().ok()?,
    };
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gymkhana_common::error::ErrorKind;

    const SAMPLE: &str = r#"{
        "streams": [
            {"codec_type": "audio", "sample_rate": "48000"},
            {"codec_type": "video", "width": 1280, "height": 720,
             "avg_frame_rate": "30000/1001", "r_frame_rate": "30000/1001",
             "nb_frames": "1798", "duration": "59.993267"}
        ],
        "format": {"duration": "60.010000"}
    }"#;

    #[test]
    fn test_parse_ratio() {
        assert_eq!(parse_ff_ratio("25/1"), Some(25.0));
        assert!((parse_ff_ratio("30000/1001").unwrap() - 29.97).abs() < 0.001);
        assert_eq!(parse_ff_ratio("0/0"), None);
        assert_eq!(parse_ff_ratio("24"), Some(24.0));
        assert_eq!(parse_ff_ratio("abc"), None);
    }

    #[test]
    fn test_parse_probe_picks_video_stream() {
        let meta = parse_probe_output(Path::new("a.mp4"), SAMPLE.as_bytes()).unwrap();
        assert_eq!((meta.width, meta.height), (1280, 720));
        assert_eq!(meta.total_frames, 1798);
        assert!((meta.fps - 29.97).abs() < 0.001);
        assert_eq!(meta.path, Path::new("a.mp4"));
    }

    #[test]
    fn test_rotated_stream_reports_display_size() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 1080, "height": 1920,
                         "avg_frame_rate": "30/1", "nb_frames": "300",
                         "side_data_list": [
                             {"side_data_type": "Display Matrix", "rotation": -90}
                         ]}]
        }"#;
        let meta = parse_probe_output(Path::new("phone.mov"), json.as_bytes()).unwrap();
        assert_eq!((meta.width, meta.height), (1920, 1080));

        let tagged = r#"{
            "streams": [{"codec_type": "video", "width": 1080, "height": 1920,
                         "avg_frame_rate": "30/1", "nb_frames": "300",
                         "tags": {"rotate": "270"}}]
        }"#;
        let meta = parse_probe_output(Path::new("old.mp4"), tagged.as_bytes()).unwrap();
        assert_eq!((meta.width, meta.height), (1920, 1080));
    }

    #[test]
    fn test_half_turn_keeps_stored_size() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 1280, "height": 720,
                         "avg_frame_rate": "25/1", "nb_frames": "50",
                         "side_data_list": [{"rotation": 180}]}]
        }"#;
        let meta = parse_probe_output(Path::new("flip.mp4"), json.as_bytes()).unwrap();
        assert_eq!((meta.width, meta.height), (1280, 720));
        assert!(is_quarter_turn(90.0) && is_quarter_turn(-270.0));
        assert!(!is_quarter_turn(0.0) && !is_quarter_turn(45.0));
    }

    #[test]
    fn test_frame_count_falls_back_to_duration() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 360,
                         "avg_frame_rate": "0/0", "r_frame_rate": "25/1"}],
            "format": {"duration": "10.02"}
        }"#;
        let meta = parse_probe_output(Path::new("b.mkv"), json.as_bytes()).unwrap();
        assert_eq!(meta.fps, 25.0);
        assert_eq!(meta.total_frames, 250);
    }

    #[test]
    fn test_missing_rate_yields_unplayable_metadata() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 8, "height": 8,
                                    "avg_frame_rate": "0/0", "r_frame_rate": "0/0"}]}"#;
        let meta = parse_probe_output(Path::new("c.mp4"), json.as_bytes()).unwrap();
        assert_eq!(meta.fps, 0.0);
        assert_eq!(meta.total_frames, 0);
        assert!(!meta.is_playable());
    }

    #[test]
    fn test_no_video_stream_cannot_open() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        let err = parse_probe_output(Path::new("d.wav"), json.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CannotOpen);

        let err = parse_probe_output(Path::new("e.mp4"), b"not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CannotOpen);
    }

    #[test]
    fn test_missing_file_cannot_open() {
        let path = std::env::temp_dir().join("gymkhana-probe-missing-file.mp4");
        let err = probe("ffprobe", &path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CannotOpen);
    }
}
