//! Video outputs.

use std::path::{Path, PathBuf};

use gymkhana_common::config::ExportDefaults;
use gymkhana_common::error::{GymkhanaError, GymkhanaResult};
use serde::{Deserialize, Serialize};

use crate::frame::Frame;

/// Parameters for a new output file.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkConfig {
    /// Destination file. The extension selects the container and codec.
    pub path: PathBuf,

    /// Output frame rate.
    pub fps: f64,

    pub width: u32,
    pub height: u32,
}

/// An open video output accepting frames of one fixed size.
pub trait FrameSink: Send {
    /// Append one frame. Its size must match the sink's configured size.
    fn write_frame(&mut self, frame: &Frame) -> GymkhanaResult<()>;

    /// Flush and close the output, returning the written path.
    fn finish(self: Box<Self>) -> GymkhanaResult<PathBuf>;

    /// Stop writing and remove whatever was partially written.
    fn abort(self: Box<Self>);

    /// Number of frames accepted so far.
    fn frames_written(&self) -> u64;
}

/// Container chosen from the output file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Mp4,
    Mov,
    M4v,
    Mkv,
    Avi,
    Webm,
}

impl OutputFormat {
    /// Detect the format from `path`'s extension (case-insensitive).
    pub fn from_path(path: &Path) -> GymkhanaResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "mp4" => Ok(Self::Mp4),
            "mov" => Ok(Self::Mov),
            "m4v" => Ok(Self::M4v),
            "mkv" => Ok(Self::Mkv),
            "avi" => Ok(Self::Avi),
            "webm" => Ok(Self::Webm),
            "" => Err(GymkhanaError::sink_creation_failed(
                path,
                "output path has no extension",
            )),
            other => Err(GymkhanaError::sink_creation_failed(
                path,
                format!("unsupported output extension '.{other}'"),
            )),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
            Self::M4v => "m4v",
            Self::Mkv => "mkv",
            Self::Avi => "avi",
            Self::Webm => "webm",
        }
    }

    /// Encoder arguments for frames of `width`x`height`.
    pub fn codec_args(&self, width: u32, height: u32, settings: &ExportDefaults) -> Vec<String> {
        let crf = settings.crf.to_string();
        match self {
            Self::Mp4 | Self::Mov | Self::M4v | Self::Mkv => {
                // 4:2:0 subsampling needs even dimensions.
                let pix_fmt = if width % 2 == 0 && height % 2 == 0 {
                    "yuv420p"
                } else {
                    "yuv444p"
                };
                let mut args = vec![
                    "-c:v".to_string(),
                    "libx264".to_string(),
                    "-preset".to_string(),
                    settings.x264_preset.clone(),
                    "-crf".to_string(),
                    crf,
                    "-pix_fmt".to_string(),
                    pix_fmt.to_string(),
                ];
                if *self != Self::Mkv {
                    args.push("-movflags".to_string());
                    args.push("+faststart".to_string());
                }
                args
            }
            Self::Avi => vec![
                "-c:v".to_string(),
                "mpeg4".to_string(),
                "-q:v".to_string(),
                "3".to_string(),
                "-pix_fmt".to_string(),
                "yuv420p".to_string(),
            ],
            Self::Webm => vec![
                "-c:v".to_string(),
                "libvpx-vp9".to_string(),
                "-crf".to_string(),
                crf,
                "-b:v".to_string(),
                "0".to_string(),
                "-pix_fmt".to_string(),
                "yuv420p".to_string(),
            ],
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// `path` unchanged if it has an extension, else with `default_ext` added.
pub fn with_default_extension(path: &Path, default_ext: &str) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(default_ext.trim_start_matches('.'))
    }
}

/// Create the parent directory of `path` if it is missing.
pub fn ensure_parent_dir(path: &Path) -> GymkhanaResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            GymkhanaError::sink_creation_failed(
                path,
                format!("cannot create directory '{}': {e}", parent.display()),
            )
        })?;
    }
    Ok(())
}

/// Fail with `WriteFailed` unless `frame` matches the configured size.
pub fn check_frame_size(config: &SinkConfig, frame: &Frame) -> GymkhanaResult<()> {
    if frame.dimensions() != (config.width, config.height) {
        return Err(GymkhanaError::write_failed(format!(
            "frame is {}x{}, output expects {}x{}",
            frame.width, frame.height, config.width, config.height
        )));
    }
    Ok(())
}
