//! System `ffmpeg`/`ffprobe` backend.

pub mod decoder;
pub mod encoder;
pub mod probe;

use std::path::Path;
use std::process::Command;

use gymkhana_common::config::{AppConfig, ExportDefaults, MediaConfig};
use gymkhana_common::error::GymkhanaResult;

use crate::backend::MediaBackend;
use crate::sink::{FrameSink, SinkConfig};
use crate::source::VideoSource;

pub use decoder::FfmpegSource;
pub use encoder::FfmpegSink;
pub use probe::{parse_ff_ratio, probe};

/// Media backend that shells out to the ffmpeg binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    media: MediaConfig,
    encoder: ExportDefaults,
}

impl FfmpegBackend {
    pub fn new(media: MediaConfig, encoder: ExportDefaults) -> Self {
        Self { media, encoder }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.media.clone(), config.export.clone())
    }

    pub fn ffmpeg_bin(&self) -> &str {
        &self.media.ffmpeg_bin
    }

    pub fn ffprobe_bin(&self) -> &str {
        &self.media.ffprobe_bin
    }
}

impl MediaBackend for FfmpegBackend {
    fn open_source(&self, path: &Path) -> GymkhanaResult<Box<dyn VideoSource>> {
        let metadata = probe(&self.media.ffprobe_bin, path)?;
        tracing::info!(
            path = %path.display(),
            fps = metadata.fps,
            frames = metadata.total_frames,
            width = metadata.width,
            height = metadata.height,
            "Opened video"
        );
        Ok(Box::new(FfmpegSource::new(
            metadata,
            self.media.ffmpeg_bin.clone(),
        )))
    }

    fn create_sink(&self, config: &SinkConfig) -> GymkhanaResult<Box<dyn FrameSink>> {
        let sink = FfmpegSink::create(&self.media.ffmpeg_bin, config, &self.encoder)?;
        Ok(Box::new(sink))
    }

    fn is_available(&self) -> bool {
        command_exists(&self.media.ffmpeg_bin) && command_exists(&self.media.ffprobe_bin)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Whether `binary` resolves on `PATH` (or is an existing path).
pub fn command_exists(binary: &str) -> bool {
    if binary.contains('/') {
        return Path::new(binary).is_file();
    }
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
