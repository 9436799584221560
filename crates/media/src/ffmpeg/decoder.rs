//! Streaming RGB24 decoder over an `ffmpeg` child process.

use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};

use gymkhana_common::error::{GymkhanaError, GymkhanaResult};
use gymkhana_sync_model::metadata::SourceMetadata;
use gymkhana_sync_model::timeline::frame_time;

use crate::frame::{byte_len, Frame};
use crate::source::VideoSource;

/// A video file decoded by a long-lived `ffmpeg` process.
///
/// Sequential reads consume the pipe frame by frame. Any other index
/// restarts the process at that frame.
pub struct FfmpegSource {
    metadata: SourceMetadata,
    ffmpeg_bin: String,
    stream: Option<DecodeStream>,
    open: bool,
}

struct DecodeStream {
    child: Child,
    stdout: ChildStdout,
    /// Index of the next frame waiting in the pipe.
    next_index: u64,
}

impl Drop for DecodeStream {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl FfmpegSource {
    pub fn new(metadata: SourceMetadata, ffmpeg_bin: impl Into<String>) -> Self {
        Self {
            metadata,
            ffmpeg_bin: ffmpeg_bin.into(),
            stream: None,
            open: true,
        }
    }

    fn spawn_at(&self, index: u64) -> GymkhanaResult<DecodeStream> {
        let args = decode_args(&self.metadata, index);
        tracing::debug!(
            path = %self.metadata.path.display(),
            index,
            "Starting ffmpeg decoder"
        );
        let mut child = Command::new(&self.ffmpeg_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                GymkhanaError::decode_failed(format!("failed to start {}: {e}", self.ffmpeg_bin))
            })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GymkhanaError::decode_failed("failed to capture ffmpeg stdout"))?;
        Ok(DecodeStream {
            child,
            stdout,
            next_index: index,
        })
    }
}

impl VideoSource for FfmpegSource {
    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    fn read_frame(&mut self, index: u64) -> GymkhanaResult<Frame> {
        if !self.open {
            return Err(GymkhanaError::decode_failed(format!(
                "{} is closed",
                self.metadata.display_name()
            )));
        }
        if index >= self.metadata.total_frames {
            return Err(GymkhanaError::decode_failed(format!(
                "frame {index} is past the end of {} ({} frames)",
                self.metadata.display_name(),
                self.metadata.total_frames
            )));
        }

        let reuse = matches!(&self.stream, Some(s) if s.next_index == index);
        if !reuse {
            self.stream = None;
            self.stream = Some(self.spawn_at(index)?);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(GymkhanaError::decode_failed("decoder is not running"));
        };

        let mut buf = vec![0u8; byte_len(self.metadata.width, self.metadata.height)];
        if let Err(e) = stream.stdout.read_exact(&mut buf) {
            self.stream = None;
            return Err(GymkhanaError::decode_failed(format!(
                "no frame {index} from {}: {e}",
                self.metadata.display_name()
            )));
        }
        stream.next_index += 1;

        Frame::new(self.metadata.width, self.metadata.height, buf)
    }

    fn close(&mut self) {
        self.stream = None;
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Arguments that make ffmpeg emit RGB24 frames starting at `index`.
///
/// The seek point sits half a frame before the target so that timestamp
/// rounding cannot skip it; input seeking then discards everything before
/// that point.
pub fn decode_args(metadata: &SourceMetadata, index: u64) -> Vec<String> {
    let half_frame = frame_time(1, metadata.fps) / 2.0;
    let seek = (frame_time(index, metadata.fps) - half_frame).max(0.0);
    let mut args = vec!["-v".to_string(), "error".to_string(), "-nostdin".to_string()];
    if seek > 0.0 {
        args.push("-ss".to_string());
        args.push(format!("{seek:.6}"));
    }
    args.push("-i".to_string());
    args.push(metadata.path.to_string_lossy().into_owned());
    args.extend(
        [
            "-map", "0:v:0", "-an", "-sn", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args
}
