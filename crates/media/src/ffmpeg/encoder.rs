//! Raw-frame encoder over an `ffmpeg` child process.

use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use gymkhana_common::config::ExportDefaults;
use gymkhana_common::error::{GymkhanaError, GymkhanaResult};

use crate::frame::Frame;
use crate::sink::{check_frame_size, ensure_parent_dir, FrameSink, OutputFormat, SinkConfig};

/// Encodes RGB24 frames piped to `ffmpeg`'s stdin.
pub struct FfmpegSink {
    config: SinkConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
    frames_written: u64,
    /// Set once `finish` or `abort` has dealt with the output file.
    settled: bool,
}

impl FfmpegSink {
    /// Spawn the encoder for `config`.
    pub fn create(
        ffmpeg_bin: &str,
        config: &SinkConfig,
        settings: &ExportDefaults,
    ) -> GymkhanaResult<Self> {
        let format = OutputFormat::from_path(&config.path)?;
        if config.width == 0 || config.height == 0 {
            return Err(GymkhanaError::sink_creation_failed(
                &config.path,
                format!("invalid output size {}x{}", config.width, config.height),
            ));
        }
        if !(config.fps.is_finite() && config.fps > 0.0) {
            return Err(GymkhanaError::sink_creation_failed(
                &config.path,
                format!("invalid output frame rate {}", config.fps),
            ));
        }
        ensure_parent_dir(&config.path)?;

        let args = encode_args(config, format, settings);
        tracing::debug!(args = ?args, "Running ffmpeg encoder");

        let mut child = Command::new(ffmpeg_bin)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                GymkhanaError::sink_creation_failed(
                    &config.path,
                    format!("failed to start {ffmpeg_bin}: {e}"),
                )
            })?;

        let stdin = child.stdin.take();
        let stderr = child.stderr.take();
        let (Some(stdin), Some(stderr)) = (stdin, stderr) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(GymkhanaError::sink_creation_failed(
                &config.path,
                "failed to capture ffmpeg pipes",
            ));
        };

        // ffmpeg blocks once the stderr pipe fills up.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        tracing::info!(
            pid = child.id(),
            path = %config.path.display(),
            format = %format,
            width = config.width,
            height = config.height,
            fps = config.fps,
            "ffmpeg encoder started"
        );

        Ok(Self {
            config: config.clone(),
            child,
            stdin: Some(stdin),
            stderr_task: Some(stderr_task),
            frames_written: 0,
            settled: false,
        })
    }

    fn collect_stderr(&mut self) -> String {
        self.stderr_task
            .take()
            .map(|task| {
                task.join()
                    .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
            })
            .unwrap_or_default()
    }

    fn kill(&mut self) {
        self.stdin = None;
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &Frame) -> GymkhanaResult<()> {
        check_frame_size(&self.config, frame)?;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| GymkhanaError::write_failed("encoder input is closed"))?;
        if let Err(e) = stdin.write_all(&frame.data) {
            self.kill();
            let stderr = self.collect_stderr();
            return Err(GymkhanaError::write_failed(format!(
                "ffmpeg stopped accepting frames after {}: {e}: {}",
                self.frames_written,
                stderr.trim()
            )));
        }
        self.frames_written += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> GymkhanaResult<PathBuf> {
        // Closing stdin signals end of input.
        self.stdin = None;
        let status = self
            .child
            .wait()
            .map_err(|e| GymkhanaError::write_failed(format!("failed to wait on ffmpeg: {e}")))?;
        let stderr = self.collect_stderr();
        self.settled = true;

        if !status.success() {
            remove_partial(&self.config.path);
            return Err(GymkhanaError::write_failed(format!(
                "ffmpeg exited with {status}: {}",
                stderr.trim()
            )));
        }

        tracing::info!(
            path = %self.config.path.display(),
            frames = self.frames_written,
            "ffmpeg encoder finished"
        );
        Ok(self.config.path.clone())
    }

    fn abort(mut self: Box<Self>) {
        self.kill();
        let _ = self.collect_stderr();
        remove_partial(&self.config.path);
        self.settled = true;
        tracing::info!(path = %self.config.path.display(), "ffmpeg encoder aborted");
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.kill();
        let _ = self.collect_stderr();
        remove_partial(&self.config.path);
        tracing::warn!(
            path = %self.config.path.display(),
            frames = self.frames_written,
            "ffmpeg encoder dropped before finishing"
        );
    }
}

/// Full argument list for encoding raw RGB24 input described by `config`.
pub fn encode_args(config: &SinkConfig, format: OutputFormat, settings: &ExportDefaults) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "-s".to_string(),
        format!("{}x{}", config.width, config.height),
        "-r".to_string(),
        format!("{}", config.fps),
        "-i".to_string(),
        "pipe:0".to_string(),
        "-an".to_string(),
    ];
    args.extend(format.codec_args(config.width, config.height, settings));
    args.push(config.path.to_string_lossy().into_owned());
    args
}

fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial output"),
    }
}
