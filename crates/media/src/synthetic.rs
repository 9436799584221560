//! In-memory backend for tests and dry runs.
//!
//! Videos are registered by path and produce deterministic solid-colour
//! frames: red encodes `index % 256`, green the video's seed, blue
//! `index / 256`. Sinks record every written frame so tests can compare
//! output against expectations without ffmpeg.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use gymkhana_common::error::{GymkhanaError, GymkhanaResult};
use gymkhana_sync_model::metadata::SourceMetadata;

use crate::backend::MediaBackend;
use crate::frame::Frame;
use crate::sink::{check_frame_size, FrameSink, OutputFormat, SinkConfig};
use crate::source::VideoSource;

/// Description of a generated video.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticVideo {
    pub fps: f64,
    pub total_frames: u64,
    pub width: u32,
    pub height: u32,

    /// Distinguishes videos with otherwise identical frames.
    pub seed: u8,

    /// Indices whose reads fail with `DecodeFailed`.
    pub unreadable: BTreeSet<u64>,
}

impl SyntheticVideo {
    pub fn new(fps: f64, total_frames: u64, width: u32, height: u32) -> Self {
        Self {
            fps,
            total_frames,
            width,
            height,
            seed: 0,
            unreadable: BTreeSet::new(),
        }
    }

    pub fn with_seed(mut self, seed: u8) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_unreadable_frames(mut self, frames: impl IntoIterator<Item = u64>) -> Self {
        self.unreadable.extend(frames);
        self
    }

    pub fn metadata(&self, path: &Path) -> SourceMetadata {
        SourceMetadata {
            path: path.to_path_buf(),
            fps: self.fps,
            total_frames: self.total_frames,
            width: self.width,
            height: self.height,
        }
    }

    /// The frame this video yields at `index`, ignoring `unreadable`.
    pub fn frame(&self, index: u64) -> Frame {
        let rgb = [(index % 256) as u8, self.seed, ((index / 256) % 256) as u8];
        Frame::filled(self.width, self.height, rgb)
    }
}

/// What a synthetic sink received.
#[derive(Debug, Clone, Default)]
pub struct RecordedOutput {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub frames: Vec<Frame>,
    pub finished: bool,
    pub aborted: bool,
}

#[derive(Default)]
struct SharedState {
    outputs: Mutex<HashMap<PathBuf, RecordedOutput>>,
    reads_held: AtomicBool,
    sources_opened: AtomicUsize,
    frames_read: AtomicUsize,
}

/// Backend serving registered [`SyntheticVideo`]s.
#[derive(Default)]
pub struct SyntheticBackend {
    videos: Mutex<HashMap<PathBuf, SyntheticVideo>>,
    state: Arc<SharedState>,
    fail_sink_creation: AtomicBool,
    fail_writes_after: Mutex<Option<u64>>,
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video(self, path: impl Into<PathBuf>, video: SyntheticVideo) -> Self {
        self.add_video(path, video);
        self
    }

    pub fn add_video(&self, path: impl Into<PathBuf>, video: SyntheticVideo) {
        lock(&self.videos).insert(path.into(), video);
    }

    pub fn video(&self, path: &Path) -> Option<SyntheticVideo> {
        lock(&self.videos).get(path).cloned()
    }

    /// Make every later `create_sink` call fail.
    pub fn set_fail_sink_creation(&self, fail: bool) {
        self.fail_sink_creation.store(fail, Ordering::SeqCst);
    }

    /// Make sinks created afterwards reject writes once they hold `n` frames.
    pub fn set_fail_writes_after(&self, n: Option<u64>) {
        *lock(&self.fail_writes_after) = n;
    }

    /// Block every `read_frame` call until [`Self::release_reads`].
    pub fn hold_reads(&self) {
        self.state.reads_held.store(true, Ordering::SeqCst);
    }

    pub fn release_reads(&self) {
        self.state.reads_held.store(false, Ordering::SeqCst);
    }

    /// Snapshot of what was written to `path`.
    pub fn output(&self, path: &Path) -> Option<RecordedOutput> {
        lock(&self.state.outputs).get(path).cloned()
    }

    pub fn sinks_created(&self) -> usize {
        lock(&self.state.outputs).len()
    }

    pub fn sources_opened(&self) -> usize {
        self.state.sources_opened.load(Ordering::SeqCst)
    }

    pub fn frames_read(&self) -> usize {
        self.state.frames_read.load(Ordering::SeqCst)
    }
}

impl MediaBackend for SyntheticBackend {
    fn open_source(&self, path: &Path) -> GymkhanaResult<Box<dyn VideoSource>> {
        let video = self
            .video(path)
            .ok_or_else(|| GymkhanaError::cannot_open(path, "no synthetic video registered"))?;
        self.state.sources_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticSource {
            metadata: video.metadata(path),
            video,
            state: Arc::clone(&self.state),
            open: true,
        }))
    }

    fn create_sink(&self, config: &SinkConfig) -> GymkhanaResult<Box<dyn FrameSink>> {
        OutputFormat::from_path(&config.path)?;
        if self.fail_sink_creation.load(Ordering::SeqCst) {
            return Err(GymkhanaError::sink_creation_failed(
                &config.path,
                "synthetic sink creation disabled",
            ));
        }
        lock(&self.state.outputs).insert(
            config.path.clone(),
            RecordedOutput {
                fps: config.fps,
                width: config.width,
                height: config.height,
                ..RecordedOutput::default()
            },
        );
        Ok(Box::new(RecordingSink {
            config: config.clone(),
            state: Arc::clone(&self.state),
            fail_after: *lock(&self.fail_writes_after),
            written: 0,
        }))
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

struct SyntheticSource {
    metadata: SourceMetadata,
    video: SyntheticVideo,
    state: Arc<SharedState>,
    open: bool,
}

impl VideoSource for SyntheticSource {
    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    fn read_frame(&mut self, index: u64) -> GymkhanaResult<Frame> {
        while self.state.reads_held.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
        }
        if !self.open {
            return Err(GymkhanaError::decode_failed("source is closed"));
        }
        self.state.frames_read.fetch_add(1, Ordering::SeqCst);
        if index >= self.video.total_frames {
            return Err(GymkhanaError::decode_failed(format!(
                "frame {index} is past the end ({} frames)",
                self.video.total_frames
            )));
        }
        if self.video.unreadable.contains(&index) {
            return Err(GymkhanaError::decode_failed(format!(
                "frame {index} is corrupt"
            )));
        }
        Ok(self.video.frame(index))
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

struct RecordingSink {
    config: SinkConfig,
    state: Arc<SharedState>,
    fail_after: Option<u64>,
    written: u64,
}

impl RecordingSink {
    fn update(&self, f: impl FnOnce(&mut RecordedOutput)) {
        if let Some(output) = lock(&self.state.outputs).get_mut(&self.config.path) {
            f(output);
        }
    }
}

impl FrameSink for RecordingSink {
    fn write_frame(&mut self, frame: &Frame) -> GymkhanaResult<()> {
        check_frame_size(&self.config, frame)?;
        if self.fail_after.is_some_and(|n| self.written >= n) {
            return Err(GymkhanaError::write_failed(format!(
                "synthetic sink full after {} frames",
                self.written
            )));
        }
        self.update(|out| out.frames.push(frame.clone()));
        self.written += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> GymkhanaResult<PathBuf> {
        self.update(|out| out.finished = true);
        Ok(self.config.path.clone())
    }

    fn abort(self: Box<Self>) {
        self.update(|out| {
            out.frames.clear();
            out.aborted = true;
        });
    }

    fn frames_written(&self) -> u64 {
        self.written
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gymkhana_common::error::ErrorKind;

    fn backend() -> SyntheticBackend {
        SyntheticBackend::new().with_video(
            "a.mp4",
            SyntheticVideo::new(30.0, 300, 4, 2)
                .with_seed(7)
                .with_unreadable_frames([5]),
        )
    }

    #[test]
    fn test_open_reports_metadata() {
        let backend = backend();
        let source = backend.open_source(Path::new("a.mp4")).unwrap();
        let meta = source.metadata();
        assert_eq!(meta.fps, 30.0);
        assert_eq!(meta.total_frames, 300);
        assert_eq!((meta.width, meta.height), (4, 2));
        assert_eq!(backend.sources_opened(), 1);
    }

    #[test]
    fn test_unknown_path_cannot_open() {
        let err = backend().open_source(Path::new("missing.mp4")).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::CannotOpen);
    }

    #[test]
    fn test_frames_encode_index_and_seed() {
        let backend = backend();
        let mut source = backend.open_source(Path::new("a.mp4")).unwrap();
        assert_eq!(source.read_frame(258).unwrap().pixel(0, 0), Some([2, 7, 1]));
        // Random access returns the requested frame regardless of order.
        assert_eq!(source.read_frame(3).unwrap().pixel(3, 1), Some([3, 7, 0]));
        assert_eq!(source.read_frame(5).unwrap_err().kind(), ErrorKind::DecodeFailed);
        assert_eq!(source.read_frame(300).unwrap_err().kind(), ErrorKind::DecodeFailed);

        source.close();
        assert!(source.read_frame(0).is_err());
    }

    #[test]
    fn test_sink_records_and_aborts() {
        let backend = backend();
        let config = SinkConfig {
            path: PathBuf::from("out.mp4"),
            fps: 30.0,
            width: 4,
            height: 2,
        };
        let mut sink = backend.create_sink(&config).unwrap();
        sink.write_frame(&Frame::filled(4, 2, [1, 2, 3])).unwrap();
        assert!(sink.write_frame(&Frame::filled(2, 2, [1, 2, 3])).is_err());
        assert_eq!(sink.frames_written(), 1);
        sink.abort();

        let out = backend.output(Path::new("out.mp4")).unwrap();
        assert!(out.aborted);
        assert!(out.frames.is_empty());
    }

    #[test]
    fn test_write_failure_after_limit() {
        let backend = backend();
        backend.set_fail_writes_after(Some(1));
        let config = SinkConfig {
            path: PathBuf::from("out.mkv"),
            fps: 30.0,
            width: 4,
            height: 2,
        };
        let mut sink = backend.create_sink(&config).unwrap();
        let frame = Frame::filled(4, 2, [0, 0, 0]);
        sink.write_frame(&frame).unwrap();
        assert_eq!(sink.write_frame(&frame).unwrap_err().kind(), ErrorKind::WriteFailed);
    }
}
