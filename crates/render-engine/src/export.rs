//! Background export of a composited time range.

use std::ops::Range;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use gymkhana_common::clock::{eta_secs, now_rfc3339};
use gymkhana_common::error::{ErrorKind, Failure, GymkhanaError, GymkhanaResult};
use gymkhana_media::backend::MediaBackend;
use gymkhana_media::sink::{with_default_extension, FrameSink, SinkConfig};
use gymkhana_media::source::VideoSource;
use gymkhana_sync_model::metadata::SourceMetadata;
use gymkhana_sync_model::range::ExportRange;
use gymkhana_sync_model::timeline::{
    export_frame_span, lockstep_drift_frames, lockstep_shadow_index, shadow_frame_index,
};
use serde::{Deserialize, Serialize};

use crate::compositor::composite;

/// Everything an export needs, captured when it is requested.
///
/// Offset and opacity are snapshots: later changes to the interactive
/// session do not reach a running job.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Primary source as loaded in the session. Drives frame rate, size,
    /// and the timeline.
    pub primary: SourceMetadata,

    /// Shadow source as loaded in the session.
    pub shadow: SourceMetadata,

    /// Time span on the primary timeline.
    pub range: ExportRange,

    /// Shadow offset in seconds.
    pub offset_secs: f64,

    /// Shadow opacity in `[0, 1]`.
    pub opacity: f64,

    /// Output file. An extension-less path gets the default extension.
    pub output_path: PathBuf,
}

/// A validated request, resolved to frame indices.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPlan {
    pub output_path: PathBuf,

    /// Primary frames to write, `[start_frame1, end_frame1)`.
    pub frames: Range<u64>,

    /// Shadow frame paired with `frames.start`.
    pub start_shadow: u64,

    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

impl ExportPlan {
    pub fn total_frames(&self) -> u64 {
        self.frames.end - self.frames.start
    }

    /// Shadow index written alongside primary frame `frame`.
    pub fn shadow_index(&self, frame: u64) -> u64 {
        lockstep_shadow_index(self.frames.start, self.start_shadow, frame)
    }
}

/// Validate `request` against its metadata snapshot and resolve frame
/// indices. Touches no files.
pub fn plan_export(request: &ExportRequest, default_extension: &str) -> GymkhanaResult<ExportPlan> {
    request.range.validate_against(&request.primary)?;
    if !request.offset_secs.is_finite() {
        return Err(GymkhanaError::invalid_value("offset must be a finite number"));
    }

    let primary = &request.primary;
    let shadow = &request.shadow;
    let frames = export_frame_span(
        request.range.start_secs,
        request.range.end_secs,
        primary.fps,
        primary.total_frames,
    );
    let start_shadow = shadow_frame_index(
        request.range.start_secs,
        request.offset_secs,
        shadow.fps,
        shadow.total_frames,
    );

    Ok(ExportPlan {
        output_path: with_default_extension(&request.output_path, default_extension),
        frames,
        start_shadow,
        fps: primary.fps,
        width: primary.width,
        height: primary.height,
    })
}

/// Identifier of one export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "export-{}", self.0)
    }
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    Preparing,
    Rendering,
    Finalizing,
    Complete,
    Failed,
}

/// Export progress report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportProgress {
    /// Written frames as a percentage of the range, in `[0, 100]`.
    pub percent: f64,

    /// Frames written so far.
    pub frames_written: u64,

    /// Frames in the range.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

/// Final report of a successful export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub job_id: JobId,
    pub output_path: PathBuf,
    pub range: ExportRange,
    pub offset_secs: f64,
    pub opacity: f64,
    pub total_frames: u64,
    pub frames_written: u64,

    /// Primary frames that failed to decode and were left out.
    pub frames_skipped: u64,

    /// Frames written without a shadow, because its index was out of
    /// range or its read failed.
    pub primary_only_frames: u64,

    /// Largest gap, in shadow frames, between the lockstep pairing used
    /// here and the time-based pairing used during playback.
    pub max_drift_frames: i64,

    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub started_at: String,
    pub finished_at: String,
    pub elapsed_secs: f64,
}

impl ExportSummary {
    /// Write the summary as pretty JSON.
    pub fn write_json(&self, path: &Path) -> GymkhanaResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Message from an export worker.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportEvent {
    Progress(ExportProgress),
    Completed(ExportSummary),
    Failed(Failure),
}

impl ExportEvent {
    /// Whether this is the last event of its job.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

/// Starts export jobs, at most one at a time.
pub struct ExportPipeline {
    backend: Arc<dyn MediaBackend>,
    active: Arc<AtomicBool>,
    next_id: AtomicU64,
    default_extension: String,
}

impl ExportPipeline {
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            backend,
            active: Arc::new(AtomicBool::new(false)),
            next_id: AtomicU64::new(1),
            default_extension: "mp4".to_string(),
        }
    }

    /// Extension given to output paths that have none.
    pub fn with_default_extension(mut self, extension: impl Into<String>) -> Self {
        self.default_extension = extension.into();
        self
    }

    /// Whether a job is running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Validate `request` and start it on a worker thread.
    ///
    /// Fails with `InvalidRange` for a bad range and `AlreadyRunning` while
    /// another job is active, in both cases before any I/O. Everything that
    /// goes wrong afterwards arrives as an [`ExportEvent::Failed`].
    pub fn start(&self, request: ExportRequest) -> GymkhanaResult<ExportHandle> {
        let plan = plan_export(&request, &self.default_extension)?;

        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GymkhanaError::AlreadyRunning);
        }

        let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let output_path = plan.output_path.clone();
        let total_frames = plan.total_frames();

        tracing::info!(
            job = %id,
            output = %output_path.display(),
            range = %request.range,
            offset_secs = request.offset_secs,
            opacity = request.opacity,
            frames = total_frames,
            backend = self.backend.name(),
            "Export started"
        );

        let job = ExportJob {
            id,
            request,
            plan,
            backend: Arc::clone(&self.backend),
            cancel: Arc::clone(&cancel),
            events: tx.clone(),
        };
        let active = Arc::clone(&self.active);

        let spawned = std::thread::Builder::new()
            .name(format!("gymkhana-{id}"))
            .spawn(move || run_worker(job, &active, &tx));

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                self.active.store(false, Ordering::SeqCst);
                return Err(GymkhanaError::Io(e));
            }
        };

        Ok(ExportHandle {
            id,
            output_path,
            total_frames,
            events: rx,
            cancel,
            thread: Some(thread),
            terminal_seen: false,
        })
    }
}

/// The caller's side of a running export.
pub struct ExportHandle {
    id: JobId,
    output_path: PathBuf,
    total_frames: u64,
    events: Receiver<ExportEvent>,
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    terminal_seen: bool,
}

impl ExportHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Ask the worker to stop after the current frame.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Whether the terminal event has been received.
    pub fn is_finished(&self) -> bool {
        self.terminal_seen
    }

    /// Next queued event without blocking.
    pub fn try_next_event(&mut self) -> Option<ExportEvent> {
        if self.terminal_seen {
            return None;
        }
        match self.events.try_recv() {
            Ok(event) => Some(self.observe(event)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.observe(worker_vanished())),
        }
    }

    /// Next event, blocking until one arrives. `None` once the job has
    /// reported its outcome.
    pub fn next_event(&mut self) -> Option<ExportEvent> {
        if self.terminal_seen {
            return None;
        }
        let event = self.events.recv().unwrap_or_else(|_| worker_vanished());
        Some(self.observe(event))
    }

    /// Block until the job ends and return its outcome.
    pub fn wait(mut self) -> Result<ExportSummary, Failure> {
        while let Some(event) = self.next_event() {
            match event {
                ExportEvent::Completed(summary) => return Ok(summary),
                ExportEvent::Failed(failure) => return Err(failure),
                ExportEvent::Progress(_) => {}
            }
        }
        Err(Failure {
            kind: ErrorKind::Internal,
            message: "export already reported its outcome".to_string(),
        })
    }

    fn observe(&mut self, event: ExportEvent) -> ExportEvent {
        if event.is_terminal() {
            self.terminal_seen = true;
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
        event
    }
}

fn worker_vanished() -> ExportEvent {
    ExportEvent::Failed(Failure {
        kind: ErrorKind::Internal,
        message: "export worker exited without reporting".to_string(),
    })
}

fn run_worker(job: ExportJob, active: &AtomicBool, events: &Sender<ExportEvent>) {
    let id = job.id;
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| job.run()));
    let result = match outcome {
        Ok(result) => result,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(GymkhanaError::Other(anyhow::anyhow!(
                "export worker panicked: {reason}"
            )))
        }
    };

    // Free the slot first so a caller reacting to the outcome can start
    // the next export straight away.
    active.store(false, Ordering::SeqCst);

    let event = match result {
        Ok(summary) => {
            tracing::info!(
                job = %id,
                output = %summary.output_path.display(),
                frames = summary.frames_written,
                skipped = summary.frames_skipped,
                primary_only = summary.primary_only_frames,
                elapsed_secs = summary.elapsed_secs,
                "Export complete"
            );
            ExportEvent::Completed(summary)
        }
        Err(err) => {
            if err.kind() == ErrorKind::Cancelled {
                tracing::info!(job = %id, "Export cancelled");
            } else {
                tracing::error!(job = %id, error = %err, "Export failed");
            }
            let _ = events.send(ExportEvent::Progress(ExportProgress {
                percent: 0.0,
                frames_written: 0,
                total_frames: job.plan.total_frames(),
                eta_secs: 0.0,
                stage: ExportStage::Failed,
            }));
            ExportEvent::Failed(Failure::from(&err))
        }
    };
    let _ = events.send(event);
}

#[derive(Debug, Default)]
struct FrameCounts {
    written: u64,
    skipped: u64,
    primary_only: u64,
    max_drift: i64,
}

struct ExportJob {
    id: JobId,
    request: ExportRequest,
    plan: ExportPlan,
    backend: Arc<dyn MediaBackend>,
    cancel: Arc<AtomicBool>,
    events: Sender<ExportEvent>,
}

impl ExportJob {
    fn run(&self) -> GymkhanaResult<ExportSummary> {
        let started = Instant::now();
        let started_at = now_rfc3339();

        let mut primary = self.backend.open_source(&self.request.primary.path)?;
        let mut shadow = self.backend.open_source(&self.request.shadow.path)?;
        let shadow_total = shadow.metadata().total_frames;

        let mut sink = self.backend.create_sink(&SinkConfig {
            path: self.plan.output_path.clone(),
            fps: self.plan.fps,
            width: self.plan.width,
            height: self.plan.height,
        })?;

        self.report(ExportStage::Preparing, 0, started);

        let rendered = self.render_frames(
            primary.as_mut(),
            shadow.as_mut(),
            shadow_total,
            sink.as_mut(),
            started,
        );
        primary.close();
        shadow.close();

        let counts = match rendered {
            Ok(counts) => counts,
            Err(err) => {
                sink.abort();
                return Err(err);
            }
        };

        self.report(ExportStage::Finalizing, counts.written, started);
        let output_path = sink.finish()?;

        let total = self.plan.total_frames();
        self.send(ExportProgress {
            percent: 100.0,
            frames_written: counts.written,
            total_frames: total,
            eta_secs: 0.0,
            stage: ExportStage::Complete,
        });

        Ok(ExportSummary {
            job_id: self.id,
            output_path,
            range: self.request.range,
            offset_secs: self.request.offset_secs,
            opacity: self.request.opacity,
            total_frames: total,
            frames_written: counts.written,
            frames_skipped: counts.skipped,
            primary_only_frames: counts.primary_only,
            max_drift_frames: counts.max_drift,
            fps: self.plan.fps,
            width: self.plan.width,
            height: self.plan.height,
            started_at,
            finished_at: now_rfc3339(),
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }

    fn render_frames(
        &self,
        primary: &mut dyn VideoSource,
        shadow: &mut dyn VideoSource,
        shadow_total: u64,
        sink: &mut dyn FrameSink,
        started: Instant,
    ) -> GymkhanaResult<FrameCounts> {
        let mut counts = FrameCounts::default();

        for frame in self.plan.frames.clone() {
            if self.cancel.load(Ordering::SeqCst) {
                return Err(GymkhanaError::Cancelled);
            }

            let base = match primary.read_frame(frame) {
                Ok(base) => base,
                Err(err) if err.is_recoverable() => {
                    tracing::warn!(
                        job = %self.id,
                        frame,
                        error = %err,
                        "Skipping undecodable primary frame"
                    );
                    counts.skipped += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let shadow_index = self.plan.shadow_index(frame);
            let drift = lockstep_drift_frames(
                shadow_index,
                frame,
                self.plan.fps,
                self.request.offset_secs,
                self.request.shadow.fps,
            );
            counts.max_drift = counts.max_drift.max(drift.abs());

            let output = if shadow_index < shadow_total {
                match shadow.read_frame(shadow_index) {
                    Ok(overlay) => composite(&base, &overlay, self.request.opacity)?,
                    Err(err) => {
                        tracing::debug!(
                            job = %self.id,
                            frame,
                            shadow_index,
                            error = %err,
                            "Shadow unreadable, writing primary only"
                        );
                        counts.primary_only += 1;
                        base
                    }
                }
            } else {
                counts.primary_only += 1;
                base
            };

            sink.write_frame(&output)?;
            counts.written += 1;
            self.report(ExportStage::Rendering, counts.written, started);
        }

        if counts.written == 0 {
            return Err(GymkhanaError::decode_failed(format!(
                "none of the {} primary frames in {} could be decoded",
                self.plan.total_frames(),
                self.request.range
            )));
        }
        Ok(counts)
    }

    fn report(&self, stage: ExportStage, written: u64, started: Instant) {
        let total = self.plan.total_frames();
        let fraction = if total == 0 {
            0.0
        } else {
            written as f64 / total as f64
        };
        self.send(ExportProgress {
            percent: (fraction * 100.0).clamp(0.0, 100.0),
            frames_written: written,
            total_frames: total,
            eta_secs: eta_secs(started.elapsed().as_secs_f64(), fraction),
            stage,
        });
    }

    fn send(&self, progress: ExportProgress) {
        // A dropped handle means nobody is listening; the job still runs
        // to completion.
        let _ = self.events.send(ExportEvent::Progress(progress));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(path: &str, fps: f64, total_frames: u64) -> SourceMetadata {
        SourceMetadata {
            path: PathBuf::from(path),
            fps,
            total_frames,
            width: 16,
            height: 8,
        }
    }

    fn request(start: f64, end: f64, offset: f64) -> ExportRequest {
        ExportRequest {
            primary: meta("p.mp4", 30.0, 300),
            shadow: meta("s.mp4", 25.0, 250),
            range: ExportRange {
                start_secs: start,
                end_secs: end,
            },
            offset_secs: offset,
            opacity: 0.5,
            output_path: PathBuf::from("out/compare"),
        }
    }

    #[test]
    fn test_plan_resolves_frames_and_extension() {
        let plan = plan_export(&request(2.0, 4.0, 0.0), "mp4").unwrap();
        assert_eq!(plan.frames, 60..120);
        assert_eq!(plan.total_frames(), 60);
        assert_eq!(plan.start_shadow, 50);
        assert_eq!(plan.output_path, PathBuf::from("out/compare.mp4"));
        assert_eq!((plan.width, plan.height), (16, 8));
    }

    #[test]
    fn test_plan_pairs_shadow_in_lockstep() {
        let plan = plan_export(&request(2.0, 4.0, 1.5), "mp4").unwrap();
        // (2.0 + 1.5) * 25
        assert_eq!(plan.start_shadow, 87);
        assert_eq!(plan.shadow_index(60), 87);
        assert_eq!(plan.shadow_index(119), 146);
    }

    #[test]
    fn test_plan_rejects_bad_ranges() {
        for (start, end) in [(5.0, 5.0), (6.0, 5.0), (-1.0, 2.0), (9.0, 10.5), (f64::NAN, 1.0)] {
            let err = plan_export(&request(start, end, 0.0), "mp4").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRange, "{start}..{end}");
        }
    }

    #[test]
    fn test_plan_rejects_unplayable_primary() {
        let mut req = request(0.0, 1.0, 0.0);
        req.primary.fps = 0.0;
        assert_eq!(
            plan_export(&req, "mp4").unwrap_err().kind(),
            ErrorKind::InvalidRange
        );
    }

    #[test]
    fn test_events_terminal_flag() {
        let progress = ExportEvent::Progress(ExportProgress {
            percent: 10.0,
            frames_written: 1,
            total_frames: 10,
            eta_secs: 1.0,
            stage: ExportStage::Rendering,
        });
        assert!(!progress.is_terminal());
        assert!(ExportEvent::Failed(Failure::from(GymkhanaError::Cancelled)).is_terminal());
        assert_eq!(JobId(3).to_string(), "export-3");
    }
}
