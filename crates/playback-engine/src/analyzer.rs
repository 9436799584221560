//! Host-facing facade over playback and export.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gymkhana_common::config::AppConfig;
use gymkhana_common::error::{Failure, GymkhanaError, GymkhanaResult};
use gymkhana_media::backend::MediaBackend;
use gymkhana_render_engine::export::{
    ExportEvent, ExportHandle, ExportPipeline, ExportRequest, ExportSummary, JobId,
};
use gymkhana_sync_model::metadata::{Slot, SourceMetadata};
use gymkhana_sync_model::range::ExportRange;
use gymkhana_sync_model::sync::{PlaybackSpeed, SyncState};

use crate::controller::{PlaybackController, PlaybackState, RenderedFrame};
use crate::session::Session;

type ProgressHandler = Box<dyn FnMut(f64) + Send>;
type CompleteHandler = Box<dyn FnMut(&Path) + Send>;
type FailedHandler = Box<dyn FnMut(&Failure) + Send>;

/// One comparison as a host application sees it.
///
/// Export notifications are queued by the worker and only delivered from
/// [`Analyzer::poll_export`], on the caller's thread.
pub struct Analyzer {
    controller: PlaybackController,
    exports: ExportPipeline,
    job: Option<ExportHandle>,
    last_summary: Option<ExportSummary>,
    on_progress: Option<ProgressHandler>,
    on_complete: Option<CompleteHandler>,
    on_failed: Option<FailedHandler>,
}

impl Analyzer {
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        let exports = ExportPipeline::new(Arc::clone(&backend));
        Self {
            controller: PlaybackController::new(Session::open(backend)),
            exports,
            job: None,
            last_summary: None,
            on_progress: None,
            on_complete: None,
            on_failed: None,
        }
    }

    /// Build an analyzer with playback and export defaults from `config`.
    pub fn from_config(
        backend: Arc<dyn MediaBackend>,
        config: &AppConfig,
    ) -> GymkhanaResult<Self> {
        let sync = SyncState::new(config.playback.offset_secs, config.playback.opacity)?;
        let exports = ExportPipeline::new(Arc::clone(&backend))
            .with_default_extension(config.export.default_extension.clone());
        let mut controller = PlaybackController::new(Session::open(backend).with_sync(sync));
        controller.set_speed(config.playback.speed)?;
        Ok(Self {
            controller,
            exports,
            job: None,
            last_summary: None,
            on_progress: None,
            on_complete: None,
            on_failed: None,
        })
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController {
        &mut self.controller
    }

    pub fn load_source(&mut self, slot: Slot, path: &Path) -> GymkhanaResult<SourceMetadata> {
        self.controller.load_source(slot, path)
    }

    /// Render the current position. After a decode failure this is the
    /// last good frame, which can lag behind [`position`](Self::position).
    pub fn render(&mut self) -> Option<&RenderedFrame> {
        self.controller.render()
    }

    /// Primary frame index the next render targets.
    pub fn position(&self) -> u64 {
        self.controller.position()
    }

    /// Time of [`position`](Self::position) on the primary timeline.
    pub fn current_time(&self) -> f64 {
        self.controller.current_time()
    }

    pub fn set_offset(&mut self, offset_secs: f64) -> GymkhanaResult<f64> {
        self.controller.set_offset(offset_secs)
    }

    pub fn set_opacity(&mut self, opacity: f64) -> GymkhanaResult<f64> {
        self.controller.set_opacity(opacity)
    }

    pub fn seek(&mut self, time_secs: f64) -> Option<&RenderedFrame> {
        self.controller.seek(time_secs)
    }

    pub fn play_toggle(&mut self) -> PlaybackState {
        self.controller.play_toggle()
    }

    pub fn set_speed(&mut self, multiplier: f64) -> GymkhanaResult<PlaybackSpeed> {
        self.controller.set_speed(multiplier)
    }

    pub fn on_export_progress(&mut self, handler: impl FnMut(f64) + Send + 'static) {
        self.on_progress = Some(Box::new(handler));
    }

    pub fn on_export_complete(&mut self, handler: impl FnMut(&Path) + Send + 'static) {
        self.on_complete = Some(Box::new(handler));
    }

    pub fn on_export_failed(&mut self, handler: impl FnMut(&Failure) + Send + 'static) {
        self.on_failed = Some(Box::new(handler));
    }

    /// Export `range` of the loaded pair to `output` with the current
    /// offset and opacity.
    ///
    /// Events still queued from a finished job are delivered first. A job
    /// counts as running until its outcome has reached a handler, so this
    /// fails with `AlreadyRunning` even if the worker has already exited.
    pub fn start_export(
        &mut self,
        range: ExportRange,
        output: impl Into<PathBuf>,
    ) -> GymkhanaResult<JobId> {
        self.poll_export();
        if self.job.is_some() {
            return Err(GymkhanaError::AlreadyRunning);
        }

        let session = self.controller.session();
        let (Some(primary), Some(shadow)) = (
            session.metadata(Slot::Primary),
            session.metadata(Slot::Shadow),
        ) else {
            return Err(GymkhanaError::invalid_range(
                "load both a primary and a shadow video before exporting",
            ));
        };
        let sync = session.sync();
        let request = ExportRequest {
            primary: primary.clone(),
            shadow: shadow.clone(),
            range,
            offset_secs: sync.offset_secs(),
            opacity: sync.opacity(),
            output_path: output.into(),
        };

        let handle = self.exports.start(request)?;
        let id = handle.id();
        self.job = Some(handle);
        Ok(id)
    }

    /// Whether an export job has not reported its outcome yet.
    pub fn export_active(&self) -> bool {
        self.job.is_some()
    }

    /// Ask the running export, if any, to stop.
    pub fn cancel_export(&self) {
        if let Some(job) = &self.job {
            job.cancel();
        }
    }

    /// Summary of the most recent successful export.
    pub fn last_export_summary(&self) -> Option<&ExportSummary> {
        self.last_summary.as_ref()
    }

    /// Deliver queued export events to the registered handlers. Returns
    /// the number of events delivered.
    pub fn poll_export(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(event) = self.job.as_mut().and_then(ExportHandle::try_next_event) {
            delivered += 1;
            match event {
                ExportEvent::Progress(progress) => {
                    if let Some(handler) = self.on_progress.as_mut() {
                        handler(progress.percent);
                    }
                }
                ExportEvent::Completed(summary) => {
                    self.job = None;
                    if let Some(handler) = self.on_complete.as_mut() {
                        handler(&summary.output_path);
                    }
                    self.last_summary = Some(summary);
                }
                ExportEvent::Failed(failure) => {
                    self.job = None;
                    if let Some(handler) = self.on_failed.as_mut() {
                        handler(&failure);
                    }
                }
            }
        }
        delivered
    }

    /// Close both sources. Playback stops; a running export is unaffected.
    pub fn close(&mut self) {
        self.controller.close();
    }
}
