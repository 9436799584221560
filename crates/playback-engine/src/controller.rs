//! Interactive playback: position, play/pause, and composited renders.

use std::path::Path;
use std::time::Duration;

use gymkhana_common::clock::frame_interval;
use gymkhana_common::error::{GymkhanaError, GymkhanaResult};
use gymkhana_media::frame::Frame;
use gymkhana_render_engine::compositor::composite;
use gymkhana_sync_model::metadata::{Slot, SourceMetadata};
use gymkhana_sync_model::sync::{PlaybackSpeed, SyncState};
use gymkhana_sync_model::timeline::{frame_time, primary_frame_index, resolve_pair};
use serde::{Deserialize, Serialize};

use crate::session::Session;

/// Playback states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Paused,
    Playing,
}

/// One rendered timeline position.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFrame {
    /// The primary frame as decoded.
    pub primary: Frame,

    /// Primary with the shadow blended over it.
    pub composite: Frame,

    pub primary_index: u64,
    pub shadow_index: u64,

    /// Seconds into the primary.
    pub primary_time: f64,

    /// Longer of the two source durations, for scrubber ranges.
    pub max_time: f64,
}

/// Drives a [`Session`] frame by frame.
///
/// The position is a primary frame index. The shadow index is derived from
/// it through the timeline on every render, so offset changes apply
/// immediately and never move the position.
pub struct PlaybackController {
    session: Session,
    state: PlaybackState,
    position: u64,
    speed: PlaybackSpeed,
    last_rendered: Option<RenderedFrame>,
}

impl PlaybackController {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            state: PlaybackState::Paused,
            position: 0,
            speed: PlaybackSpeed::default(),
            last_rendered: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Hand the session back, e.g. to close it explicitly.
    pub fn into_session(self) -> Session {
        self.session
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Current primary frame index.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn current_time(&self) -> f64 {
        self.primary()
            .map(|m| frame_time(self.position, m.fps))
            .unwrap_or(0.0)
    }

    pub fn speed(&self) -> PlaybackSpeed {
        self.speed
    }

    pub fn sync(&self) -> &SyncState {
        self.session.sync()
    }

    /// The most recent successful render.
    pub fn last_rendered(&self) -> Option<&RenderedFrame> {
        self.last_rendered.as_ref()
    }

    /// Longer of the loaded sources' durations.
    pub fn max_time(&self) -> f64 {
        [Slot::Primary, Slot::Shadow]
            .into_iter()
            .filter_map(|slot| self.session.metadata(slot))
            .map(SourceMetadata::duration_secs)
            .fold(0.0, f64::max)
    }

    /// Primary and shadow are loaded and the primary has a frame rate.
    pub fn can_play(&self) -> bool {
        self.session.is_ready() && self.primary().is_some_and(SourceMetadata::is_playable)
    }

    /// Load a video into `slot`. With both slots filled, playback returns
    /// to the first frame and renders it.
    pub fn load_source(&mut self, slot: Slot, path: &Path) -> GymkhanaResult<SourceMetadata> {
        let metadata = self.session.load(slot, path)?;
        if self.session.is_ready() {
            self.position = 0;
            self.last_rendered = None;
            if !self.can_play() {
                self.pause();
            }
            self.render();
        }
        Ok(metadata)
    }

    /// Start playing. Ignored unless both sources are loaded and the
    /// primary is playable; returns whether playback is running.
    pub fn play(&mut self) -> bool {
        if self.can_play() {
            if self.state != PlaybackState::Playing {
                tracing::debug!(
                    position = self.position,
                    speed = %self.speed,
                    "Playback started"
                );
            }
            self.state = PlaybackState::Playing;
        } else {
            tracing::debug!("Play ignored: sources not ready");
        }
        self.is_playing()
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            tracing::debug!(position = self.position, "Playback paused");
        }
        self.state = PlaybackState::Paused;
    }

    pub fn play_toggle(&mut self) -> PlaybackState {
        match self.state {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Paused => {
                self.play();
            }
        }
        self.state
    }

    /// Move to `time_secs` on the primary timeline, clamped to its frames.
    pub fn seek(&mut self, time_secs: f64) -> Option<&RenderedFrame> {
        let Some(primary) = self.primary() else {
            return None;
        };
        let index = primary_frame_index(time_secs, primary.fps, primary.total_frames);
        self.seek_frame(index)
    }

    /// Move to primary frame `index`, clamped to the last frame.
    pub fn seek_frame(&mut self, index: u64) -> Option<&RenderedFrame> {
        let last = self.primary()?.last_frame();
        self.position = index.min(last);
        self.render()
    }

    pub fn first_frame(&mut self) -> Option<&RenderedFrame> {
        self.seek_frame(0)
    }

    pub fn last_frame(&mut self) -> Option<&RenderedFrame> {
        self.seek_frame(u64::MAX)
    }

    /// Advance one frame while playing, wrapping to the start after the
    /// last frame, and render.
    pub fn tick(&mut self) -> Option<&RenderedFrame> {
        if !self.is_playing() || !self.can_play() {
            return None;
        }
        let last = self.primary()?.last_frame();
        self.position = if self.position >= last {
            0
        } else {
            self.position + 1
        };
        self.render()
    }

    /// Delay until the next tick at the current speed.
    pub fn tick_interval(&self) -> Option<Duration> {
        let primary = self.primary()?;
        frame_interval(primary.fps, self.speed.multiplier())
    }

    /// Release both sources and return to the paused start state. Sync
    /// settings and speed are kept.
    pub fn close(&mut self) {
        self.pause();
        self.session.close();
        self.position = 0;
        self.last_rendered = None;
    }

    /// Set the shadow offset (clamped to the accepted range) and re-render.
    pub fn set_offset(&mut self, offset_secs: f64) -> GymkhanaResult<f64> {
        let applied = self.session.sync_mut().set_offset(offset_secs)?;
        self.render();
        Ok(applied)
    }

    /// Set the shadow opacity (clamped to `[0, 1]`) and re-render.
    pub fn set_opacity(&mut self, opacity: f64) -> GymkhanaResult<f64> {
        let applied = self.session.sync_mut().set_opacity(opacity)?;
        self.render();
        Ok(applied)
    }

    /// Change speed. Only the preset multipliers are accepted; the new
    /// interval applies from the next tick.
    pub fn set_speed(&mut self, multiplier: f64) -> GymkhanaResult<PlaybackSpeed> {
        self.speed = PlaybackSpeed::from_multiplier(multiplier)?;
        tracing::debug!(speed = %self.speed, "Playback speed changed");
        Ok(self.speed)
    }

    /// Render the current position.
    ///
    /// A decode failure keeps the previous render and logs a warning, so
    /// the returned frame may belong to an earlier position: compare its
    /// `primary_index` with [`position`](Self::position) to tell.
    /// Returns `None` until both sources are loaded.
    pub fn render(&mut self) -> Option<&RenderedFrame> {
        let (primary_meta, shadow_meta) = match (
            self.session.metadata(Slot::Primary),
            self.session.metadata(Slot::Shadow),
        ) {
            (Some(p), Some(s)) => (p.clone(), s.clone()),
            _ => return None,
        };
        if !primary_meta.is_playable() {
            return None;
        }

        let offset = self.session.sync().offset_secs();
        let opacity = self.session.sync().opacity();
        let pair = resolve_pair(self.position, &primary_meta, &shadow_meta, offset);

        match self.compose(pair.primary, pair.shadow, opacity) {
            Ok((primary, composite)) => {
                self.last_rendered = Some(RenderedFrame {
                    primary,
                    composite,
                    primary_index: pair.primary,
                    shadow_index: pair.shadow,
                    primary_time: frame_time(pair.primary, primary_meta.fps),
                    max_time: self.max_time(),
                });
            }
            Err(err) => {
                tracing::warn!(
                    primary_index = pair.primary,
                    shadow_index = pair.shadow,
                    error = %err,
                    "Render failed, keeping previous frame"
                );
            }
        }
        self.last_rendered.as_ref()
    }

    fn compose(
        &mut self,
        primary_index: u64,
        shadow_index: u64,
        opacity: f64,
    ) -> GymkhanaResult<(Frame, Frame)> {
        let primary = read(&mut self.session, Slot::Primary, primary_index)?;
        let shadow = read(&mut self.session, Slot::Shadow, shadow_index)?;
        let blended = composite(&primary, &shadow, opacity)?;
        Ok((primary, blended))
    }

    fn primary(&self) -> Option<&SourceMetadata> {
        self.session.metadata(Slot::Primary)
    }
}

fn read(session: &mut Session, slot: Slot, index: u64) -> GymkhanaResult<Frame> {
    match session.source_mut(slot) {
        Some(source) => source.read_frame(index),
        None => Err(GymkhanaError::decode_failed(format!("no {slot} video loaded"))),
    }
}
