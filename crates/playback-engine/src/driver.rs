//! Paced playback loop on the tokio runtime.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::time::Instant;

use crate::controller::{PlaybackController, RenderedFrame};

/// Why [`run_playback`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackExit {
    /// The controller was paused (or never started playing).
    Paused,
    /// The stop flag was raised or the frame callback broke out.
    Stopped,
    /// Sources are missing or have no usable frame rate.
    NotReady,
}

/// Tick `controller` at its frame interval until paused or stopped.
///
/// The interval is recomputed before every tick, so speed changes take
/// effect on the next frame. The loop only yields between ticks; a render
/// is never interrupted halfway.
pub async fn run_playback<F>(
    controller: &mut PlaybackController,
    mut on_frame: F,
    stop: &AtomicBool,
) -> PlaybackExit
where
    F: FnMut(&RenderedFrame) -> ControlFlow<()>,
{
    let mut ticks = 0u64;
    let exit = loop {
        if stop.load(Ordering::SeqCst) {
            break PlaybackExit::Stopped;
        }
        if !controller.is_playing() {
            break PlaybackExit::Paused;
        }
        let Some(interval) = controller.tick_interval() else {
            break PlaybackExit::NotReady;
        };
        if !controller.can_play() {
            break PlaybackExit::NotReady;
        }

        let deadline = Instant::now() + interval;
        ticks += 1;
        // No frame here means nothing has decoded yet; keep going and let
        // the next tick try again.
        if let Some(frame) = controller.tick() {
            if on_frame(frame).is_break() {
                controller.pause();
                break PlaybackExit::Stopped;
            }
        }
        tokio::time::sleep_until(deadline).await;
    };

    tracing::debug!(ticks, position = controller.position(), exit = ?exit, "Playback loop ended");
    exit
}
