//! Headless playback: paces the controller in real time and logs frames.

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use gymkhana_common::clock::format_clock;
use gymkhana_common::config::AppConfig;
use gymkhana_playback_engine::{run_playback, PlaybackExit};

use crate::SyncArgs;

pub async fn run(
    config: &AppConfig,
    primary: PathBuf,
    shadow: PathBuf,
    seconds: f64,
    speed: Option<f64>,
    start: f64,
    sync: SyncArgs,
) -> anyhow::Result<()> {
    if !seconds.is_finite() || seconds <= 0.0 {
        anyhow::bail!("--seconds must be a positive number");
    }

    let mut controller = super::open_pair(config, &primary, &shadow, sync)?;
    controller.set_speed(speed.unwrap_or(config.playback.speed))?;
    controller.seek(start);
    if !controller.play() {
        anyhow::bail!("primary video is not playable");
    }

    println!(
        "Playing from {} at {} for {seconds}s (Ctrl-C to stop)",
        format_clock(controller.current_time()),
        controller.speed()
    );

    let stop = Arc::new(AtomicBool::new(false));
    let signal_stop = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_stop.store(true, Ordering::SeqCst);
        }
    });

    let budget = Duration::from_secs_f64(seconds);
    let began = Instant::now();
    let mut frames = 0u64;
    let exit = run_playback(
        &mut controller,
        |frame| {
            frames += 1;
            tracing::info!(
                primary = frame.primary_index,
                shadow = frame.shadow_index,
                time = %format_clock(frame.primary_time),
                "Frame"
            );
            if began.elapsed() >= budget {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        },
        &stop,
    )
    .await;

    let elapsed = began.elapsed().as_secs_f64();
    match exit {
        PlaybackExit::NotReady => anyhow::bail!("playback stopped: sources not ready"),
        PlaybackExit::Paused | PlaybackExit::Stopped => {
            println!(
                "Played {frames} frames in {elapsed:.1}s ({:.1} fps), stopped at {}",
                frames as f64 / elapsed.max(f64::EPSILON),
                format_clock(controller.current_time())
            );
        }
    }
    Ok(())
}
