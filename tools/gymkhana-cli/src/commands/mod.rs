pub mod check;
pub mod export;
pub mod frame;
pub mod info;
pub mod play;

use std::path::Path;
use std::sync::Arc;

use gymkhana_common::config::AppConfig;
use gymkhana_media::backend::MediaBackend;
use gymkhana_media::FfmpegBackend;
use gymkhana_playback_engine::{PlaybackController, Session};
use gymkhana_sync_model::metadata::Slot;
use gymkhana_sync_model::sync::SyncState;

use crate::SyncArgs;

/// The ffmpeg backend, or an error telling the user what is missing.
pub fn backend(config: &AppConfig) -> anyhow::Result<Arc<dyn MediaBackend>> {
    let backend = FfmpegBackend::from_config(config);
    if !backend.is_available() {
        anyhow::bail!(
            "ffmpeg backend unavailable (looked for '{}' and '{}'); run `gymkhana check`",
            backend.ffmpeg_bin(),
            backend.ffprobe_bin()
        );
    }
    Ok(Arc::new(backend))
}

/// Config defaults overridden by whatever was passed on the command line.
pub fn sync_state(config: &AppConfig, args: SyncArgs) -> anyhow::Result<SyncState> {
    let mut sync = SyncState::new(config.playback.offset_secs, config.playback.opacity)?;
    if let Some(offset) = args.offset {
        let applied = sync.set_offset(offset)?;
        if applied != offset {
            println!("  Offset clamped to {applied:+.1}s");
        }
    }
    if let Some(opacity) = args.opacity {
        sync.set_opacity(opacity)?;
    }
    Ok(sync)
}

/// A controller with both videos loaded.
pub fn open_pair(
    config: &AppConfig,
    primary: &Path,
    shadow: &Path,
    sync: SyncArgs,
) -> anyhow::Result<PlaybackController> {
    let session = Session::open(backend(config)?).with_sync(sync_state(config, sync)?);
    let mut controller = PlaybackController::new(session);
    controller.load_source(Slot::Primary, primary)?;
    controller.load_source(Slot::Shadow, shadow)?;
    Ok(controller)
}
