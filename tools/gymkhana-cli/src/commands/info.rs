//! Show probed metadata for one video.

use std::path::PathBuf;

use gymkhana_common::clock::format_clock;
use gymkhana_common::config::AppConfig;
use gymkhana_media::backend::MediaBackend;

pub fn run(config: &AppConfig, path: PathBuf) -> anyhow::Result<()> {
    let backend = super::backend(config)?;
    let mut source = backend.open_source(&path)?;
    let meta = source.metadata().clone();
    source.close();

    println!("Video: {}", meta.display_name());
    println!("  Path: {}", meta.path.display());
    println!("  Resolution: {}x{}", meta.width, meta.height);
    println!("  Frame rate: {:.3} fps", meta.fps);
    println!("  Frames: {}", meta.total_frames);
    println!("  Duration: {}", format_clock(meta.duration_secs()));
    if !meta.is_playable() {
        println!("  [WARN] no usable frame rate or frames; playback and export will refuse it");
    }
    Ok(())
}
