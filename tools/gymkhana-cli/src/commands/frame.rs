//! Render a single composite frame to PNG.

use std::path::PathBuf;

use gymkhana_common::clock::format_clock;
use gymkhana_common::config::AppConfig;

use crate::SyncArgs;

pub fn run(
    config: &AppConfig,
    primary: PathBuf,
    shadow: PathBuf,
    at: f64,
    sync: SyncArgs,
    output: PathBuf,
    primary_out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut controller = super::open_pair(config, &primary, &shadow, sync)?;
    let rendered = controller
        .seek(at)
        .ok_or_else(|| anyhow::anyhow!("primary video has no usable frame rate"))?
        .clone();

    rendered.composite.save_png(&output)?;
    if let Some(path) = &primary_out {
        rendered.primary.save_png(path)?;
    }

    let sync = controller.sync();
    println!(
        "Frame {} ({}) with shadow frame {} at offset {:+.1}s, opacity {:.2}",
        rendered.primary_index,
        format_clock(rendered.primary_time),
        rendered.shadow_index,
        sync.offset_secs(),
        sync.opacity()
    );
    println!("  Composite: {}", output.display());
    if let Some(path) = primary_out {
        println!("  Primary: {}", path.display());
    }
    Ok(())
}
