//! Check the external tools the ffmpeg backend needs.

use gymkhana_common::config::{config_file_path, AppConfig};
use gymkhana_media::ffmpeg::command_exists;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Gymkhana System Check");
    println!("{}", "=".repeat(50));

    let tools = [
        ("ffmpeg", config.media.ffmpeg_bin.as_str()),
        ("ffprobe", config.media.ffprobe_bin.as_str()),
    ];
    let mut all_ok = true;
    for (role, binary) in tools {
        if command_exists(binary) {
            println!("[OK] {role}: {binary}");
        } else {
            all_ok = false;
            println!("[MISSING] {role}: {binary}");
        }
    }

    println!();
    println!("Config: {}", config_file_path().display());
    println!(
        "  Export defaults: .{} (x264 preset {}, crf {})",
        config.export.default_extension, config.export.x264_preset, config.export.crf
    );

    println!();
    if all_ok {
        println!("All tools found. Gymkhana is ready.");
    } else {
        println!("Install ffmpeg or set media.ffmpeg_bin / media.ffprobe_bin in the config.");
    }
    Ok(())
}
