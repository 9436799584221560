//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GymkhanaError, GymkhanaResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Interactive playback defaults.
    #[serde(default)]
    pub playback: PlaybackDefaults,

    /// Export encoder defaults.
    #[serde(default)]
    pub export: ExportDefaults,

    /// External media tools.
    #[serde(default)]
    pub media: MediaConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Initial values for a new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackDefaults {
    /// Playback speed multiplier.
    pub speed: f64,

    /// Shadow opacity in `[0.0, 1.0]`.
    pub opacity: f64,

    /// Sync offset in seconds.
    pub offset_secs: f64,
}

/// Export encoder parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDefaults {
    /// Extension appended to output paths that have none.
    pub default_extension: String,

    /// x264 preset for H.264 outputs.
    pub x264_preset: String,

    /// Constant rate factor for H.264/VP9 outputs.
    pub crf: u8,
}

/// Locations of the ffmpeg binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Encoder/decoder binary.
    pub ffmpeg_bin: String,

    /// Probe binary.
    pub ffprobe_bin: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "gymkhana=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for PlaybackDefaults {
    fn default() -> Self {
        Self {
            speed: 1.0,
            opacity: 0.5,
            offset_secs: 0.0,
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            default_extension: "mp4".to_string(),
            x264_preset: "medium".to_string(),
            crf: 20,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load_from(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                Self::default()
            }
        }
    }

    /// Load config from an explicit file.
    pub fn load_from(path: &Path) -> GymkhanaResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Reject values that no session could start with.
    pub fn validate(&self) -> GymkhanaResult<()> {
        if !(0.0..=1.0).contains(&self.playback.opacity) {
            return Err(GymkhanaError::config(format!(
                "playback.opacity must be within [0, 1], got {}",
                self.playback.opacity
            )));
        }
        if !self.playback.offset_secs.is_finite() {
            return Err(GymkhanaError::config("playback.offset_secs must be finite"));
        }
        if self.export.default_extension.trim().is_empty() {
            return Err(GymkhanaError::config(
                "export.default_extension must not be empty",
            ));
        }
        if self.media.ffmpeg_bin.is_empty() || self.media.ffprobe_bin.is_empty() {
            return Err(GymkhanaError::config("media binaries must be named"));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("gymkhana").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.playback.opacity, 0.5);
        assert_eq!(config.export.default_extension, "mp4");
        assert_eq!(config.media.ffmpeg_bin, "ffmpeg");
    }

    #[test]
    fn test_partial_file_fills_missing_sections() {
        let path = std::env::temp_dir().join(format!(
            "gymkhana-config-test-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"playback":{"speed":2.0,"opacity":0.25,"offset_secs":-1.5}}"#)
            .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.playback.speed, 2.0);
        assert_eq!(config.playback.offset_secs, -1.5);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.export.crf, 20);
    }

    #[test]
    fn test_out_of_range_opacity_is_rejected() {
        let mut config = AppConfig::default();
        config.playback.opacity = 1.5;
        assert!(config.validate().is_err());
    }
}
