//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where recording sessions are stored.
    pub recordings_dir: PathBuf,

    /// Explicit ffmpeg binary. `FFMPEG_PATH` takes precedence.
    pub ffmpeg_path: Option<PathBuf>,

    /// Default recording settings.
    pub recording: RecordingDefaults,

    /// Default export settings.
    pub export: ExportDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default recording parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingDefaults {
    /// Output frame rate of the raw capture.
    pub fps: u32,

    /// Viewport size in CSS pixels.
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Frames buffered between the pacer and the encoder's stdin.
    pub channel_capacity: usize,
}

/// Which compositor drives the cursor overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompositorKind {
    /// Render every overlay frame and stream it to the encoder.
    #[default]
    Overlay,
    /// Describe cursor motion as encoder filter expressions.
    Expression,
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    pub backend: CompositorKind,

    /// How long a click stays "active" after its keyframe.
    pub click_window_ms: f64,

    /// Report overlay progress every N frames.
    pub progress_interval_frames: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "dolly=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            recordings_dir: dirs_default_recordings(),
            ffmpeg_path: None,
            recording: RecordingDefaults::default(),
            export: ExportDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            fps: 25,
            viewport_width: 1280,
            viewport_height: 720,
            channel_capacity: 8,
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            backend: CompositorKind::Overlay,
            click_window_ms: 100.0,
            progress_interval_frames: 30,
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
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
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
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("dolly").join("config.json")
}

/// Default recordings directory.
fn dirs_default_recordings() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("dolly").join("recordings")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_takes_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"export":{"backend":"expression"}}"#).unwrap();
        assert_eq!(parsed.export.backend, CompositorKind::Expression);
        assert!((parsed.export.click_window_ms - 100.0).abs() < 1e-9);
        assert_eq!(parsed.recording.fps, 25);
        assert_eq!(parsed.logging.level, "info");
        assert!(parsed.ffmpeg_path.is_none());
    }
}
