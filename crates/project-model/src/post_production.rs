//! Post-production settings (`post-production.json`).
//!
//! These settings are edited independently of the recording and can be
//! applied to the same keyframe timeline any number of times.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ProjectError;
use crate::json::{read_json, write_json};

pub const MIN_CURSOR_SIZE: u32 = 4;
pub const MAX_CURSOR_SIZE: u32 = 64;

/// Cursor overlay and click-sound settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct PostProductionConfig {
    pub cursor: CursorSettings,
    pub audio: AudioSettings,
}

/// Visual effect applied while a click is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClickEffect {
    /// Shrink the cursor to 75% while clicking.
    #[default]
    Scale,
    None,
}

/// Fractional anchor point inside a custom cursor's viewBox.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct HotspotSetting {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CursorSettings {
    pub enabled: bool,

    /// Builtin style key (`pointer`, `pointer-alt`, `hand`, `dot`).
    pub style: String,

    /// Custom SVG cursor. Takes precedence over `style` when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_svg_path: Option<PathBuf>,

    /// Hotspot for the custom SVG cursor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_hotspot: Option<HotspotSetting>,

    /// Drawn width in pixels.
    pub size: u32,

    /// `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub color: String,

    pub opacity_percent: f64,
    pub click_effect: ClickEffect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AudioSettings {
    pub click_sound_enabled: bool,
    pub volume_percent: f64,

    /// Replacement for the bundled click sound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_sound_path: Option<PathBuf>,
}

impl Default for CursorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            style: "pointer".to_string(),
            custom_svg_path: None,
            custom_hotspot: None,
            size: 20,
            color: "#000000".to_string(),
            opacity_percent: 80.0,
            click_effect: ClickEffect::Scale,
        }
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            click_sound_enabled: true,
            volume_percent: 50.0,
            custom_sound_path: None,
        }
    }
}

impl CursorSettings {
    /// Opacity in `[0, 1]`.
    pub fn opacity(&self) -> f32 {
        (self.opacity_percent / 100.0).clamp(0.0, 1.0) as f32
    }
}

impl AudioSettings {
    /// Linear gain in `[0, 1]`.
    pub fn volume(&self) -> f64 {
        (self.volume_percent / 100.0).clamp(0.0, 1.0)
    }
}

impl PostProductionConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ProjectError> {
        let cursor = &self.cursor;
        if !(MIN_CURSOR_SIZE..=MAX_CURSOR_SIZE).contains(&cursor.size) {
            return Err(ProjectError::validation(format!(
                "cursor size {} outside {MIN_CURSOR_SIZE}..={MAX_CURSOR_SIZE}",
                cursor.size
            )));
        }
        check_percent("cursor opacity", cursor.opacity_percent)?;
        check_percent("click volume", self.audio.volume_percent)?;
        if parse_hex_color(&cursor.color).is_none() {
            return Err(ProjectError::validation(format!(
                "invalid cursor color {:?}",
                cursor.color
            )));
        }
        if let Some(hotspot) = cursor.custom_hotspot {
            if !(0.0..=1.0).contains(&hotspot.x) || !(0.0..=1.0).contains(&hotspot.y) {
                return Err(ProjectError::validation(format!(
                    "custom hotspot ({}, {}) outside [0, 1]",
                    hotspot.x, hotspot.y
                )));
            }
        }
        Ok(())
    }

    /// Load and validate a settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Load a settings file, using defaults when it does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ProjectError> {
        write_json(path.as_ref(), self)
    }
}

fn check_percent(label: &str, value: f64) -> Result<(), ProjectError> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ProjectError::validation(format!(
            "{label} {value} outside 0..=100"
        )))
    }
}

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` into RGBA bytes.
pub fn parse_hex_color(input: &str) -> Option<[u8; 4]> {
    let hex = input.trim().strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut out = [255u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                out[i] = v * 17;
            }
            Some(out)
        }
        6 | 8 => {
            let mut out = [255u8; 4];
            for i in 0..hex.len() / 2 {
                out[i] = channel(&hex[i * 2..i * 2 + 2])?;
            }
            Some(out)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PostProductionConfig::default();
        assert!(config.cursor.enabled);
        assert_eq!(config.cursor.style, "pointer");
        assert_eq!(config.cursor.size, 20);
        assert_eq!(config.cursor.click_effect, ClickEffect::Scale);
        assert!((config.cursor.opacity() - 0.8).abs() < 1e-6);
        assert!((config.audio.volume() - 0.5).abs() < 1e-9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: PostProductionConfig =
            serde_json::from_str(r#"{"cursor":{"style":"hand","clickEffect":"none"}}"#).unwrap();
        assert_eq!(parsed.cursor.style, "hand");
        assert_eq!(parsed.cursor.click_effect, ClickEffect::None);
        assert_eq!(parsed.cursor.color, "#000000");
        assert!(parsed.audio.click_sound_enabled);
    }

    #[test]
    fn test_camel_case_keys() {
        let value = serde_json::to_value(PostProductionConfig::default()).unwrap();
        assert_eq!(value["cursor"]["opacityPercent"], 80.0);
        assert_eq!(value["audio"]["clickSoundEnabled"], true);
        assert!(value["cursor"].get("customSvgPath").is_none());
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = PostProductionConfig::default();
        config.cursor.size = 65;
        assert!(config.validate().is_err());

        let mut config = PostProductionConfig::default();
        config.audio.volume_percent = 101.0;
        assert!(config.validate().is_err());

        let mut config = PostProductionConfig::default();
        config.cursor.color = "red".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#000"), Some([0, 0, 0, 255]));
        assert_eq!(parse_hex_color("#fa0"), Some([255, 170, 0, 255]));
        assert_eq!(parse_hex_color("#1e90ff"), Some([30, 144, 255, 255]));
        assert_eq!(parse_hex_color("#ff000080"), Some([255, 0, 0, 128]));
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("123456"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
    }

    #[test]
    fn test_load_or_default_when_missing() {
        let path = std::env::temp_dir().join("dolly_test_missing_post_production.json");
        let _ = std::fs::remove_file(&path);
        let config = PostProductionConfig::load_or_default(&path).unwrap();
        assert_eq!(config, PostProductionConfig::default());
    }
}
