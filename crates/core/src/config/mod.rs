use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the mixer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub render: RenderConfig,
    pub reactive: ReactiveConfig,
    pub upload: UploadConfig,
}

impl AppConfig {
    /// Loads a configuration from a JSON file. Missing sections fall back to
    /// their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Smoothing factor for the meter copy of the spectrum, in `[0, 1)`.
    pub display_smoothing: f32,
    /// Name fragment used to pick a capture device. `None` picks the default.
    pub input_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            display_smoothing: 0.8,
            input_device: None,
        }
    }
}

/// Output canvas presets offered by the mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanvasSize {
    Small,
    #[default]
    Medium,
    Large,
    Custom,
}

impl CanvasSize {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Small => (320, 240),
            Self::Medium => (640, 480),
            Self::Large => (1280, 720),
            Self::Custom => (800, 600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub canvas: CanvasSize,
    pub fps: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasSize::Medium,
            fps: 60,
        }
    }
}

/// Thresholds for the audio and beat transition triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactiveConfig {
    pub audio_trigger_level: f32,
    pub beat_trigger_confidence: f32,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            audio_trigger_level: 0.35,
            beat_trigger_confidence: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_video_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_video_bytes: 100 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            AppConfig::from_json_str(r#"{ "render": { "canvas": "large" } }"#).unwrap();
        assert_eq!(config.render.canvas.dimensions(), (1280, 720));
        assert_eq!(config.render.fps, 60);
        assert_eq!(config.audio, AudioConfig::default());
        assert_eq!(config.upload.max_video_bytes, 104_857_600);
    }

    #[test]
    fn audio_section_lists_only_live_settings() {
        let value = serde_json::to_value(AudioConfig::default()).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["display_smoothing", "input_device", "sample_rate"]);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(AppConfig::from_json_str("{ nope").is_err());
    }
}
