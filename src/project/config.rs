use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{MAX_TRACKS, PERIOD_FRAMES, SAMPLE_RATE, UI_FPS};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "MULTITRACK_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "multitrack.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Engine settings, stored as JSON
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding `<project>.wav` and `<project>.cfg`
    pub project_dir: PathBuf,
    pub period_frames: usize,
    /// Used when creating a new project
    pub sample_rate: u32,
    /// Channel count for new projects
    pub channels: u16,
    /// Output latency in frames
    pub playback_latency: u64,
    /// Input latency in frames
    pub capture_latency: u64,
    /// Device names; the host default when absent
    pub output_device: Option<String>,
    pub input_device: Option<String>,
    /// Frames moved per seek key press
    pub seek_step_frames: u64,
    /// Mute a track while it is armed
    pub auto_mute_on_arm: bool,
    /// Attenuation for padded pan presets; derived from the channel count when absent
    pub pad_steps: Option<u8>,
    pub ui_fps: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            period_frames: PERIOD_FRAMES,
            sample_rate: SAMPLE_RATE,
            channels: MAX_TRACKS as u16,
            playback_latency: PERIOD_FRAMES as u64 * 2,
            capture_latency: PERIOD_FRAMES as u64 * 2,
            output_device: None,
            input_device: None,
            seek_step_frames: SAMPLE_RATE as u64,
            auto_mute_on_arm: true,
            pad_steps: None,
            ui_fps: UI_FPS,
        }
    }
}

impl EngineConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Config path from the environment or the working directory.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_frames == 0 {
            return Err(ConfigError::Invalid("period_frames must be positive".into()));
        }
        if self.channels == 0 || self.channels as usize > MAX_TRACKS {
            return Err(ConfigError::Invalid(format!(
                "channels must be within 1..={}",
                MAX_TRACKS
            )));
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".into()));
        }
        Ok(())
    }

    /// Record offset applied when the session file does not set one
    pub fn record_offset(&self) -> u64 {
        self.playback_latency + self.capture_latency
    }

    pub fn project_paths(&self, name: &str) -> (PathBuf, PathBuf) {
        (
            self.project_dir.join(format!("{name}.wav")),
            self.project_dir.join(format!("{name}.cfg")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(&dir.path().join("none.json")).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.record_offset(), 1024);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multitrack.json");
        std::fs::write(&path, r#"{ "period_frames": 128, "input_device": "hw:CODEC" }"#).unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.period_frames, 128);
        assert_eq!(config.input_device.as_deref(), Some("hw:CODEC"));
        assert_eq!(config.sample_rate, SAMPLE_RATE);
    }

    #[test]
    fn rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multitrack.json");
        std::fs::write(&path, r#"{ "channels": 40 }"#).unwrap();
        assert!(matches!(EngineConfig::load(&path), Err(ConfigError::Invalid(_))));
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(EngineConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn project_paths_share_a_stem() {
        let config = EngineConfig {
            project_dir: PathBuf::from("/mnt/multitrack"),
            ..EngineConfig::default()
        };
        let (wav, cfg) = config.project_paths("demo");
        assert_eq!(wav, PathBuf::from("/mnt/multitrack/demo.wav"));
        assert_eq!(cfg, PathBuf::from("/mnt/multitrack/demo.cfg"));
    }
}
