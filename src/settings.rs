//! Runtime settings
//!
//! Stored as JSON. Loading never fails: a missing or broken file falls back
//! to the defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_FRAME_DT;

/// Audio settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
    pub muted: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,
        }
    }
}

/// Runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seed of the unit registry RNG
    pub seed: u64,
    /// Fixed frame step in seconds
    pub frame_dt: f32,
    pub audio: AudioSettings,
    /// Before running, log the structural issues of the program's parameter
    /// trees at info level. Recoveries made while running are always logged
    /// at debug.
    pub log_recoveries: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: 0x5EED,
            frame_dt: DEFAULT_FRAME_DT,
            audio: AudioSettings::default(),
            log_recoveries: false,
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(json).map(Self::sanitized)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load settings from a JSON file, falling back to defaults
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(err) => {
                log::warn!("Could not read settings from {}: {err}, using defaults", path.display());
                return Self::default();
            }
        };
        match Self::from_json(&json) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(err) => {
                log::warn!("Invalid settings in {}: {err}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Save settings as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path.as_ref(), json)?;
        log::info!("Settings saved");
        Ok(())
    }

    /// Clamp values that would break the runtime
    fn sanitized(mut self) -> Self {
        if !(self.frame_dt.is_finite() && self.frame_dt > 0.0) {
            log::warn!("frame_dt {} is not a positive step, using default", self.frame_dt);
            self.frame_dt = DEFAULT_FRAME_DT;
        }
        self.audio.master_volume = self.audio.master_volume.clamp(0.0, 1.0);
        self.audio.sfx_volume = self.audio.sfx_volume.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = Settings::from_json(r#"{ "seed": 9, "audio": { "muted": true } }"#).unwrap();
        assert_eq!(settings.seed, 9);
        assert!(settings.audio.muted);
        assert_eq!(settings.audio.master_volume, 0.8);
        assert_eq!(settings.frame_dt, DEFAULT_FRAME_DT);
    }

    #[test]
    fn test_invalid_values_are_sanitized() {
        let settings = Settings::from_json(r#"{ "frame_dt": -1.0, "audio": { "sfx_volume": 3.0 } }"#).unwrap();
        assert_eq!(settings.frame_dt, DEFAULT_FRAME_DT);
        assert_eq!(settings.audio.sfx_volume, 1.0);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("barrage-settings-{}.json", std::process::id()));
        let settings = Settings {
            seed: 42,
            log_recoveries: true,
            ..Default::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path), settings);
        std::fs::remove_file(&path).unwrap();

        // Missing file falls back to defaults
        assert_eq!(Settings::load(&path), Settings::default());
    }
}
