//! Configuration for retrograde
//!
//! Stored as YAML and read with [`Config::load`]. Every section carries
//! `#[serde(default)]` so a partial file only overrides what it names.
//!
//! ```yaml
//! playback:
//!   initial_pitch: 1.0
//!   initial_speed: 1.0
//!   position_interval_ms: 100
//! reverse:
//!   worker_threads: 2
//! ```

mod io;
mod paths;

pub use paths::{default_config_dir, default_config_path};

use serde::{Deserialize, Serialize};

use crate::playback::{PITCH_RANGE, SPEED_RANGE};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Playback controller defaults
    pub playback: PlaybackConfig,
    /// Background reversal settings
    pub reverse: ReverseConfig,
}

impl Config {
    /// Clamp every section into its supported range
    pub fn validate(&mut self) {
        self.playback.validate();
        self.reverse.validate();
    }
}

/// Playback controller configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Pitch ratio applied to the first loaded session
    pub initial_pitch: f32,
    /// Speed ratio applied to the first loaded session
    pub initial_speed: f32,
    /// Position clock tick while playing
    pub position_interval_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            initial_pitch: 1.0,
            initial_speed: 1.0,
            position_interval_ms: 100,
        }
    }
}

impl PlaybackConfig {
    /// Clamp values to the controller's domains
    pub fn validate(&mut self) {
        self.initial_pitch = self.initial_pitch.clamp(*PITCH_RANGE.start(), *PITCH_RANGE.end());
        self.initial_speed = self.initial_speed.clamp(*SPEED_RANGE.start(), *SPEED_RANGE.end());
        self.position_interval_ms = self.position_interval_ms.clamp(10, 1000);
    }
}

/// Background reversal configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverseConfig {
    /// Worker threads running reversals in parallel
    pub worker_threads: usize,
}

impl Default for ReverseConfig {
    fn default() -> Self {
        Self { worker_threads: 2 }
    }
}

impl ReverseConfig {
    pub fn validate(&mut self) {
        self.worker_threads = self.worker_threads.max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str("playback:\n  initial_speed: 1.5\n").unwrap();
        assert_eq!(config.playback.initial_speed, 1.5);
        assert_eq!(config.playback.initial_pitch, 1.0);
        assert_eq!(config.playback.position_interval_ms, 100);
        assert_eq!(config.reverse.worker_threads, 2);
    }

    #[test]
    fn test_validate_clamps() {
        let mut config = Config {
            playback: PlaybackConfig {
                initial_pitch: 5.0,
                initial_speed: 0.0,
                position_interval_ms: 0,
            },
            reverse: ReverseConfig { worker_threads: 0 },
        };
        config.validate();

        assert_eq!(config.playback.initial_pitch, 2.0);
        assert_eq!(config.playback.initial_speed, 0.25);
        assert_eq!(config.playback.position_interval_ms, 10);
        assert_eq!(config.reverse.worker_threads, 1);
    }
}
