//! Driver settings and the runtime configuration snapshot.

use crate::midi::ReverbPreset;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

/// Default sample rate for synthesis.
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

/// Default synthesizer block size in frames.
pub const DEFAULT_BLOCK_SIZE: usize = 64;

/// Determines how many synthesizer blocks fill one host buffer.
pub const DEFAULT_BUFFERS_PER_RENDER: usize = 4;

/// Default polyphony limit.
pub const DEFAULT_MAX_VOICES: usize = 64;

/// Default master volume (0-100).
pub const DEFAULT_VOLUME: u8 = 90;

/// Default number of buffers in flight on the output device.
pub const DEFAULT_QUEUE_DEPTH: usize = 2;

// Ranges rustysynth accepts when building a synthesizer
const SAMPLE_RATE_RANGE: RangeInclusive<u32> = 16_000..=192_000;
const BLOCK_SIZE_RANGE: RangeInclusive<usize> = 8..=1024;
const MAX_VOICES_RANGE: RangeInclusive<usize> = 8..=256;

/// Read-only snapshot of the synthesizer configuration.
///
/// Captured once per `start()` cycle, right after the synthesizer
/// initializes, and valid from the ready notification onward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Maximum simultaneous voices.
    pub max_voices: u32,
    /// Interleaved output channels.
    pub num_channels: u32,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Frames the synthesizer renders per block.
    pub buffer_frame_count: u32,
}

/// Settings used to build the synthesizer and output ports.
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Synthesizer block size in frames.
    pub block_size: usize,
    /// Synthesizer blocks per host buffer.
    pub buffers_per_render: usize,
    /// Maximum simultaneous voices.
    pub max_voices: usize,
    /// Initial master volume (0-100).
    pub volume: u8,
    /// Initial reverb preset.
    pub reverb: ReverbPreset,
    /// Buffers allowed in flight on the output device before writes block.
    pub queue_depth: usize,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            buffers_per_render: DEFAULT_BUFFERS_PER_RENDER,
            max_voices: DEFAULT_MAX_VOICES,
            volume: DEFAULT_VOLUME,
            reverb: ReverbPreset::default(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl DriverSettings {
    /// Frames in one host buffer.
    pub fn frames_per_render(&self) -> usize {
        self.block_size * self.buffers_per_render
    }

    /// Checks that the settings describe a usable driver.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if !SAMPLE_RATE_RANGE.contains(&self.sample_rate) {
            return Err(format!(
                "sample_rate {} outside {:?}",
                self.sample_rate, SAMPLE_RATE_RANGE
            ));
        }
        if !BLOCK_SIZE_RANGE.contains(&self.block_size) {
            return Err(format!(
                "block_size {} outside {:?}",
                self.block_size, BLOCK_SIZE_RANGE
            ));
        }
        if self.buffers_per_render == 0 {
            return Err("buffers_per_render must be positive".to_string());
        }
        if !MAX_VOICES_RANGE.contains(&self.max_voices) {
            return Err(format!(
                "max_voices {} outside {:?}",
                self.max_voices, MAX_VOICES_RANGE
            ));
        }
        if self.volume > 100 {
            return Err(format!("volume {} exceeds 100", self.volume));
        }
        if self.queue_depth == 0 {
            return Err("queue_depth must be positive".to_string());
        }
        Ok(())
    }

    /// Parses settings from a JSON string and validates them.
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or a field is invalid
    pub fn from_json(json: &str) -> Result<Self, std::io::Error> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        settings
            .validate()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(settings)
    }

    /// Loads settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if file reading, parsing or validation fails
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serializes the settings to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = DriverSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.frames_per_render(), 256);
        assert_eq!(settings.reverb, ReverbPreset::Chamber);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = DriverSettings::from_json(r#"{ "sample_rate": 44100, "reverb": "hall" }"#)
            .unwrap();
        assert_eq!(settings.sample_rate, 44100);
        assert_eq!(settings.reverb, ReverbPreset::Hall);
        assert_eq!(settings.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(settings.volume, DEFAULT_VOLUME);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let err = DriverSettings::from_json(r#"{ "volume": 101 }"#).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);

        assert!(DriverSettings::from_json(r#"{ "block_size": 0 }"#).is_err());
        assert!(DriverSettings::from_json(r#"{ "queue_depth": 0 }"#).is_err());
        assert!(DriverSettings::from_json("not json").is_err());
    }

    #[test]
    fn test_synthesizer_limits() {
        let check = |json: &str| DriverSettings::from_json(json).is_ok();

        assert!(!check(r#"{ "sample_rate": 8000 }"#));
        assert!(check(r#"{ "sample_rate": 16000 }"#));
        assert!(!check(r#"{ "sample_rate": 192001 }"#));

        assert!(!check(r#"{ "block_size": 4 }"#));
        assert!(check(r#"{ "block_size": 8 }"#));
        assert!(check(r#"{ "block_size": 1024 }"#));
        assert!(!check(r#"{ "block_size": 2048 }"#));

        assert!(!check(r#"{ "max_voices": 4 }"#));
        assert!(check(r#"{ "max_voices": 256 }"#));
        assert!(!check(r#"{ "max_voices": 257 }"#));
    }

    #[test]
    fn test_serialization() {
        let settings = DriverSettings {
            max_voices: 16,
            ..Default::default()
        };
        let json = settings.to_json().unwrap();
        let loaded = DriverSettings::from_json(&json).unwrap();
        assert_eq!(loaded, settings);
    }
}
