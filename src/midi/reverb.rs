//! Reverb presets understood by the synthesizer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reverb preset, passed to the synthesizer as an integer code.
///
/// `Off` is `-1`; the room presets count up from `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReverbPreset {
    Off,
    LargeHall,
    Hall,
    Chamber,
    Room,
}

impl ReverbPreset {
    /// All presets in code order.
    pub const ALL: [ReverbPreset; 5] = [
        ReverbPreset::Off,
        ReverbPreset::LargeHall,
        ReverbPreset::Hall,
        ReverbPreset::Chamber,
        ReverbPreset::Room,
    ];

    /// Returns the integer code for this preset.
    pub fn code(self) -> i32 {
        match self {
            ReverbPreset::Off => -1,
            ReverbPreset::LargeHall => 0,
            ReverbPreset::Hall => 1,
            ReverbPreset::Chamber => 2,
            ReverbPreset::Room => 3,
        }
    }

    /// Looks up a preset by integer code.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.code() == code)
    }

    /// Short lowercase name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            ReverbPreset::Off => "off",
            ReverbPreset::LargeHall => "large_hall",
            ReverbPreset::Hall => "hall",
            ReverbPreset::Chamber => "chamber",
            ReverbPreset::Room => "room",
        }
    }
}

impl Default for ReverbPreset {
    fn default() -> Self {
        ReverbPreset::Chamber
    }
}

impl fmt::Display for ReverbPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReverbPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|p| p.name() == normalized)
            .ok_or_else(|| format!("unknown reverb preset: {}", s))
    }
}
