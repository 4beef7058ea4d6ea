//! Protection presets.

use serde::{Deserialize, Serialize};

/// Coarse tier describing how aggressively a plugin is applied by default.
///
/// Tiers are totally ordered; selecting a preset enables every plugin whose
/// own preset is at or below it (plugins in [`Preset::None`] are never
/// enabled by a preset).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Not part of any preset.
    #[default]
    None,
    /// Basic protection.
    Minimum,
    /// Normal protection for public releases.
    Normal,
    /// Stronger protection with an observable performance cost.
    Aggressive,
    /// Strongest protection, possibly breaking compatibility.
    Maximum,
}

impl Preset {
    /// All presets in ascending order.
    pub const ALL: [Preset; 5] = [
        Preset::None,
        Preset::Minimum,
        Preset::Normal,
        Preset::Aggressive,
        Preset::Maximum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::None => "none",
            Preset::Minimum => "minimum",
            Preset::Normal => "normal",
            Preset::Aggressive => "aggressive",
            Preset::Maximum => "maximum",
        }
    }

    /// Whether a plugin declared in `plugin_preset` is enabled when this
    /// preset is selected.
    pub fn enables(self, plugin_preset: Preset) -> bool {
        plugin_preset != Preset::None && plugin_preset <= self
    }
}

impl std::str::FromStr for Preset {
    type Err = PresetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Preset::None),
            "minimum" | "min" => Ok(Preset::Minimum),
            "normal" => Ok(Preset::Normal),
            "aggressive" => Ok(Preset::Aggressive),
            "maximum" | "max" => Ok(Preset::Maximum),
            _ => Err(PresetParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an invalid preset name.
#[derive(Debug, Clone)]
pub struct PresetParseError(pub String);

impl std::fmt::Display for PresetParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid preset '{}', valid values: none, minimum, normal, aggressive, maximum",
            self.0
        )
    }
}

impl std::error::Error for PresetParseError {}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}
