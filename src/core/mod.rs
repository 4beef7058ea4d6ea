//! Core data structures for mdcrypt.
//!
//! This module contains the foundational types the scheduler is built on:
//! - Definition handles and kind masks
//! - Interned plugin ids and presets
//! - The plugin, phase and program capability traits
//! - Per-definition protection settings

pub mod definition;
pub mod phase;
pub mod plugin;
pub mod plugin_id;
pub mod preset;
pub mod program;
pub mod settings;

pub use definition::{Definition, DefinitionId, DefinitionKind, KindMask};
pub use phase::{Phase, PhaseParameters};
pub use plugin::Plugin;
pub use plugin_id::PluginId;
pub use preset::Preset;
pub use program::Program;
pub use settings::{
    PluginParameters, ProtectionSettings, TargetConfiguration, TargetConfigurationBuilder,
};
