//! mdcrypt - A staged protection pipeline for managed program modules
//!
//! This crate provides the scheduler that runs protection plugins over a
//! loaded program: plugin registration and ordering, the fixed stage
//! pipeline, per-definition target selection, and cooperative cancellation.

pub mod core;
pub mod ops;
pub mod pipeline;
pub mod plugins;
pub mod program;
pub mod util;

/// Scripted plugins, recording phases and sample programs for unit tests.
#[cfg(test)]
pub mod test_support;

pub use core::{
    definition::{Definition, DefinitionId, DefinitionKind, KindMask},
    phase::{Phase, PhaseParameters},
    plugin::Plugin,
    plugin_id::PluginId,
    preset::Preset,
    program::Program,
    settings::{ProtectionSettings, TargetConfiguration, TargetConfigurationBuilder},
};

pub use ops::Engine;
pub use pipeline::{
    CancellationToken, ExecutionContext, PipelineError, PipelineScope, PluginRegistry, Slot, Stage,
};
pub use program::ProgramTree;
