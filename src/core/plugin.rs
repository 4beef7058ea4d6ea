//! The plugin capability trait.

use crate::core::plugin_id::PluginId;
use crate::core::preset::Preset;
use crate::pipeline::PipelineScope;

/// A unit of protection logic.
///
/// Plugins are registered explicitly with a
/// [`PluginRegistry`](crate::pipeline::PluginRegistry) and are immutable once
/// registered. During pipeline construction each plugin is given one chance,
/// in resolved initialization order, to insert its phases.
pub trait Plugin {
    /// Stable, globally unique id used in configuration files.
    fn id(&self) -> PluginId;

    /// Display name.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Preset tier this plugin belongs to.
    fn preset(&self) -> Preset {
        Preset::None
    }

    /// Plugins that must initialize after this one.
    fn before(&self) -> Vec<PluginId> {
        Vec::new()
    }

    /// Plugins that must initialize before this one.
    fn after(&self) -> Vec<PluginId> {
        Vec::new()
    }

    /// Insert this plugin's phases into the pipeline.
    fn populate_pipeline(&self, pipeline: &mut PipelineScope<'_>);
}

impl std::fmt::Debug for dyn Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("id", &self.id())
            .field("preset", &self.preset())
            .finish()
    }
}
