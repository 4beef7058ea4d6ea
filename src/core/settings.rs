//! Per-target protection settings.
//!
//! A [`TargetConfiguration`] answers one question for the filter: which
//! plugins (and with which parameters) apply to this definition? It is built
//! once, before the run, by a [`TargetConfigurationBuilder`] and then frozen
//! behind an `Arc`; nothing can change it while stages execute.
//!
//! Resolution rule:
//! - an explicit override for the definition wins;
//! - otherwise the default settings apply if the definition was in the
//!   program when the configuration was built, or will be added to it by
//!   the merge stage;
//! - otherwise the definition is out of scope and resolves to nothing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::core::definition::{Definition, DefinitionId};
use crate::core::plugin_id::PluginId;
use crate::core::preset::Preset;
use crate::core::program::Program;
use crate::pipeline::errors::ConfigurationError;
use crate::pipeline::PluginRegistry;

/// Plugin-defined key/value parameters.
pub type PluginParameters = BTreeMap<String, String>;

/// The resolved settings of one definition: which plugins apply, with what
/// parameters. The key set is the definition's scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectionSettings {
    plugins: BTreeMap<PluginId, PluginParameters>,
}

impl ProtectionSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin to the scope, replacing its parameters if present.
    pub fn enable(&mut self, plugin: PluginId, params: PluginParameters) {
        self.plugins.insert(plugin, params);
    }

    /// Builder-style [`enable`](Self::enable).
    pub fn with(mut self, plugin: impl Into<PluginId>, params: PluginParameters) -> Self {
        self.enable(plugin.into(), params);
        self
    }

    /// Remove a plugin from the scope.
    pub fn disable(&mut self, plugin: PluginId) -> bool {
        self.plugins.remove(&plugin).is_some()
    }

    pub fn get(&self, plugin: PluginId) -> Option<&PluginParameters> {
        self.plugins.get(&plugin)
    }

    /// Check whether `plugin` is requested by these settings.
    pub fn contains(&self, plugin: PluginId) -> bool {
        self.plugins.contains_key(&plugin)
    }

    /// Plugins in scope, ordered by id.
    pub fn plugins(&self) -> impl Iterator<Item = PluginId> + '_ {
        self.plugins.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// Frozen default + override settings for one run.
#[derive(Debug, Clone, Default)]
pub struct TargetConfiguration {
    default: ProtectionSettings,
    in_scope: HashSet<DefinitionId>,
    overrides: HashMap<DefinitionId, ProtectionSettings>,
}

impl TargetConfiguration {
    /// Resolve the settings of a definition.
    ///
    /// Returns `None` only for definitions that are out of scope.
    pub fn resolve(&self, def: DefinitionId) -> Option<&ProtectionSettings> {
        self.overrides
            .get(&def)
            .or_else(|| self.in_scope.contains(&def).then_some(&self.default))
    }

    /// Check whether a definition has resolvable settings.
    pub fn is_in_scope(&self, def: DefinitionId) -> bool {
        self.overrides.contains_key(&def) || self.in_scope.contains(&def)
    }

    pub fn default_settings(&self) -> &ProtectionSettings {
        &self.default
    }

    /// Number of definitions with resolvable settings.
    pub fn scope_len(&self) -> usize {
        self.in_scope
            .iter()
            .chain(self.overrides.keys())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Builds a [`TargetConfiguration`] against a registry's known plugins.
#[derive(Debug)]
pub struct TargetConfigurationBuilder<'r> {
    registry: &'r PluginRegistry,
    default: ProtectionSettings,
    in_scope: HashSet<DefinitionId>,
    overrides: HashMap<DefinitionId, ProtectionSettings>,
}

impl<'r> TargetConfigurationBuilder<'r> {
    /// Create a builder with an empty default and nothing in scope.
    pub fn new(registry: &'r PluginRegistry) -> Self {
        TargetConfigurationBuilder {
            registry,
            default: ProtectionSettings::new(),
            in_scope: HashSet::new(),
            overrides: HashMap::new(),
        }
    }

    /// Enable every registered plugin that `preset` covers in the default
    /// settings, with empty parameters.
    pub fn with_preset(&mut self, preset: Preset) -> &mut Self {
        for plugin in self.registry.plugins_in_preset(preset) {
            self.default
                .plugins
                .entry(plugin)
                .or_default();
        }
        self
    }

    /// Enable a plugin in the default settings.
    pub fn enable(
        &mut self,
        plugin: impl Into<PluginId>,
        params: PluginParameters,
    ) -> Result<&mut Self, ConfigurationError> {
        let plugin = self.known(plugin.into(), "default settings")?;
        self.default.enable(plugin, params);
        Ok(self)
    }

    /// Remove a plugin from the default settings.
    pub fn disable(
        &mut self,
        plugin: impl Into<PluginId>,
    ) -> Result<&mut Self, ConfigurationError> {
        let plugin = self.known(plugin.into(), "default settings")?;
        self.default.disable(plugin);
        Ok(self)
    }

    /// Put definitions in scope of the default settings.
    pub fn include(&mut self, defs: impl IntoIterator<Item = Definition>) -> &mut Self {
        self.in_scope.extend(defs.into_iter().map(|d| d.id));
        self
    }

    /// Put every definition of `program` in scope of the default settings.
    pub fn include_program(&mut self, program: &dyn Program) -> &mut Self {
        self.include(program.all_definitions())
    }

    /// Replace the settings of one definition.
    pub fn override_definition(
        &mut self,
        def: DefinitionId,
        settings: ProtectionSettings,
    ) -> Result<&mut Self, ConfigurationError> {
        for plugin in settings.plugins() {
            self.known(plugin, &format!("override for definition {}", def))?;
        }
        self.overrides.insert(def, settings);
        Ok(self)
    }

    /// Keep a definition in scope but request no plugins for it.
    pub fn exclude(&mut self, def: DefinitionId) -> &mut Self {
        self.overrides.insert(def, ProtectionSettings::new());
        self
    }

    /// The default settings as currently configured.
    pub fn default_settings(&self) -> &ProtectionSettings {
        &self.default
    }

    /// Freeze the configuration.
    pub fn build(self) -> Arc<TargetConfiguration> {
        tracing::debug!(
            default_plugins = self.default.len(),
            in_scope = self.in_scope.len(),
            overrides = self.overrides.len(),
            "target configuration frozen"
        );

        Arc::new(TargetConfiguration {
            default: self.default,
            in_scope: self.in_scope,
            overrides: self.overrides,
        })
    }

    fn known(&self, plugin: PluginId, referenced_by: &str) -> Result<PluginId, ConfigurationError> {
        if self.registry.contains(plugin) {
            Ok(plugin)
        } else {
            Err(ConfigurationError::UnknownPlugin {
                plugin: plugin.to_string(),
                referenced_by: referenced_by.to_string(),
            })
        }
    }
}
