//! Project configuration file support.
//!
//! A project file selects a preset, adjusts individual plugins, and scopes
//! plugins to definitions through path patterns:
//!
//! ```toml
//! [project]
//! preset = "normal"
//!
//! [plugins.rename]
//! mode = "ascii"
//!
//! [plugins.anti-debug]
//! enabled = false
//!
//! [[override]]
//! pattern = "^App\\.Secret"
//! plugins = ["constants"]
//! ```
//!
//! Later override rules win over earlier ones for the same definition.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::plugin_id::PluginId;
use crate::core::preset::Preset;
use crate::core::program::Program;
use crate::core::settings::{PluginParameters, ProtectionSettings, TargetConfigurationBuilder};
use crate::pipeline::errors::ConfigurationError;

/// Parsed project file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub project: ProjectSection,

    /// Per-plugin sections, keyed by plugin id
    pub plugins: BTreeMap<String, PluginSection>,

    /// Override rules, applied in order
    #[serde(rename = "override")]
    pub overrides: Vec<OverrideRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSection {
    /// Preset seeding the default settings
    pub preset: Preset,
}

/// One `[plugins.<id>]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSection {
    /// Set to `false` to remove the plugin from the default settings
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Every other key is a plugin parameter
    #[serde(flatten)]
    pub parameters: BTreeMap<String, toml::Value>,
}

fn default_enabled() -> bool {
    true
}

impl Default for PluginSection {
    fn default() -> Self {
        PluginSection {
            enabled: true,
            parameters: BTreeMap::new(),
        }
    }
}

impl PluginSection {
    /// Parameters as the string map plugins receive.
    pub fn plugin_parameters(&self) -> PluginParameters {
        self.parameters
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect()
    }
}

/// One `[[override]]` rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRule {
    /// Regex matched against definition paths
    pub pattern: String,

    /// Exact plugin scope of matching definitions; empty excludes them
    #[serde(default)]
    pub plugins: Vec<String>,
}

impl FromStr for ProjectConfig {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        toml::from_str(s)
    }
}

impl ProjectConfig {
    /// Load a project file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read project config: {}", path.display()))?;

        contents
            .parse()
            .with_context(|| format!("failed to parse project config: {}", path.display()))
    }

    /// Load a project file, falling back to defaults if it doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!(
                    "Failed to load project config from {}: {:#}",
                    path.display(),
                    e
                );
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Parameters configured for `plugin`, empty when it has no section.
    pub fn parameters_of(&self, plugin: &str) -> PluginParameters {
        self.plugins
            .get(plugin)
            .map(PluginSection::plugin_parameters)
            .unwrap_or_default()
    }

    /// Compile every override pattern.
    pub fn compile_rules(&self) -> Result<Vec<(Regex, &OverrideRule)>, ConfigurationError> {
        self.overrides
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|re| (re, rule))
                    .map_err(|e| ConfigurationError::InvalidPattern {
                        pattern: rule.pattern.clone(),
                        message: e.to_string(),
                    })
            })
            .collect()
    }

    /// Seed the default settings from the preset, then apply the plugin
    /// sections.
    pub fn apply_defaults(
        &self,
        builder: &mut TargetConfigurationBuilder<'_>,
    ) -> Result<(), ConfigurationError> {
        builder.with_preset(self.project.preset);

        for (id, section) in &self.plugins {
            if section.enabled {
                builder.enable(id.as_str(), section.plugin_parameters())?;
            } else {
                builder.disable(id.as_str())?;
            }
        }
        Ok(())
    }

    /// Apply this file to a configuration builder.
    ///
    /// Sets up the default settings, then turns every override rule into
    /// definition overrides for the definitions of `program` whose path
    /// matches.
    pub fn apply(
        &self,
        builder: &mut TargetConfigurationBuilder<'_>,
        program: &dyn Program,
    ) -> Result<(), ConfigurationError> {
        self.apply_defaults(builder)?;

        let rules = self.compile_rules()?;
        if rules.is_empty() {
            return Ok(());
        }

        let paths: Vec<_> = program
            .all_definitions()
            .into_iter()
            .filter_map(|def| program.path_of(def.id).map(|path| (def, path)))
            .collect();

        for (re, rule) in rules {
            let settings = rule.plugins.iter().fold(ProtectionSettings::new(), |s, id| {
                s.with(PluginId::new(id), self.parameters_of(id))
            });

            let mut matched = 0usize;
            for (def, path) in paths.iter().filter(|(_, path)| re.is_match(path)) {
                tracing::trace!(rule = %rule.pattern, "override applies to {}", path);
                builder.override_definition(def.id, settings.clone())?;
                matched += 1;
            }

            if matched == 0 {
                tracing::warn!("override pattern `{}` matched no definitions", rule.pattern);
            } else {
                tracing::debug!(
                    rule = %rule.pattern,
                    matched,
                    plugins = %rule.plugins.join(", "),
                    "override rule applied"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{registry_of, sample_program, TestPlugin};

    const PROJECT: &str = r#"
        [project]
        preset = "normal"

        [plugins.rename]
        mode = "ascii"
        rounds = 3

        [plugins.anti-debug]
        enabled = false

        [[override]]
        pattern = "^App\\.Secret"
        plugins = ["rename"]

        [[override]]
        pattern = "::Main$"
        plugins = []
    "#;

    fn registry() -> crate::pipeline::PluginRegistry {
        registry_of(vec![
            TestPlugin::new("anti-debug").with_preset(crate::core::preset::Preset::Minimum),
            TestPlugin::new("constants").with_preset(crate::core::preset::Preset::Normal),
            TestPlugin::new("rename"),
        ])
    }

    #[test]
    fn test_parse() {
        let config: ProjectConfig = PROJECT.parse().unwrap();

        assert_eq!(config.project.preset, Preset::Normal);
        assert!(!config.plugins["anti-debug"].enabled);

        let params = config.parameters_of("rename");
        assert_eq!(params["mode"], "ascii");
        assert_eq!(params["rounds"], "3");
        assert!(!params.contains_key("enabled"));
        assert!(config.parameters_of("missing").is_empty());

        assert_eq!(config.overrides.len(), 2);
        assert!(config.overrides[1].plugins.is_empty());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: ProjectConfig = "".parse().unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert_eq!(config.project.preset, Preset::None);
    }

    #[test]
    fn test_apply_seeds_default_and_overrides() {
        let registry = registry();
        let program = sample_program();
        let config: ProjectConfig = PROJECT.parse().unwrap();

        let mut builder = TargetConfigurationBuilder::new(&registry);
        builder.include_program(&program);
        config.apply(&mut builder, &program).unwrap();
        let configuration = builder.build();

        let default: Vec<_> = configuration.default_settings().plugins().collect();
        assert_eq!(default, [PluginId::new("constants"), PluginId::new("rename")]);

        let secret = program.find("App.Secret").unwrap();
        let settings = configuration.resolve(secret.id).unwrap();
        assert_eq!(settings.len(), 1);
        assert_eq!(settings.get(PluginId::new("rename")).unwrap()["mode"], "ascii");

        // Members of App.Secret match the pattern too.
        let key = program.find("App.Secret::key").unwrap();
        assert_eq!(configuration.resolve(key.id).unwrap().len(), 1);

        let main = program.find("App.Program::Main").unwrap();
        assert!(configuration.resolve(main.id).unwrap().is_empty());

        let util = program.find("Lib.Util").unwrap();
        assert_eq!(configuration.resolve(util.id).unwrap().len(), 2);
        assert_eq!(program.all_definitions().len(), configuration.scope_len());
    }

    #[test]
    fn test_invalid_pattern() {
        let registry = registry();
        let program = sample_program();
        let config: ProjectConfig = "[[override]]\npattern = \"(\"\n".parse().unwrap();

        let mut builder = TargetConfigurationBuilder::new(&registry);
        let err = config.apply(&mut builder, &program).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidPattern { .. }));
    }

    #[test]
    fn test_unknown_plugin_in_rule() {
        let registry = registry();
        let program = sample_program();
        let config: ProjectConfig = "[[override]]\npattern = \"Lib\"\nplugins = [\"ghost\"]\n"
            .parse()
            .unwrap();

        let mut builder = TargetConfigurationBuilder::new(&registry);
        let err = config.apply(&mut builder, &program).unwrap_err();
        match err {
            ConfigurationError::UnknownPlugin { plugin, .. } => assert_eq!(plugin, "ghost"),
            other => panic!("expected unknown plugin, got {:?}", other),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("protect.toml");

        assert!(ProjectConfig::load(&path).is_err());
        assert_eq!(ProjectConfig::load_or_default(&path), ProjectConfig::default());

        std::fs::write(&path, "[project]\npreset = \"max\"\n").unwrap();
        // "max" is only accepted by the command line parser.
        assert!(ProjectConfig::load(&path).is_err());

        std::fs::write(&path, "[project]\npreset = \"maximum\"\n").unwrap();
        assert_eq!(ProjectConfig::load(&path).unwrap().project.preset, Preset::Maximum);
    }
}
