//! Implementation of `mdcrypt inspect` and `mdcrypt check`.

use std::sync::Arc;

use serde::Serialize;

use crate::core::definition::{Definition, DefinitionKind};
use crate::core::program::Program;
use crate::core::settings::{TargetConfiguration, TargetConfigurationBuilder};
use crate::pipeline::{ConfigurationError, PluginRegistry};
use crate::util::config::ProjectConfig;

/// One line of `mdcrypt inspect` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionRow {
    pub path: String,
    pub kind: DefinitionKind,
    /// Depth below the module unit
    pub depth: usize,
    /// Plugins requested for this definition, when a configuration is given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugins: Option<Vec<String>>,
}

/// Freeze the configuration a project file produces for `program`.
pub fn resolve_configuration(
    registry: &PluginRegistry,
    program: &dyn Program,
    config: &ProjectConfig,
) -> Result<Arc<TargetConfiguration>, ConfigurationError> {
    let mut builder = TargetConfigurationBuilder::new(registry);
    builder.include_program(program);
    config.apply(&mut builder, program)?;
    Ok(builder.build())
}

/// List every definition of `program`, module by module.
pub fn describe_program(
    program: &dyn Program,
    configuration: Option<&TargetConfiguration>,
) -> Vec<DefinitionRow> {
    program
        .all_definitions()
        .into_iter()
        .map(|def| row(program, def, configuration))
        .collect()
}

fn row(
    program: &dyn Program,
    def: Definition,
    configuration: Option<&TargetConfiguration>,
) -> DefinitionRow {
    let path = program
        .path_of(def.id)
        .unwrap_or_else(|| def.id.to_string());
    let depth = match def.kind {
        DefinitionKind::Module => 0,
        _ => path.matches('/').count() + path.matches("::").count() + 1,
    };
    let plugins = configuration.map(|c| {
        c.resolve(def.id)
            .map(|settings| settings.plugins().map(|p| p.to_string()).collect())
            .unwrap_or_default()
    });

    DefinitionRow {
        path,
        kind: def.kind,
        depth,
        plugins,
    }
}

/// Summary of a project file against a registry, for `mdcrypt check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSummary {
    pub preset: String,
    /// Plugins enabled in the default settings, with their parameters
    pub default_plugins: Vec<(String, Vec<String>)>,
    /// `(pattern, plugins)` for every override rule
    pub rules: Vec<(String, Vec<String>)>,
}

/// Validate a project file without a program.
///
/// Checks that every referenced plugin is registered and that every
/// pattern compiles.
pub fn check_config(
    registry: &PluginRegistry,
    config: &ProjectConfig,
) -> Result<ConfigSummary, ConfigurationError> {
    let mut builder = TargetConfigurationBuilder::new(registry);
    config.apply_defaults(&mut builder)?;

    let rules = config.compile_rules()?;
    for (_, rule) in &rules {
        for plugin in &rule.plugins {
            if !registry.contains(plugin.as_str().into()) {
                return Err(ConfigurationError::UnknownPlugin {
                    plugin: plugin.clone(),
                    referenced_by: format!("override rule `{}`", rule.pattern),
                });
            }
        }
    }

    let default_plugins = builder
        .default_settings()
        .plugins()
        .map(|id| {
            let params = builder
                .default_settings()
                .get(id)
                .map(|p| p.iter().map(|(k, v)| format!("{}={}", k, v)).collect())
                .unwrap_or_default();
            (id.to_string(), params)
        })
        .collect();

    Ok(ConfigSummary {
        preset: config.project.preset.to_string(),
        default_plugins,
        rules: rules
            .iter()
            .map(|(_, rule)| (rule.pattern.clone(), rule.plugins.clone()))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::preset::Preset;
    use crate::test_support::{registry_of, sample_program, TestPlugin};

    fn registry() -> PluginRegistry {
        registry_of(vec![
            TestPlugin::new("constants").with_preset(Preset::Normal),
            TestPlugin::new("rename").with_preset(Preset::Aggressive),
        ])
    }

    #[test]
    fn test_describe_without_configuration() {
        let program = sample_program();
        let rows = describe_program(&program, None);

        assert_eq!(rows.len(), 12);
        assert_eq!(rows[0].path, "App");
        assert_eq!(rows[0].depth, 0);
        assert_eq!(rows[1].path, "App.Program");
        assert_eq!(rows[1].depth, 1);
        assert_eq!(rows[2].path, "App.Program::Main");
        assert_eq!(rows[2].depth, 2);
        assert!(rows.iter().all(|r| r.plugins.is_none()));
    }

    #[test]
    fn test_describe_with_configuration() {
        let registry = registry();
        let program = sample_program();
        let config: ProjectConfig = concat!(
            "[project]\npreset = \"normal\"\n\n",
            "[[override]]\npattern = \"^Lib\"\nplugins = [\"rename\"]\n",
        )
        .parse()
        .unwrap();

        let configuration = resolve_configuration(&registry, &program, &config).unwrap();
        let rows = describe_program(&program, Some(configuration.as_ref()));

        let app = rows.iter().find(|r| r.path == "App").unwrap();
        assert_eq!(app.plugins.as_deref(), Some(&["constants".to_string()][..]));
        let util = rows.iter().find(|r| r.path == "Lib.Util").unwrap();
        assert_eq!(util.plugins.as_deref(), Some(&["rename".to_string()][..]));
    }

    #[test]
    fn test_check_config_summary() {
        let config: ProjectConfig = concat!(
            "[project]\npreset = \"aggressive\"\n\n",
            "[plugins.rename]\nmode = \"ascii\"\n\n",
            "[[override]]\npattern = \"Secret\"\nplugins = []\n",
        )
        .parse()
        .unwrap();

        let summary = check_config(&registry(), &config).unwrap();
        assert_eq!(summary.preset, "aggressive");
        assert_eq!(
            summary.default_plugins,
            [
                ("constants".to_string(), vec![]),
                ("rename".to_string(), vec!["mode=ascii".to_string()])
            ]
        );
        assert_eq!(summary.rules, [("Secret".to_string(), vec![])]);
    }

    #[test]
    fn test_check_config_rejects_unknown_rule_plugin() {
        let config: ProjectConfig = "[[override]]\npattern = \"x\"\nplugins = [\"ghost\"]\n"
            .parse()
            .unwrap();

        let err = check_config(&registry(), &config).unwrap_err();
        assert!(err.to_string().contains("override rule `x`"));
    }
}
