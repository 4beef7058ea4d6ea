//! `mdcrypt check` command

use anyhow::Result;

use crate::cli::CheckArgs;
use mdcrypt::ops::check_config;
use mdcrypt::plugins::builtin_registry;
use mdcrypt::util::ProjectConfig;
use mdcrypt::PipelineError;

pub fn execute(args: CheckArgs) -> Result<()> {
    let config = ProjectConfig::load(&args.config)?;
    let registry = builtin_registry().map_err(PipelineError::from)?;
    let summary = check_config(&registry, &config).map_err(PipelineError::from)?;

    println!("preset: {}", summary.preset);

    println!("default plugins:");
    if summary.default_plugins.is_empty() {
        println!("  (none)");
    }
    for (plugin, params) in &summary.default_plugins {
        if params.is_empty() {
            println!("  {}", plugin);
        } else {
            println!("  {} ({})", plugin, params.join(", "));
        }
    }

    if !summary.rules.is_empty() {
        println!("overrides:");
        for (pattern, plugins) in &summary.rules {
            let scope = if plugins.is_empty() {
                "(excluded)".to_string()
            } else {
                plugins.join(", ")
            };
            println!("  /{}/ -> {}", pattern, scope);
        }
    }

    Ok(())
}
