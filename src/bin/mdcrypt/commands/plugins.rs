//! `mdcrypt plugins` command

use anyhow::Result;

use crate::cli::PluginsArgs;
use mdcrypt::plugins::builtin_registry;
use mdcrypt::PipelineError;

pub fn execute(args: PluginsArgs) -> Result<()> {
    let registry = builtin_registry().map_err(PipelineError::from)?;
    let order = registry.resolve_order().map_err(PipelineError::from)?;

    for id in order {
        let Some(plugin) = registry.get(id) else {
            continue;
        };
        let marker = match args.preset {
            Some(preset) if preset.enables(plugin.preset()) => "*",
            _ => " ",
        };
        println!(
            "{} {:<12} {:<10} {}",
            marker,
            id,
            plugin.preset(),
            plugin.description()
        );
    }
    Ok(())
}
