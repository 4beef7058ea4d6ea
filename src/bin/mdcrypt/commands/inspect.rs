//! `mdcrypt inspect` command

use anyhow::Result;

use crate::cli::{InspectArgs, MessageFormat};
use mdcrypt::ops::{describe_program, load_program, resolve_configuration};
use mdcrypt::plugins::builtin_registry;
use mdcrypt::util::ProjectConfig;
use mdcrypt::PipelineError;

pub fn execute(args: InspectArgs) -> Result<()> {
    let program = load_program(&args.program)?;

    let configuration = match &args.config {
        Some(path) => {
            let config = ProjectConfig::load(path)?;
            let registry = builtin_registry().map_err(PipelineError::from)?;
            Some(resolve_configuration(&registry, &program, &config).map_err(PipelineError::from)?)
        }
        None => None,
    };

    let rows = describe_program(&program, configuration.as_deref());

    for row in &rows {
        match args.message_format {
            MessageFormat::Json => println!("{}", serde_json::to_string(row)?),
            MessageFormat::Human => {
                let indent = "  ".repeat(row.depth);
                match &row.plugins {
                    Some(plugins) if plugins.is_empty() => {
                        println!("{}{} [{}] -", indent, row.path, row.kind)
                    }
                    Some(plugins) => println!(
                        "{}{} [{}] {}",
                        indent,
                        row.path,
                        row.kind,
                        plugins.join(", ")
                    ),
                    None => println!("{}{} [{}]", indent, row.path, row.kind),
                }
            }
        }
    }

    Ok(())
}
