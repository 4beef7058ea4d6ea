//! mdcrypt CLI - runs the protection pipeline over program descriptions

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands, MessageFormat};
use mdcrypt::pipeline::ConfigurationError;
use mdcrypt::util::diagnostic::{self, Diagnostic};
use mdcrypt::util::shell::ColorChoice;
use mdcrypt::util::Shell;
use mdcrypt::PipelineError;

/// Exit code of a cancelled run, as for SIGINT.
const EXIT_CANCELLED: i32 = 130;

fn main() {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("mdcrypt=debug")
    } else if cli.quiet {
        EnvFilter::new("mdcrypt=error")
    } else {
        EnvFilter::new("mdcrypt=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let color = !cli.no_color && std::io::stderr().is_terminal();

    if let Err(e) = run(cli) {
        std::process::exit(report(&e, color));
    }
}

fn run(cli: Cli) -> Result<()> {
    let color = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    // Execute command
    match cli.command {
        Commands::Stages => commands::stages::execute(),
        Commands::Plugins(args) => commands::plugins::execute(args),
        Commands::Check(args) => commands::check::execute(args),
        Commands::Inspect(args) => commands::inspect::execute(args),
        Commands::Run(args) => {
            let json = args.message_format == MessageFormat::Json;
            let shell = Shell::from_flags(cli.quiet, cli.verbose, color, json);
            commands::run::execute(args, shell)
        }
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

/// Print an error and pick the exit code.
fn report(err: &anyhow::Error, color: bool) -> i32 {
    if let Some(e) = err.downcast_ref::<PipelineError>() {
        diagnostic::emit(&e.to_diagnostic(), color);
        return if e.is_cancelled() { EXIT_CANCELLED } else { 1 };
    }
    if let Some(e) = err.downcast_ref::<ConfigurationError>() {
        diagnostic::emit(&e.to_diagnostic(), color);
        return 1;
    }

    let mut diag = Diagnostic::error(err.to_string());
    for cause in err.chain().skip(1) {
        diag = diag.with_context(cause.to_string());
    }
    diagnostic::emit(&diag, color);
    1
}
