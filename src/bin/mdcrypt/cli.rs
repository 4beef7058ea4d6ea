//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use mdcrypt::Preset;

/// mdcrypt - A staged protection pipeline for managed program modules
#[derive(Parser)]
#[command(name = "mdcrypt")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the pipeline stages in execution order
    Stages,

    /// List the registered plugins in initialization order
    Plugins(PluginsArgs),

    /// Validate a project configuration file
    Check(CheckArgs),

    /// List the definitions of a program
    Inspect(InspectArgs),

    /// Run the protection pipeline over a program
    Run(RunArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    #[default]
    Human,
    /// One JSON object per line on stdout
    Json,
}

#[derive(Args)]
pub struct PluginsArgs {
    /// Mark the plugins this preset enables
    #[arg(long)]
    pub preset: Option<Preset>,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Project configuration file
    pub config: PathBuf,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Program description (JSON)
    pub program: PathBuf,

    /// Show the plugins each definition resolves to under this configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,
}

#[derive(Args)]
pub struct RunArgs {
    /// Program description (JSON)
    pub program: PathBuf,

    /// Project configuration file
    #[arg(short, long, env = "MDCRYPT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "protected")]
    pub out: PathBuf,

    /// Additional program descriptions merged into the main one
    #[arg(long)]
    pub merge: Vec<PathBuf>,

    /// Cancel the run after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub time_limit: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
