//! Pipeline error types and diagnostics.

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::core::plugin_id::PluginId;
use crate::pipeline::stage::Stage;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Invalid plugin set or run configuration, detected before any stage runs.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ConfigurationError {
    #[error("plugin ordering constraints form a cycle")]
    #[diagnostic(
        code(mdcrypt::registry::cycle),
        help("Remove one of the before/after constraints between these plugins")
    )]
    Cycle { plugins: Vec<PluginId> },

    #[error("unknown plugin `{plugin}` referenced by {referenced_by}")]
    #[diagnostic(code(mdcrypt::registry::unknown_plugin))]
    UnknownPlugin {
        plugin: String,
        referenced_by: String,
    },

    #[error("plugin `{plugin}` is registered more than once")]
    #[diagnostic(code(mdcrypt::registry::duplicate_plugin))]
    DuplicatePlugin { plugin: PluginId },

    #[error("invalid override pattern `{pattern}`: {message}")]
    #[diagnostic(code(mdcrypt::config::invalid_pattern))]
    InvalidPattern { pattern: String, message: String },
}

impl ConfigurationError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ConfigurationError::Cycle { plugins } => {
                let names: Vec<&str> = plugins.iter().map(|p| p.as_str()).collect();
                Diagnostic::error("plugin ordering constraints form a cycle")
                    .with_context(format!("cycle: {}", names.join(" -> ")))
                    .with_suggestion(
                        "Remove one of the before/after constraints between these plugins",
                    )
            }

            ConfigurationError::UnknownPlugin {
                plugin,
                referenced_by,
            } => Diagnostic::error(format!("unknown plugin `{}`", plugin))
                .with_context(format!("referenced by {}", referenced_by))
                .with_suggestion("Run `mdcrypt plugins` to list the registered plugins"),

            ConfigurationError::DuplicatePlugin { plugin } => {
                Diagnostic::error(format!("plugin `{}` is registered more than once", plugin))
            }

            ConfigurationError::InvalidPattern { pattern, message } => {
                Diagnostic::error(format!("invalid override pattern `{}`", pattern))
                    .with_context(message.clone())
                    .with_suggestion(suggestions::CHECK_CONFIG)
            }
        }
    }
}

/// Raised at a cancellation checkpoint once cancellation was requested.
///
/// Phases propagate it with `?`; the executor recognises it and reports the
/// run as cancelled instead of failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("protection run was cancelled")]
pub struct Cancelled;

/// Why a run did not complete.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("protection run was cancelled")]
    Cancelled,

    /// A phase or built-in stage action failed. `phase` is `None` for the
    /// built-in action.
    #[error("{} failed during stage `{stage}`", describe(.phase))]
    Transformation {
        stage: Stage,
        phase: Option<String>,
        #[source]
        source: anyhow::Error,
    },

    /// A condition that indicates a scheduler bug, never a user error.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

fn describe(phase: &Option<String>) -> String {
    match phase {
        Some(name) => format!("phase `{}`", name),
        None => "built-in action".to_string(),
    }
}

impl From<Cancelled> for PipelineError {
    fn from(_: Cancelled) -> Self {
        PipelineError::Cancelled
    }
}

impl PipelineError {
    /// Whether the run stopped because cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }

    /// Wrap an error escaping a phase or built-in action.
    ///
    /// A cancellation raised from inside the phase stays a cancellation and
    /// an internal invariant violation passes through unchanged. Anything
    /// else, including a nested pipeline failure, is reported against this
    /// stage and phase.
    pub(crate) fn from_phase(stage: Stage, phase: Option<&str>, err: anyhow::Error) -> Self {
        if err.downcast_ref::<Cancelled>().is_some() {
            return PipelineError::Cancelled;
        }
        let source = match err.downcast::<PipelineError>() {
            Ok(PipelineError::Cancelled) => return PipelineError::Cancelled,
            Ok(PipelineError::InternalInvariant(message)) => {
                return PipelineError::InternalInvariant(message)
            }
            Ok(inner) => anyhow::Error::new(inner),
            Err(err) => err,
        };
        PipelineError::Transformation {
            stage,
            phase: phase.map(str::to_string),
            source,
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            PipelineError::Configuration(err) => err.to_diagnostic(),

            PipelineError::Cancelled => Diagnostic::warning("protection run was cancelled"),

            PipelineError::Transformation {
                stage,
                phase,
                source,
            } => {
                let mut diag = Diagnostic::error(format!(
                    "{} failed during stage `{}`",
                    describe(phase),
                    stage
                ));
                for cause in source.chain() {
                    diag = diag.with_context(cause.to_string());
                }
                diag.with_suggestion(suggestions::RUN_VERBOSE)
            }

            PipelineError::InternalInvariant(message) => {
                Diagnostic::error(format!("internal invariant violated: {}", message))
                    .with_context("this is a bug in mdcrypt or one of its plugins")
            }
        }
    }
}
