//! The protection pipeline.
//!
//! A run goes through three steps:
//! 1. Plugins are registered and ordered by their before/after constraints
//! 2. Each plugin inserts its phases into the fixed stage table
//! 3. The executor walks the stages, handing each phase its scoped targets

pub mod context;
pub mod errors;
pub mod events;
pub mod executor;
pub mod filter;
pub mod registry;
pub mod stage;
pub mod table;

pub use context::{CancellationToken, ExecutionContext, OutputArtifact};
pub use errors::{Cancelled, ConfigurationError, PipelineError};
pub use events::PipelineEvent;
pub use executor::{NoopActions, RunReport, StageAction, StageExecutor};
pub use filter::TargetFilter;
pub use registry::PluginRegistry;
pub use stage::{Slot, Stage};
pub use table::{PhaseEntry, Pipeline, PipelineScope};
