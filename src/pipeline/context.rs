//! Execution context and cooperative cancellation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::definition::Definition;
use crate::core::program::Program;
use crate::core::settings::TargetConfiguration;
use crate::pipeline::errors::Cancelled;
use crate::pipeline::table::Pipeline;

/// Shared cancellation flag.
///
/// Clones observe the same flag, so a caller can keep one handle and pass
/// another to the run.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next checkpoint.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A serialized output produced by the write, pack or save stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    /// File name relative to the output directory.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl OutputArtifact {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        OutputArtifact {
            name: name.into(),
            bytes,
        }
    }
}

/// State of one protection run.
///
/// The pipeline and target configuration are frozen behind `Arc`s before the
/// executor starts; phases can read them but not change them.
pub struct ExecutionContext {
    program: Box<dyn Program>,
    auxiliary_units: Vec<Box<dyn Program>>,
    pipeline: Arc<Pipeline>,
    configuration: Arc<TargetConfiguration>,
    cancellation: CancellationToken,
    current_module: Option<Definition>,
    outputs: Vec<OutputArtifact>,
}

impl ExecutionContext {
    pub fn new(
        program: Box<dyn Program>,
        pipeline: Arc<Pipeline>,
        configuration: Arc<TargetConfiguration>,
        cancellation: CancellationToken,
    ) -> Self {
        ExecutionContext {
            program,
            auxiliary_units: Vec::new(),
            pipeline,
            configuration,
            cancellation,
            current_module: None,
            outputs: Vec::new(),
        }
    }

    /// Fail with [`Cancelled`] if cancellation has been requested.
    pub fn check_cancellation(&self) -> Result<(), Cancelled> {
        if self.cancellation.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn program(&self) -> &dyn Program {
        self.program.as_ref()
    }

    pub fn program_mut(&mut self) -> &mut dyn Program {
        self.program.as_mut()
    }

    /// Downcast the program to the representation a phase was written for.
    pub fn program_as<T: Program>(&self) -> Option<&T> {
        self.program.as_any().downcast_ref::<T>()
    }

    pub fn program_as_mut<T: Program>(&mut self) -> Option<&mut T> {
        self.program.as_any_mut().downcast_mut::<T>()
    }

    /// Program units to be merged or embedded by the merge stage.
    pub fn auxiliary_units(&self) -> &[Box<dyn Program>] {
        &self.auxiliary_units
    }

    pub fn auxiliary_units_mut(&mut self) -> &mut Vec<Box<dyn Program>> {
        &mut self.auxiliary_units
    }

    /// Take every auxiliary unit, leaving the list empty.
    pub fn take_auxiliary_units(&mut self) -> Vec<Box<dyn Program>> {
        std::mem::take(&mut self.auxiliary_units)
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub(crate) fn pipeline_handle(&self) -> Arc<Pipeline> {
        Arc::clone(&self.pipeline)
    }

    pub fn configuration(&self) -> &TargetConfiguration {
        &self.configuration
    }

    pub(crate) fn configuration_handle(&self) -> Arc<TargetConfiguration> {
        Arc::clone(&self.configuration)
    }

    /// Module unit being processed by the per-module stages.
    pub fn current_module(&self) -> Option<Definition> {
        self.current_module
    }

    pub(crate) fn set_current_module(&mut self, module: Option<Definition>) {
        self.current_module = module;
    }

    pub fn outputs(&self) -> &[OutputArtifact] {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut Vec<OutputArtifact> {
        &mut self.outputs
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("modules", &self.program.modules().len())
            .field("auxiliary_units", &self.auxiliary_units.len())
            .field("phases", &self.pipeline.len())
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("current_module", &self.current_module)
            .field("outputs", &self.outputs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ProgramTree;
    use crate::test_support::sample_program;

    fn context() -> ExecutionContext {
        ExecutionContext::new(
            Box::new(sample_program()),
            Arc::new(Pipeline::new()),
            Arc::new(TargetConfiguration::default()),
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_token_clones_share_flag() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_check_cancellation() {
        let ctx = context();
        assert!(ctx.check_cancellation().is_ok());

        ctx.cancellation_token().cancel();
        assert_eq!(ctx.check_cancellation(), Err(Cancelled));
    }

    #[test]
    fn test_program_downcast() {
        let mut ctx = context();
        assert!(ctx.program_as::<ProgramTree>().is_some());
        assert!(ctx.program_as_mut::<ProgramTree>().is_some());
    }

    #[test]
    fn test_auxiliary_units_are_consumed() {
        let mut ctx = context();
        ctx.auxiliary_units_mut().push(Box::new(ProgramTree::new()));
        assert_eq!(ctx.auxiliary_units().len(), 1);

        let taken = ctx.take_auxiliary_units();
        assert_eq!(taken.len(), 1);
        assert!(ctx.auxiliary_units().is_empty());
    }
}
