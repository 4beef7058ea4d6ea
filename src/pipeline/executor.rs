//! Stage executor.
//!
//! Drives one run over the fixed stage sequence: pre phases, the stage's
//! built-in action, post phases, with a cancellation checkpoint around each
//! step. Any error aborts the whole run.

use std::time::{Duration, Instant};

use crate::core::definition::Definition;
use crate::core::phase::PhaseParameters;
use crate::core::program::Program;
use crate::core::settings::TargetConfiguration;
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::errors::PipelineError;
use crate::pipeline::events::PipelineEvent;
use crate::pipeline::filter::TargetFilter;
use crate::pipeline::stage::{Slot, Stage};
use crate::pipeline::table::PhaseEntry;

/// The built-in work of each stage (loading, writing, saving...), supplied
/// by the caller.
pub trait StageAction {
    fn run(&mut self, stage: Stage, ctx: &mut ExecutionContext) -> anyhow::Result<()>;

    /// The program as the Merge action will leave it after folding in
    /// `units`, with the definition ids it will assign.
    ///
    /// The target configuration is built over this view so that merged
    /// definitions resolve like any other. `None` means Merge adds nothing.
    fn merge_preview(
        &self,
        _program: &dyn Program,
        _units: &[Box<dyn Program>],
    ) -> Option<Box<dyn Program>> {
        None
    }
}

impl<F> StageAction for F
where
    F: FnMut(Stage, &mut ExecutionContext) -> anyhow::Result<()>,
{
    fn run(&mut self, stage: Stage, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        self(stage, ctx)
    }
}

/// Built-in actions that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopActions;

impl StageAction for NoopActions {
    fn run(&mut self, _stage: Stage, _ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Module units processed by the per-module stages
    pub modules: usize,
    /// Stage passes entered (per-module stages count once per module)
    pub stages_entered: usize,
    pub phases_executed: usize,
    pub elapsed: Duration,
}

/// Executes a frozen pipeline against an execution context.
pub struct StageExecutor<'a> {
    actions: Box<dyn StageAction + 'a>,
    sink: Option<Box<dyn FnMut(&PipelineEvent) + 'a>>,
}

impl<'a> StageExecutor<'a> {
    /// Create an executor with the given built-in actions.
    pub fn new(actions: impl StageAction + 'a) -> Self {
        StageExecutor {
            actions: Box::new(actions),
            sink: None,
        }
    }

    /// Receive run events.
    pub fn with_events(mut self, sink: impl FnMut(&PipelineEvent) + 'a) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Run every stage in order.
    pub fn run(&mut self, ctx: &mut ExecutionContext) -> Result<RunReport, PipelineError> {
        let start = Instant::now();
        let mut report = RunReport::default();

        self.emit(PipelineEvent::RunStarted {
            modules: ctx.program().modules().len() as u64,
            phases: ctx.pipeline().len() as u64,
        });

        let result = self.run_stages(ctx, &mut report);
        report.elapsed = start.elapsed();

        let outcome = match &result {
            Ok(()) => "completed",
            Err(e) if e.is_cancelled() => "cancelled",
            Err(_) => "failed",
        };
        self.emit(PipelineEvent::RunFinished {
            outcome: outcome.to_string(),
            phases_executed: report.phases_executed as u64,
            duration_ms: report.elapsed.as_millis() as u64,
        });

        match result {
            Ok(()) => {
                tracing::info!(
                    phases = report.phases_executed,
                    modules = report.modules,
                    "protection run completed in {:.2}s",
                    report.elapsed.as_secs_f64()
                );
                Ok(report)
            }
            Err(e) => {
                tracing::debug!(outcome, "protection run stopped: {}", e);
                Err(e)
            }
        }
    }

    fn run_stages(
        &mut self,
        ctx: &mut ExecutionContext,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        self.run_stage(ctx, Stage::Inspection, None, report)?;
        self.run_stage(ctx, Stage::Merge, None, report)?;

        // Merging may add module units, so they are listed afterwards.
        let modules = ctx.program().modules();
        for module in &modules {
            ctx.set_current_module(Some(*module));
            for stage in Stage::PER_MODULE {
                self.run_stage(ctx, stage, Some(*module), report)?;
            }
        }
        ctx.set_current_module(None);
        report.modules = modules.len();

        self.run_stage(ctx, Stage::WriteModule, None, report)?;
        self.run_stage(ctx, Stage::Pack, None, report)?;
        self.run_stage(ctx, Stage::SaveModule, None, report)?;
        Ok(())
    }

    fn run_stage(
        &mut self,
        ctx: &mut ExecutionContext,
        stage: Stage,
        module: Option<Definition>,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        ctx.check_cancellation()?;

        let module_path = module.map(|m| {
            ctx.program()
                .path_of(m.id)
                .unwrap_or_else(|| m.id.to_string())
        });
        match &module_path {
            Some(path) => tracing::debug!("Entering stage '{}' for module '{}'", stage, path),
            None => tracing::debug!("Entering stage '{}'", stage),
        }
        self.emit(PipelineEvent::StageStarted {
            stage,
            module: module_path,
        });
        report.stages_entered += 1;

        let pipeline = ctx.pipeline_handle();
        let configuration = ctx.configuration_handle();

        for entry in pipeline.phases(stage, Slot::Pre) {
            self.run_phase(ctx, &configuration, stage, Slot::Pre, entry, module)?;
            report.phases_executed += 1;
            ctx.check_cancellation()?;
        }

        ctx.check_cancellation()?;
        self.actions
            .run(stage, ctx)
            .map_err(|e| PipelineError::from_phase(stage, None, e))?;
        ctx.check_cancellation()?;

        for entry in pipeline.phases(stage, Slot::Post) {
            self.run_phase(ctx, &configuration, stage, Slot::Post, entry, module)?;
            report.phases_executed += 1;
            ctx.check_cancellation()?;
        }

        self.emit(PipelineEvent::StageFinished { stage });
        Ok(())
    }

    fn run_phase(
        &mut self,
        ctx: &mut ExecutionContext,
        configuration: &TargetConfiguration,
        stage: Stage,
        slot: Slot,
        entry: &PhaseEntry,
        module: Option<Definition>,
    ) -> Result<(), PipelineError> {
        let candidates = match module {
            Some(m) => ctx.program().definitions_of(m.id),
            None => ctx.program().all_definitions(),
        };
        let targets = TargetFilter::new(configuration).filter(entry, &candidates)?;
        let target_count = targets.len();

        tracing::debug!(
            plugin = %entry.owner(),
            targets = target_count,
            "Executing '{}' phase...",
            entry.name()
        );

        let params = PhaseParameters::new(entry.owner(), targets, configuration);
        let start = Instant::now();
        entry
            .phase()
            .execute(ctx, &params)
            .map_err(|e| PipelineError::from_phase(stage, Some(entry.name()), e))?;

        self.emit(PipelineEvent::PhaseFinished {
            stage,
            slot,
            plugin: entry.owner().to_string(),
            phase: entry.name().to_string(),
            targets: target_count as u64,
            duration_ms: start.elapsed().as_millis() as u64,
        });
        Ok(())
    }

    fn emit(&mut self, event: PipelineEvent) {
        if let Some(sink) = self.sink.as_mut() {
            sink(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::error::Error as _;
    use std::rc::Rc;

    use crate::core::definition::{DefinitionKind, KindMask};
    use crate::core::program::Program;
    use crate::program::ProgramTree;
    use crate::test_support::{
        context_for, registry_of, sample_program, ExecutionLog, PhaseFailure, RecordingPhase,
        TestPlugin,
    };

    fn phase(log: &ExecutionLog, name: &str) -> RecordingPhase {
        RecordingPhase::new(name).with_log(log)
    }

    #[test]
    fn test_stage_sequence_with_builtin_actions() {
        let log = ExecutionLog::new();
        let registry = registry_of(vec![TestPlugin::new("a")
            .with_phase(Stage::SaveModule, Slot::Pre, phase(&log, "save-pre"))
            .with_phase(Stage::Inspection, Slot::Post, phase(&log, "inspect-post"))
            .with_phase(Stage::Inspection, Slot::Pre, phase(&log, "inspect-pre"))]);
        let mut ctx = context_for(&registry, sample_program(), |_| {});

        let action_log = log.clone();
        let actions = move |stage: Stage, _: &mut ExecutionContext| -> anyhow::Result<()> {
            if matches!(stage, Stage::Inspection | Stage::SaveModule) {
                action_log.record(&format!("action:{}", stage), Vec::new(), None);
            }
            Ok(())
        };
        let mut executor = StageExecutor::new(actions);
        let report = executor.run(&mut ctx).unwrap();

        assert_eq!(
            log.names(),
            [
                "inspect-pre",
                "action:inspection",
                "inspect-post",
                "save-pre",
                "action:save-module"
            ]
        );
        assert_eq!(report.phases_executed, 3);
        assert_eq!(report.modules, 2);
        // 5 once-per-run stages + 4 per-module stages for each of 2 modules
        assert_eq!(report.stages_entered, 13);
    }

    #[test]
    fn test_per_module_stages_repeat_with_module_targets() {
        let log = ExecutionLog::new();
        let registry = registry_of(vec![TestPlugin::new("a").with_phase(
            Stage::ProcessModule,
            Slot::Pre,
            phase(&log, "process")
                .with_targets(KindMask::MODULES)
                .processing_all(),
        )]);
        let program = sample_program();
        let modules = program.modules();
        let mut ctx = context_for(&registry, program, |_| {});

        StageExecutor::new(NoopActions).run(&mut ctx).unwrap();

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        for (entry, module) in entries.iter().zip(&modules) {
            assert_eq!(entry.module, Some(*module));
            assert_eq!(entry.targets, vec![*module]);
        }
        assert!(ctx.current_module().is_none());
    }

    #[test]
    fn test_insertion_order_is_execution_order() {
        let log = ExecutionLog::new();
        let registry = registry_of(vec![TestPlugin::new("a")
            .with_phase(Stage::WriteModule, Slot::Post, phase(&log, "p1"))
            .with_phase(Stage::WriteModule, Slot::Post, phase(&log, "p2"))]);
        let mut ctx = context_for(&registry, sample_program(), |_| {});

        StageExecutor::new(NoopActions).run(&mut ctx).unwrap();
        assert_eq!(log.names(), ["p1", "p2"]);
    }

    #[test]
    fn test_cancellation_after_third_of_seven_phases() {
        let log = ExecutionLog::new();
        let registry = registry_of(vec![TestPlugin::new("a")
            .with_phase(Stage::Inspection, Slot::Pre, phase(&log, "1"))
            .with_phase(Stage::Inspection, Slot::Post, phase(&log, "2"))
            .with_phase(Stage::Merge, Slot::Pre, phase(&log, "3").cancelling())
            .with_phase(Stage::Merge, Slot::Post, phase(&log, "4"))
            .with_phase(Stage::WriteModule, Slot::Pre, phase(&log, "5"))
            .with_phase(Stage::Pack, Slot::Pre, phase(&log, "6"))
            .with_phase(Stage::SaveModule, Slot::Post, phase(&log, "7"))]);
        let mut ctx = context_for(&registry, ProgramTree::new(), |_| {});

        let actions_run = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&actions_run);
        let actions = move |stage: Stage, _: &mut ExecutionContext| -> anyhow::Result<()> {
            seen.borrow_mut().push(stage);
            Ok(())
        };
        let err = StageExecutor::new(actions).run(&mut ctx).unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(log.names(), ["1", "2", "3"]);
        // Merge's built-in action never ran.
        assert_eq!(*actions_run.borrow(), [Stage::Inspection]);
    }

    #[test]
    fn test_cancelled_raised_inside_phase() {
        let log = ExecutionLog::new();
        let registry = registry_of(vec![TestPlugin::new("a")
            .with_phase(Stage::Inspection, Slot::Pre, phase(&log, "checker").cancelling_inline())
            .with_phase(Stage::Inspection, Slot::Pre, phase(&log, "never"))]);
        let mut ctx = context_for(&registry, sample_program(), |_| {});

        let err = StageExecutor::new(NoopActions).run(&mut ctx).unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert!(log.names().is_empty());
    }

    #[test]
    fn test_failure_in_post_phase_aborts_run() {
        let log = ExecutionLog::new();
        let registry = registry_of(vec![TestPlugin::new("a")
            .with_phase(Stage::ProcessModule, Slot::Post, phase(&log, "post-1"))
            .with_phase(
                Stage::ProcessModule,
                Slot::Post,
                phase(&log, "post-2").failing("bad metadata"),
            )
            .with_phase(Stage::ProcessModule, Slot::Post, phase(&log, "post-3"))
            .with_phase(Stage::OptimizeMethods, Slot::Pre, phase(&log, "optimize"))
            .with_phase(Stage::SaveModule, Slot::Pre, phase(&log, "save"))]);
        let mut ctx = context_for(&registry, sample_program(), |_| {});

        let err = StageExecutor::new(NoopActions).run(&mut ctx).unwrap_err();

        match &err {
            PipelineError::Transformation { stage, phase, source } => {
                assert_eq!(*stage, Stage::ProcessModule);
                assert_eq!(phase.as_deref(), Some("post-2"));
                let cause = source.downcast_ref::<PhaseFailure>().unwrap();
                assert_eq!(cause.0, "bad metadata");
            }
            other => panic!("expected transformation error, got {:?}", other),
        }
        assert!(err.source().is_some());
        // post-2 failed on the first module; nothing after it ran.
        assert_eq!(log.names(), ["post-1"]);
    }

    #[test]
    fn test_failing_builtin_action() {
        let log = ExecutionLog::new();
        let registry = registry_of(vec![TestPlugin::new("a")
            .with_phase(Stage::WriteModule, Slot::Pre, phase(&log, "before-write"))
            .with_phase(Stage::WriteModule, Slot::Post, phase(&log, "after-write"))]);
        let mut ctx = context_for(&registry, sample_program(), |_| {});

        let actions = |stage: Stage, _: &mut ExecutionContext| -> anyhow::Result<()> {
            if stage == Stage::WriteModule {
                anyhow::bail!("serializer crashed");
            }
            Ok(())
        };
        let err = StageExecutor::new(actions).run(&mut ctx).unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Transformation { stage: Stage::WriteModule, phase: None, .. }
        ));
        assert_eq!(log.names(), ["before-write"]);
    }

    #[test]
    fn test_filter_scopes_targets_by_configuration() {
        let log = ExecutionLog::new();
        let registry = registry_of(vec![
            TestPlugin::new("a").with_phase(
                Stage::Inspection,
                Slot::Pre,
                phase(&log, "types-of-a").with_targets(KindMask::TYPES),
            ),
            TestPlugin::new("b"),
        ]);
        let program = sample_program();
        let secret = program.find("App.Secret").unwrap();
        let mut ctx = context_for(&registry, program, |builder| {
            builder.enable("b", Default::default()).unwrap();
            builder
                .override_definition(
                    secret.id,
                    crate::core::settings::ProtectionSettings::new().with("a", Default::default()),
                )
                .unwrap();
        });

        StageExecutor::new(NoopActions).run(&mut ctx).unwrap();

        let entries = log.entries();
        assert_eq!(entries[0].targets, vec![secret]);
        assert_eq!(entries[0].targets[0].kind, DefinitionKind::Type);
    }

    #[test]
    fn test_events_are_emitted() {
        let log = ExecutionLog::new();
        let registry = registry_of(vec![TestPlugin::new("a").with_phase(
            Stage::Pack,
            Slot::Post,
            phase(&log, "pack-post"),
        )]);
        let mut ctx = context_for(&registry, sample_program(), |_| {});

        let mut events = Vec::new();
        StageExecutor::new(NoopActions)
            .with_events(|e: &PipelineEvent| events.push(e.clone()))
            .run(&mut ctx)
            .unwrap();

        assert!(matches!(
            events.first(),
            Some(PipelineEvent::RunStarted { modules: 2, phases: 1 })
        ));
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::PhaseFinished { stage: Stage::Pack, slot: Slot::Post, .. }
        )));
        match events.last() {
            Some(PipelineEvent::RunFinished { outcome, phases_executed, .. }) => {
                assert_eq!(outcome, "completed");
                assert_eq!(*phases_executed, 1);
            }
            other => panic!("unexpected last event {:?}", other),
        }
    }
}
