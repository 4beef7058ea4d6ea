//! Test utilities for mdcrypt unit tests.
//!
//! Provides scripted plugins and phases that record what they were handed,
//! plus a small sample program.
//!
//! # Example
//!
//! ```rust,ignore
//! use mdcrypt::test_support::{
//!     context_for, registry_of, sample_program, ExecutionLog, RecordingPhase, TestPlugin,
//! };
//!
//! let log = ExecutionLog::new();
//! let registry = registry_of(vec![TestPlugin::new("a").with_phase(
//!     Stage::ProcessModule,
//!     Slot::Pre,
//!     RecordingPhase::new("analyze").with_log(&log),
//! )]);
//! let mut ctx = context_for(&registry, sample_program(), |_| {});
//! ```

use std::sync::{Arc, Mutex};

use crate::core::definition::{Definition, DefinitionKind, KindMask};
use crate::core::phase::{Phase, PhaseParameters};
use crate::core::plugin::Plugin;
use crate::core::plugin_id::PluginId;
use crate::core::preset::Preset;
use crate::core::settings::TargetConfigurationBuilder;
use crate::pipeline::{
    CancellationToken, ExecutionContext, PipelineScope, PluginRegistry, Slot, Stage,
};
use crate::program::ProgramTree;

/// One recorded phase invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub name: String,
    pub targets: Vec<Definition>,
    pub module: Option<Definition>,
}

/// Shared, cloneable record of phase invocations.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str, targets: Vec<Definition>, module: Option<Definition>) {
        self.entries.lock().unwrap().push(LogEntry {
            name: name.to_string(),
            targets,
            module,
        });
    }

    /// Names of the recorded invocations, in order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

/// Error returned by a failing [`RecordingPhase`].
#[derive(Debug, thiserror::Error)]
#[error("phase failed: {0}")]
pub struct PhaseFailure(pub String);

#[derive(Debug, Clone)]
enum Behavior {
    Record,
    /// Record, then request cancellation.
    Cancel,
    /// Request cancellation and observe it before recording.
    CancelInline,
    Fail(String),
}

/// A phase that records its invocations into an [`ExecutionLog`].
#[derive(Debug, Clone)]
pub struct RecordingPhase {
    name: String,
    targets: KindMask,
    process_all: bool,
    log: ExecutionLog,
    behavior: Behavior,
}

impl RecordingPhase {
    pub fn new(name: &str) -> Self {
        RecordingPhase {
            name: name.to_string(),
            targets: KindMask::ALL_DEFINITIONS,
            process_all: false,
            log: ExecutionLog::new(),
            behavior: Behavior::Record,
        }
    }

    pub fn with_log(mut self, log: &ExecutionLog) -> Self {
        self.log = log.clone();
        self
    }

    pub fn with_targets(mut self, targets: KindMask) -> Self {
        self.targets = targets;
        self
    }

    pub fn processing_all(mut self) -> Self {
        self.process_all = true;
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.behavior = Behavior::Fail(message.to_string());
        self
    }

    pub fn cancelling(mut self) -> Self {
        self.behavior = Behavior::Cancel;
        self
    }

    pub fn cancelling_inline(mut self) -> Self {
        self.behavior = Behavior::CancelInline;
        self
    }
}

impl Phase for RecordingPhase {
    fn name(&self) -> &str {
        &self.name
    }

    fn targets(&self) -> KindMask {
        self.targets
    }

    fn process_all(&self) -> bool {
        self.process_all
    }

    fn execute(
        &self,
        ctx: &mut ExecutionContext,
        params: &PhaseParameters<'_>,
    ) -> anyhow::Result<()> {
        match &self.behavior {
            Behavior::Fail(message) => return Err(PhaseFailure(message.clone()).into()),
            Behavior::CancelInline => {
                ctx.cancellation_token().cancel();
                ctx.check_cancellation()?;
            }
            Behavior::Record | Behavior::Cancel => {}
        }

        self.log
            .record(&self.name, params.targets().to_vec(), ctx.current_module());

        if let Behavior::Cancel = self.behavior {
            ctx.cancellation_token().cancel();
        }
        Ok(())
    }
}

/// A plugin assembled from scripted constraints and phases.
#[derive(Debug, Clone)]
pub struct TestPlugin {
    id: PluginId,
    preset: Preset,
    before: Vec<PluginId>,
    after: Vec<PluginId>,
    phases: Vec<(Stage, Slot, RecordingPhase)>,
}

impl TestPlugin {
    pub fn new(id: &str) -> Self {
        TestPlugin {
            id: PluginId::new(id),
            preset: Preset::None,
            before: Vec::new(),
            after: Vec::new(),
            phases: Vec::new(),
        }
    }

    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.preset = preset;
        self
    }

    pub fn before_plugins(mut self, ids: &[&str]) -> Self {
        self.before.extend(ids.iter().map(|id| PluginId::new(id)));
        self
    }

    pub fn after_plugins(mut self, ids: &[&str]) -> Self {
        self.after.extend(ids.iter().map(|id| PluginId::new(id)));
        self
    }

    pub fn with_phase(mut self, stage: Stage, slot: Slot, phase: RecordingPhase) -> Self {
        self.phases.push((stage, slot, phase));
        self
    }
}

impl Plugin for TestPlugin {
    fn id(&self) -> PluginId {
        self.id
    }

    fn name(&self) -> &str {
        self.id.as_str()
    }

    fn description(&self) -> &str {
        "scripted test plugin"
    }

    fn preset(&self) -> Preset {
        self.preset
    }

    fn before(&self) -> Vec<PluginId> {
        self.before.clone()
    }

    fn after(&self) -> Vec<PluginId> {
        self.after.clone()
    }

    fn populate_pipeline(&self, pipeline: &mut PipelineScope<'_>) {
        for (stage, slot, phase) in &self.phases {
            match slot {
                Slot::Pre => pipeline.insert_pre(*stage, phase.clone()),
                Slot::Post => pipeline.insert_post(*stage, phase.clone()),
            };
        }
    }
}

/// Register `plugins` in order.
pub fn registry_of(plugins: Vec<TestPlugin>) -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    for plugin in plugins {
        registry.register(Box::new(plugin)).unwrap();
    }
    registry
}

/// Two modules:
///
/// - `App`: `App.Program` (`Main`, `counter`) and `App.Secret`
///   (`Decrypt`, `key`, `Value`)
/// - `Lib`: `Lib.Util` (`Helper`, `Changed`)
pub fn sample_program() -> ProgramTree {
    let mut program = ProgramTree::new();

    let app = program.add_module("App");
    let main_type = program.add_type(app.id, "App.Program");
    program.add_member(main_type.id, DefinitionKind::Method, "Main");
    program.add_member(main_type.id, DefinitionKind::Field, "counter");
    let secret = program.add_type(app.id, "App.Secret");
    program.add_member(secret.id, DefinitionKind::Method, "Decrypt");
    program.add_member(secret.id, DefinitionKind::Field, "key");
    program.add_member(secret.id, DefinitionKind::Property, "Value");

    let lib = program.add_module("Lib");
    let util = program.add_type(lib.id, "Lib.Util");
    program.add_member(util.id, DefinitionKind::Method, "Helper");
    program.add_member(util.id, DefinitionKind::Event, "Changed");

    program
}

/// Build the pipeline of `registry` and an execution context over
/// `program`, with every definition in scope.
pub fn context_for(
    registry: &PluginRegistry,
    program: ProgramTree,
    configure: impl FnOnce(&mut TargetConfigurationBuilder<'_>),
) -> ExecutionContext {
    let pipeline = registry.build_pipeline().unwrap();

    let mut builder = TargetConfigurationBuilder::new(registry);
    builder.include_program(&program);
    configure(&mut builder);

    ExecutionContext::new(
        Box::new(program),
        Arc::new(pipeline),
        builder.build(),
        CancellationToken::new(),
    )
}
