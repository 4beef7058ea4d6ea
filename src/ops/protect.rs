//! Implementation of `mdcrypt run`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::core::program::Program;
use crate::core::settings::TargetConfigurationBuilder;
use crate::pipeline::{
    CancellationToken, ConfigurationError, ExecutionContext, OutputArtifact, PipelineError,
    PipelineEvent, PluginRegistry, RunReport, Stage, StageAction, StageExecutor,
};
use crate::program::ProgramTree;
use crate::util::config::ProjectConfig;

/// Runs the protection pipeline of a plugin registry over a program.
pub struct Engine<'a> {
    registry: PluginRegistry,
    cancellation: CancellationToken,
    auxiliary_units: Vec<Box<dyn Program>>,
    sink: Option<Box<dyn FnMut(&PipelineEvent) + 'a>>,
}

impl<'a> Engine<'a> {
    pub fn new(registry: PluginRegistry) -> Self {
        Engine {
            registry,
            cancellation: CancellationToken::new(),
            auxiliary_units: Vec::new(),
            sink: None,
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Add a unit for the Merge stage to fold into the program.
    pub fn with_auxiliary_unit(mut self, unit: Box<dyn Program>) -> Self {
        self.auxiliary_units.push(unit);
        self
    }

    /// Receive run events.
    pub fn with_events(mut self, sink: impl FnMut(&PipelineEvent) + 'a) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Token that cancels this engine's run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Build the pipeline and the target configuration, then run every stage.
    ///
    /// The configuration builder handed to `configure` already has every
    /// definition of `program` in scope, together with the definitions the
    /// Merge action will add from the auxiliary units. On success the final
    /// context is returned with the transformed program and its outputs.
    pub fn run<C>(
        self,
        program: Box<dyn Program>,
        configure: C,
        actions: impl StageAction,
    ) -> Result<(RunReport, ExecutionContext), PipelineError>
    where
        C: FnOnce(
            &mut TargetConfigurationBuilder<'_>,
            &dyn Program,
        ) -> Result<(), ConfigurationError>,
    {
        let pipeline = self.registry.build_pipeline()?;

        let preview = actions.merge_preview(program.as_ref(), &self.auxiliary_units);
        let scope: &dyn Program = preview.as_deref().unwrap_or(program.as_ref());

        let mut builder = TargetConfigurationBuilder::new(&self.registry);
        builder.include_program(scope);
        configure(&mut builder, scope)?;
        let configuration = builder.build();

        tracing::debug!(
            plugins = self.registry.len(),
            phases = pipeline.len(),
            in_scope = configuration.scope_len(),
            "pipeline ready"
        );

        let mut ctx = ExecutionContext::new(
            program,
            Arc::new(pipeline),
            configuration,
            self.cancellation,
        );
        ctx.auxiliary_units_mut().extend(self.auxiliary_units);

        let mut executor = StageExecutor::new(actions);
        if let Some(sink) = self.sink {
            executor = executor.with_events(sink);
        }
        let report = executor.run(&mut ctx)?;
        Ok((report, ctx))
    }
}

/// Built-in stage actions over [`ProgramTree`] files.
///
/// - Merge folds auxiliary units into the main program
/// - WriteModule serializes every module into an output artifact
/// - SaveModule writes all output artifacts to the output directory
#[derive(Debug, Clone)]
pub struct FileActions {
    out_dir: PathBuf,
}

impl FileActions {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        FileActions {
            out_dir: out_dir.into(),
        }
    }

    fn merge(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let units = ctx.take_auxiliary_units();
        if units.is_empty() {
            return Ok(());
        }

        let Some(program) = ctx.program_as_mut::<ProgramTree>() else {
            bail!("merging requires the main program to be a program tree");
        };
        for unit in units {
            let Some(unit) = unit.as_any().downcast_ref::<ProgramTree>() else {
                bail!("auxiliary unit is not a program tree");
            };
            let added = program.absorb(unit);
            tracing::debug!(modules = added.len(), "merged auxiliary unit");
        }
        Ok(())
    }

    fn write(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let Some(program) = ctx.program_as::<ProgramTree>() else {
            bail!("writing requires the program to be a program tree");
        };

        let mut artifacts = Vec::new();
        for module in program.modules() {
            let name = program.name(module.id).unwrap_or("module");
            let bytes = program
                .module_to_json(module.id)
                .with_context(|| format!("failed to serialize module `{}`", name))?
                .with_context(|| format!("`{}` is not a module", name))?;
            artifacts.push(OutputArtifact::new(format!("{}.json", name), bytes));
        }

        ctx.outputs_mut().extend(artifacts);
        Ok(())
    }

    fn save(&self, ctx: &mut ExecutionContext) -> Result<()> {
        std::fs::create_dir_all(&self.out_dir).with_context(|| {
            format!(
                "failed to create output directory: {}",
                self.out_dir.display()
            )
        })?;

        for artifact in ctx.outputs() {
            ctx.check_cancellation()?;
            let path = self.out_dir.join(&artifact.name);
            std::fs::write(&path, &artifact.bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::debug!("saved {}", path.display());
        }
        Ok(())
    }
}

impl StageAction for FileActions {
    fn run(&mut self, stage: Stage, ctx: &mut ExecutionContext) -> Result<()> {
        match stage {
            Stage::Merge => self.merge(ctx),
            Stage::WriteModule => self.write(ctx),
            Stage::SaveModule => self.save(ctx),
            _ => Ok(()),
        }
    }

    fn merge_preview(
        &self,
        program: &dyn Program,
        units: &[Box<dyn Program>],
    ) -> Option<Box<dyn Program>> {
        if units.is_empty() {
            return None;
        }
        // absorb is deterministic, so the copy assigns the same ids Merge will
        let mut merged = program.as_any().downcast_ref::<ProgramTree>()?.clone();
        for unit in units {
            merged.absorb(unit.as_any().downcast_ref::<ProgramTree>()?);
        }
        Some(Box::new(merged))
    }
}

/// Options for the run command.
#[derive(Debug, Clone, Default)]
pub struct ProtectOptions {
    /// Program description to protect
    pub program: PathBuf,

    /// Additional program descriptions merged into the main one
    pub merge: Vec<PathBuf>,

    /// Project file (empty configuration when absent)
    pub config: Option<PathBuf>,

    /// Output directory
    pub out_dir: PathBuf,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct ProtectOutcome {
    pub report: RunReport,
    /// Files written to the output directory
    pub written: Vec<PathBuf>,
}

/// Load a program description.
pub fn load_program(path: &Path) -> Result<ProgramTree> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read program: {}", path.display()))?;
    ProgramTree::from_json(&bytes)
        .with_context(|| format!("failed to parse program: {}", path.display()))
}

/// Protect a program file with the given registry.
///
/// Errors from the pipeline are returned as [`PipelineError`] inside the
/// `anyhow::Error` so callers can tell cancellation from failure.
pub fn protect<'a>(
    registry: PluginRegistry,
    options: &ProtectOptions,
    cancellation: CancellationToken,
    events: impl FnMut(&PipelineEvent) + 'a,
) -> Result<ProtectOutcome> {
    let config = match &options.config {
        Some(path) => ProjectConfig::load(path)?,
        None => ProjectConfig::default(),
    };
    let program = load_program(&options.program)?;

    let mut engine = Engine::new(registry)
        .with_cancellation(cancellation)
        .with_events(events);
    for path in &options.merge {
        engine = engine.with_auxiliary_unit(Box::new(load_program(path)?));
    }

    let (report, ctx) = engine.run(
        Box::new(program),
        |builder, program| config.apply(builder, program),
        FileActions::new(&options.out_dir),
    )?;

    let written = ctx
        .outputs()
        .iter()
        .map(|artifact| options.out_dir.join(&artifact.name))
        .collect();

    Ok(ProtectOutcome { report, written })
}
