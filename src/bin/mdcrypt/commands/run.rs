//! `mdcrypt run` command

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::cli::{MessageFormat, RunArgs};
use mdcrypt::ops::{protect, ProtectOptions};
use mdcrypt::pipeline::PipelineEvent;
use mdcrypt::plugins::builtin_registry;
use mdcrypt::util::shell::{format_duration, Progress, Status};
use mdcrypt::util::Shell;
use mdcrypt::{CancellationToken, PipelineError, Stage};

pub fn execute(args: RunArgs, shell: Shell) -> Result<()> {
    let shell = Arc::new(shell);
    let registry = builtin_registry().map_err(PipelineError::from)?;

    let cancellation = CancellationToken::new();
    if let Some(secs) = args.time_limit {
        let token = cancellation.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(secs));
            tracing::debug!("time limit of {}s reached, cancelling", secs);
            token.cancel();
        });
    }

    let options = ProtectOptions {
        program: args.program,
        merge: args.merge,
        config: args.config,
        out_dir: args.out,
    };

    let json = args.message_format == MessageFormat::Json;
    let mut progress: Option<Progress> = None;
    let mut passes = StagePasses::default();
    let events_shell = Arc::clone(&shell);
    let on_event = move |event: &PipelineEvent| {
        if json {
            events_shell.json_line(event);
            return;
        }
        match event {
            PipelineEvent::RunStarted { modules, phases } => {
                events_shell.status(
                    Status::Protecting,
                    format!("{} module(s) with {} phase(s)", modules, phases),
                );
                passes = StagePasses::new(*modules);
                progress = Some(events_shell.progress(passes.total(), "protecting"));
            }
            PipelineEvent::StageStarted { stage, module } => {
                let grown = passes.record(*stage, module.is_some());
                if let Some(progress) = &progress {
                    progress.inc_length(grown);
                    progress.inc(1);
                    match module {
                        Some(module) => progress.set_message(format!("{} ({})", stage, module)),
                        None => progress.set_message(stage),
                    }
                }
            }
            PipelineEvent::RunFinished { .. } => {
                if let Some(progress) = progress.take() {
                    progress.finish();
                }
            }
            PipelineEvent::PhaseFinished { .. } | PipelineEvent::StageFinished { .. } => {}
        }
    };

    let outcome = protect(registry, &options, cancellation, on_event)?;

    for path in &outcome.written {
        shell.status(Status::Written, path.display());
    }
    shell.status(
        Status::Finished,
        format!(
            "{} phase(s) over {} module(s) in {}",
            outcome.report.phases_executed,
            outcome.report.modules,
            format_duration(outcome.report.elapsed)
        ),
    );

    Ok(())
}

/// Stage passes of a run, for the progress bar.
///
/// The run announces the modules it loaded, but merging can add module units
/// after that, each with its own pass over every per-module stage.
#[derive(Debug, Default)]
struct StagePasses {
    expected_modules: u64,
    seen_modules: u64,
}

impl StagePasses {
    fn new(modules: u64) -> Self {
        StagePasses {
            expected_modules: modules,
            seen_modules: 0,
        }
    }

    fn total(&self) -> u64 {
        let modules = self.expected_modules.max(self.seen_modules);
        (Stage::COUNT - Stage::PER_MODULE.len()) as u64 + Stage::PER_MODULE.len() as u64 * modules
    }

    /// Record a started stage. Returns how many passes the total grew by.
    fn record(&mut self, stage: Stage, per_module: bool) -> u64 {
        if stage != Stage::BeginModule || !per_module {
            return 0;
        }
        self.seen_modules += 1;
        if self.seen_modules > self.expected_modules {
            Stage::PER_MODULE.len() as u64
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_through(passes: &mut StagePasses, modules: u64) -> (u64, u64) {
        let mut started = 0;
        let mut grown = 0;
        let mut start = |stage, per_module| {
            started += 1;
            grown += passes.record(stage, per_module);
        };
        start(Stage::Inspection, false);
        start(Stage::Merge, false);
        for _ in 0..modules {
            for stage in Stage::PER_MODULE {
                start(stage, true);
            }
        }
        start(Stage::WriteModule, false);
        start(Stage::Pack, false);
        start(Stage::SaveModule, false);
        (started, grown)
    }

    #[test]
    fn test_passes_match_announced_modules() {
        let mut passes = StagePasses::new(2);
        let total = passes.total();

        let (started, grown) = run_through(&mut passes, 2);
        assert_eq!(grown, 0);
        assert_eq!(started, total);
    }

    #[test]
    fn test_passes_grow_with_merged_modules() {
        let mut passes = StagePasses::new(2);
        let announced = passes.total();

        let (started, grown) = run_through(&mut passes, 3);
        assert_eq!(announced + grown, started);
        assert_eq!(passes.total(), started);
    }
}
