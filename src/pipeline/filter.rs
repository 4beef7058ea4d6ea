//! Per-phase target selection.

use crate::core::definition::Definition;
use crate::core::settings::TargetConfiguration;
use crate::pipeline::errors::PipelineError;
use crate::pipeline::table::PhaseEntry;

/// Computes the exact target list a phase receives.
#[derive(Debug, Clone, Copy)]
pub struct TargetFilter<'a> {
    configuration: &'a TargetConfiguration,
}

impl<'a> TargetFilter<'a> {
    pub fn new(configuration: &'a TargetConfiguration) -> Self {
        TargetFilter { configuration }
    }

    /// Narrow `candidates` to the definitions `entry` must process.
    ///
    /// Candidates are first narrowed by the phase's kind mask. A
    /// `process_all` phase gets every remaining candidate; any other phase
    /// only gets the definitions whose resolved settings request its owning
    /// plugin. A candidate without resolvable settings is an internal
    /// invariant violation. Candidate order is preserved.
    pub fn filter(
        &self,
        entry: &PhaseEntry,
        candidates: &[Definition],
    ) -> Result<Vec<Definition>, PipelineError> {
        let mask = entry.phase().targets();
        let narrowed = candidates.iter().filter(|def| mask.admits(def.kind));

        if entry.phase().process_all() {
            return Ok(narrowed.copied().collect());
        }

        let mut targets = Vec::new();
        for def in narrowed {
            let settings = self.configuration.resolve(def.id).ok_or_else(|| {
                tracing::error!("{} not marked for protection, possibly a bug", def);
                PipelineError::InternalInvariant(format!(
                    "{} has no resolvable settings while filtering phase `{}`",
                    def,
                    entry.name()
                ))
            })?;

            if settings.contains(entry.owner()) {
                targets.push(*def);
            }
        }

        Ok(targets)
    }
}
