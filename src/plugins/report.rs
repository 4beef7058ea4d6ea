//! `report`: writes the definitions in its scope, with their parameters, as
//! a JSON output artifact.
//!
//! Parameters:
//! - `file`: artifact name (default `protection-report.json`)

use serde::Serialize;

use crate::core::definition::{DefinitionKind, KindMask};
use crate::core::phase::{Phase, PhaseParameters};
use crate::core::plugin::Plugin;
use crate::core::plugin_id::PluginId;
use crate::core::preset::Preset;
use crate::core::settings::PluginParameters;
use crate::pipeline::{ExecutionContext, OutputArtifact, PipelineScope, Stage};

pub const DEFAULT_FILE: &str = "protection-report.json";

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportPlugin;

impl Plugin for ReportPlugin {
    fn id(&self) -> PluginId {
        PluginId::new("report")
    }

    fn name(&self) -> &str {
        "Scope report"
    }

    fn description(&self) -> &str {
        "Writes the definitions selected for this plugin to a JSON report."
    }

    fn preset(&self) -> Preset {
        Preset::Normal
    }

    fn populate_pipeline(&self, pipeline: &mut PipelineScope<'_>) {
        pipeline.insert_post(Stage::WriteModule, WriteReport);
    }
}

#[derive(Serialize)]
struct Report<'a> {
    plugin: &'a str,
    definitions: Vec<ReportEntry>,
}

#[derive(Serialize)]
struct ReportEntry {
    path: String,
    kind: DefinitionKind,
    #[serde(skip_serializing_if = "PluginParameters::is_empty")]
    parameters: PluginParameters,
}

struct WriteReport;

impl Phase for WriteReport {
    fn name(&self) -> &str {
        "write report"
    }

    fn targets(&self) -> KindMask {
        KindMask::ALL_DEFINITIONS
    }

    fn execute(
        &self,
        ctx: &mut ExecutionContext,
        params: &PhaseParameters<'_>,
    ) -> anyhow::Result<()> {
        let Some(first) = params.targets().first() else {
            tracing::debug!("no definitions selected for the report");
            return Ok(());
        };
        let file: String = params.parameter(first, "file", DEFAULT_FILE.to_string());

        let mut definitions = Vec::with_capacity(params.targets().len());
        for def in params.targets() {
            ctx.check_cancellation()?;
            definitions.push(ReportEntry {
                path: ctx
                    .program()
                    .path_of(def.id)
                    .unwrap_or_else(|| def.id.to_string()),
                kind: def.kind,
                parameters: params.parameters(def).cloned().unwrap_or_default(),
            });
        }

        let report = Report {
            plugin: params.owner().as_str(),
            definitions,
        };
        let bytes = serde_json::to_vec_pretty(&report)?;
        tracing::debug!(file = %file, entries = report.definitions.len(), "report written");
        ctx.outputs_mut().push(OutputArtifact::new(file, bytes));
        Ok(())
    }
}
