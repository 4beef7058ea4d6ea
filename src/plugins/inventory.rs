//! `inventory`: logs how many definitions of each kind were loaded.

use std::collections::BTreeMap;

use crate::core::definition::{DefinitionKind, KindMask};
use crate::core::phase::{Phase, PhaseParameters};
use crate::core::plugin::Plugin;
use crate::core::plugin_id::PluginId;
use crate::core::preset::Preset;
use crate::pipeline::{ExecutionContext, PipelineScope, Stage};

#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryPlugin;

impl Plugin for InventoryPlugin {
    fn id(&self) -> PluginId {
        PluginId::new("inventory")
    }

    fn name(&self) -> &str {
        "Inventory"
    }

    fn description(&self) -> &str {
        "Logs the number of loaded definitions per kind."
    }

    fn preset(&self) -> Preset {
        Preset::Minimum
    }

    fn before(&self) -> Vec<PluginId> {
        vec![PluginId::new("report")]
    }

    fn populate_pipeline(&self, pipeline: &mut PipelineScope<'_>) {
        pipeline.insert_post(Stage::Inspection, CountDefinitions);
    }
}

struct CountDefinitions;

impl Phase for CountDefinitions {
    fn name(&self) -> &str {
        "count definitions"
    }

    fn targets(&self) -> KindMask {
        KindMask::ALL_DEFINITIONS
    }

    fn process_all(&self) -> bool {
        true
    }

    fn execute(
        &self,
        ctx: &mut ExecutionContext,
        params: &PhaseParameters<'_>,
    ) -> anyhow::Result<()> {
        let mut counts: BTreeMap<DefinitionKind, usize> = BTreeMap::new();
        for def in params.targets() {
            *counts.entry(def.kind).or_default() += 1;
        }

        for (kind, count) in &counts {
            tracing::info!("{:>6} {}", count, kind);
        }
        tracing::debug!(
            auxiliary = ctx.auxiliary_units().len(),
            "inventory complete"
        );
        Ok(())
    }
}
