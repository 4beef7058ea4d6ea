//! The phase table: (stage, slot) → ordered phases.

use std::fmt;
use std::sync::Arc;

use crate::core::phase::Phase;
use crate::core::plugin_id::PluginId;
use crate::pipeline::stage::{Slot, Stage};

/// A phase together with the plugin that inserted it.
#[derive(Clone)]
pub struct PhaseEntry {
    owner: PluginId,
    phase: Arc<dyn Phase>,
}

impl PhaseEntry {
    pub fn new(owner: PluginId, phase: Arc<dyn Phase>) -> Self {
        PhaseEntry { owner, phase }
    }

    /// Plugin that owns the phase.
    pub fn owner(&self) -> PluginId {
        self.owner
    }

    pub fn phase(&self) -> &dyn Phase {
        self.phase.as_ref()
    }

    pub fn name(&self) -> &str {
        self.phase.name()
    }
}

impl fmt::Debug for PhaseEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseEntry")
            .field("owner", &self.owner)
            .field("name", &self.phase.name())
            .field("targets", &self.phase.targets())
            .field("process_all", &self.phase.process_all())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
struct StageSlots {
    pre: Vec<PhaseEntry>,
    post: Vec<PhaseEntry>,
}

/// Ordered phases for every (stage, slot).
///
/// The table has one entry per [`Stage`], so every stage always has a
/// (possibly empty) pre and post list. Insertion order within a slot is the
/// execution order; there is no way to remove or reorder a phase.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: [StageSlots; Stage::COUNT],
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Pipeline {
            stages: std::array::from_fn(|_| StageSlots::default()),
        }
    }

    /// Append a phase to the pre-processing list of `stage`.
    pub fn insert_pre(&mut self, stage: Stage, entry: PhaseEntry) {
        self.stages[stage.index()].pre.push(entry);
    }

    /// Append a phase to the post-processing list of `stage`.
    pub fn insert_post(&mut self, stage: Stage, entry: PhaseEntry) {
        self.stages[stage.index()].post.push(entry);
    }

    /// Phases of one slot, in execution order.
    pub fn phases(&self, stage: Stage, slot: Slot) -> &[PhaseEntry] {
        let slots = &self.stages[stage.index()];
        match slot {
            Slot::Pre => &slots.pre,
            Slot::Post => &slots.post,
        }
    }

    /// Find the first phase matching `predicate`.
    ///
    /// Every stage's pre list is scanned in stage order, then every stage's
    /// post list.
    pub fn find_phase<P>(&self, mut predicate: P) -> Option<&PhaseEntry>
    where
        P: FnMut(&PhaseEntry) -> bool,
    {
        self.stages
            .iter()
            .flat_map(|s| s.pre.iter())
            .chain(self.stages.iter().flat_map(|s| s.post.iter()))
            .find(|entry| predicate(entry))
    }

    /// Find a phase by name.
    pub fn find_phase_by_name(&self, name: &str) -> Option<&PhaseEntry> {
        self.find_phase(|entry| entry.name() == name)
    }

    /// Find the first phase owned by `plugin`.
    pub fn find_phase_of(&self, plugin: PluginId) -> Option<&PhaseEntry> {
        self.find_phase(|entry| entry.owner() == plugin)
    }

    /// Iterate every phase as `(stage, slot, entry)` in execution layout
    /// order (stage ascending, pre before post).
    pub fn iter(&self) -> impl Iterator<Item = (Stage, Slot, &PhaseEntry)> + '_ {
        Stage::ALL.iter().flat_map(move |&stage| {
            let slots = &self.stages[stage.index()];
            slots
                .pre
                .iter()
                .map(move |e| (stage, Slot::Pre, e))
                .chain(slots.post.iter().map(move |e| (stage, Slot::Post, e)))
        })
    }

    /// Total number of phases.
    pub fn len(&self) -> usize {
        self.stages.iter().map(|s| s.pre.len() + s.post.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// A plugin's view of the pipeline while it populates it.
///
/// Every phase inserted through the scope is owned by the scope's plugin.
pub struct PipelineScope<'a> {
    pipeline: &'a mut Pipeline,
    owner: PluginId,
}

impl<'a> PipelineScope<'a> {
    pub(crate) fn new(pipeline: &'a mut Pipeline, owner: PluginId) -> Self {
        PipelineScope { pipeline, owner }
    }

    /// The plugin inserting phases.
    pub fn owner(&self) -> PluginId {
        self.owner
    }

    /// Insert a phase before the built-in action of `stage`.
    pub fn insert_pre(&mut self, stage: Stage, phase: impl Phase + 'static) -> &mut Self {
        self.pipeline
            .insert_pre(stage, PhaseEntry::new(self.owner, Arc::new(phase)));
        self
    }

    /// Insert a phase after the built-in action of `stage`.
    pub fn insert_post(&mut self, stage: Stage, phase: impl Phase + 'static) -> &mut Self {
        self.pipeline
            .insert_post(stage, PhaseEntry::new(self.owner, Arc::new(phase)));
        self
    }

    /// Look up a phase inserted so far, e.g. to detect a cooperating plugin.
    pub fn find_phase<P>(&self, predicate: P) -> Option<&PhaseEntry>
    where
        P: FnMut(&PhaseEntry) -> bool,
    {
        self.pipeline.find_phase(predicate)
    }
}
