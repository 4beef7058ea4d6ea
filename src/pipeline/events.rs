//! Run event types for JSON output.
//!
//! These events are emitted while the executor runs and are printed one JSON
//! object per line when using `--message-format=json`.
//!
//! # Event Types
//!
//! - `run-started`: the executor is about to enter the first stage
//! - `stage-started`: a stage (or one module's pass of a per-module stage) begins
//! - `phase-finished`: a phase returned successfully
//! - `stage-finished`: a stage's post phases completed
//! - `run-finished`: the run completed, failed or was cancelled

use serde::Serialize;

use crate::pipeline::stage::{Slot, Stage};

/// An event emitted during a protection run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason")]
pub enum PipelineEvent {
    #[serde(rename = "run-started")]
    RunStarted {
        /// Number of module units to process
        modules: u64,
        /// Number of phases in the pipeline
        phases: u64,
    },

    #[serde(rename = "stage-started")]
    StageStarted {
        stage: Stage,
        /// Path of the module unit for per-module stages
        #[serde(skip_serializing_if = "Option::is_none")]
        module: Option<String>,
    },

    #[serde(rename = "phase-finished")]
    PhaseFinished {
        stage: Stage,
        slot: Slot,
        /// Owning plugin id
        plugin: String,
        phase: String,
        /// Number of definitions handed to the phase
        targets: u64,
        duration_ms: u64,
    },

    #[serde(rename = "stage-finished")]
    StageFinished { stage: Stage },

    #[serde(rename = "run-finished")]
    RunFinished {
        /// "completed", "failed" or "cancelled"
        outcome: String,
        phases_executed: u64,
        duration_ms: u64,
    },
}

impl PipelineEvent {
    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
