//! Fixed lifecycle stages.

use std::fmt;

use serde::Serialize;

/// One step of the run lifecycle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Inspect the loaded modules. Once per run.
    Inspection,
    /// Merge auxiliary program units, if a merger is present. Once per run.
    Merge,
    /// Begin processing a module. Once per module.
    BeginModule,
    /// Process a module. Once per module.
    ProcessModule,
    /// Optimize method bodies. Once per module.
    OptimizeMethods,
    /// Finish processing a module. Once per module.
    EndModule,
    /// Serialize the processed modules. Once per run, after every module
    /// has been processed.
    WriteModule,
    /// Pack the output, if a packer is present. Once per run.
    Pack,
    /// Save the output. Once per run.
    SaveModule,
}

impl Stage {
    pub const COUNT: usize = 9;

    /// Every stage in execution order.
    pub const ALL: [Stage; Stage::COUNT] = [
        Stage::Inspection,
        Stage::Merge,
        Stage::BeginModule,
        Stage::ProcessModule,
        Stage::OptimizeMethods,
        Stage::EndModule,
        Stage::WriteModule,
        Stage::Pack,
        Stage::SaveModule,
    ];

    /// Stages repeated for every module unit.
    pub const PER_MODULE: [Stage; 4] = [
        Stage::BeginModule,
        Stage::ProcessModule,
        Stage::OptimizeMethods,
        Stage::EndModule,
    ];

    /// Position in [`Stage::ALL`], used to index the pipeline table.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether this stage runs once per module unit.
    pub fn is_per_module(self) -> bool {
        Stage::PER_MODULE.contains(&self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Inspection => "inspection",
            Stage::Merge => "merge",
            Stage::BeginModule => "begin-module",
            Stage::ProcessModule => "process-module",
            Stage::OptimizeMethods => "optimize-methods",
            Stage::EndModule => "end-module",
            Stage::WriteModule => "write-module",
            Stage::Pack => "pack",
            Stage::SaveModule => "save-module",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Position of a phase relative to its stage's built-in action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Pre,
    Post,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Pre => write!(f, "pre"),
            Slot::Post => write!(f, "post"),
        }
    }
}
