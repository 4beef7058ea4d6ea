//! High-level operations.
//!
//! This module contains the implementation of mdcrypt commands.

pub mod inspect;
pub mod protect;

pub use inspect::{
    check_config, describe_program, resolve_configuration, ConfigSummary, DefinitionRow,
};
pub use protect::{load_program, protect, Engine, FileActions, ProtectOptions, ProtectOutcome};
