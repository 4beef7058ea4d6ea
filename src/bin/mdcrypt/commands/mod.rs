//! Command implementations

pub mod check;
pub mod completions;
pub mod inspect;
pub mod plugins;
pub mod run;
pub mod stages;
