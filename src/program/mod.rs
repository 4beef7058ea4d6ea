//! Program representations.

pub mod tree;

pub use tree::ProgramTree;
