//! Boundary of the program representation.
//!
//! Parsing and writing real modules belongs to an external metadata library.
//! The scheduler only needs to enumerate module units and their definitions;
//! concrete phases downcast to the representation they were written for.

use std::any::Any;

use crate::core::definition::{Definition, DefinitionId};

/// A loaded program: a forest of module units, each owning a tree of
/// definitions.
pub trait Program: Any {
    /// Module units in processing order.
    fn modules(&self) -> Vec<Definition>;

    /// Every definition belonging to `module`, including the module itself.
    fn definitions_of(&self, module: DefinitionId) -> Vec<Definition>;

    /// Every definition of every module unit, module by module.
    fn all_definitions(&self) -> Vec<Definition> {
        self.modules()
            .iter()
            .flat_map(|m| self.definitions_of(m.id))
            .collect()
    }

    /// Human-readable path of a definition, used by override rules and logs.
    fn path_of(&self, _def: DefinitionId) -> Option<String> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
