//! Definition handles and kind classification.
//!
//! A [`Definition`] is an opaque handle into the program representation. The
//! scheduler never looks inside a definition: it only needs the kind (to
//! narrow phase targets) and the identity (as a map/set key).

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Kind of a program definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionKind {
    Module,
    Type,
    Method,
    Field,
    Property,
    Event,
}

impl DefinitionKind {
    /// All kinds, in declaration order.
    pub const ALL: [DefinitionKind; 6] = [
        DefinitionKind::Module,
        DefinitionKind::Type,
        DefinitionKind::Method,
        DefinitionKind::Field,
        DefinitionKind::Property,
        DefinitionKind::Event,
    ];

    /// Get the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            DefinitionKind::Module => "module",
            DefinitionKind::Type => "type",
            DefinitionKind::Method => "method",
            DefinitionKind::Field => "field",
            DefinitionKind::Property => "property",
            DefinitionKind::Event => "event",
        }
    }

    /// The single-bit mask selecting this kind.
    pub fn mask(self) -> KindMask {
        match self {
            DefinitionKind::Module => KindMask::MODULES,
            DefinitionKind::Type => KindMask::TYPES,
            DefinitionKind::Method => KindMask::METHODS,
            DefinitionKind::Field => KindMask::FIELDS,
            DefinitionKind::Property => KindMask::PROPERTIES,
            DefinitionKind::Event => KindMask::EVENTS,
        }
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

bitflags! {
    /// Set of definition kinds a phase may touch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KindMask: u8 {
        const TYPES = 1;
        const METHODS = 1 << 1;
        const FIELDS = 1 << 2;
        const EVENTS = 1 << 3;
        const PROPERTIES = 1 << 4;
        /// Every member kind (types, methods, fields, events and properties).
        const ALL_MEMBERS = Self::TYPES.bits()
            | Self::METHODS.bits()
            | Self::FIELDS.bits()
            | Self::EVENTS.bits()
            | Self::PROPERTIES.bits();
        const MODULES = 1 << 5;
        /// Every member kind plus modules.
        const ALL_DEFINITIONS = Self::ALL_MEMBERS.bits() | Self::MODULES.bits();
    }
}

impl KindMask {
    /// Check whether the mask admits the given kind.
    pub fn admits(self, kind: DefinitionKind) -> bool {
        self.contains(kind.mask())
    }
}

impl From<DefinitionKind> for KindMask {
    fn from(kind: DefinitionKind) -> Self {
        kind.mask()
    }
}

/// Stable identity of a definition within one program representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefinitionId(pub u32);

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a definition: identity plus kind.
///
/// Equality and hashing cover both fields, but the id alone is unique within
/// a program, so either may be used as a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Definition {
    pub id: DefinitionId,
    pub kind: DefinitionKind,
}

impl Definition {
    pub fn new(id: DefinitionId, kind: DefinitionKind) -> Self {
        Definition { id, kind }
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_members_excludes_modules() {
        assert!(KindMask::ALL_MEMBERS.admits(DefinitionKind::Event));
        assert!(KindMask::ALL_MEMBERS.admits(DefinitionKind::Type));
        assert!(!KindMask::ALL_MEMBERS.admits(DefinitionKind::Module));
    }

    #[test]
    fn test_all_definitions_admits_every_kind() {
        for kind in DefinitionKind::ALL {
            assert!(KindMask::ALL_DEFINITIONS.admits(kind), "{kind}");
        }
    }

    #[test]
    fn test_union_of_single_kinds() {
        let mask = KindMask::from(DefinitionKind::Method) | DefinitionKind::Field.mask();
        assert!(mask.admits(DefinitionKind::Method));
        assert!(mask.admits(DefinitionKind::Field));
        assert!(!mask.admits(DefinitionKind::Type));
    }
}
