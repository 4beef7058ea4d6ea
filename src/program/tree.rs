//! In-memory reference program representation.
//!
//! `ProgramTree` stands in for the external metadata library: it holds a
//! forest of modules, each a tree of types and members, and round-trips
//! through a small JSON description:
//!
//! ```json
//! {
//!   "modules": [{
//!     "name": "App.dll",
//!     "types": [{
//!       "name": "App.Program",
//!       "methods": ["Main"],
//!       "fields": ["counter"],
//!       "nested": [{ "name": "Inner" }]
//!     }]
//!   }]
//! }
//! ```
//!
//! Ids are assigned in document order when loading, so the same bytes always
//! produce the same handles.

use std::any::Any;

use serde::{Deserialize, Serialize};

use crate::core::definition::{Definition, DefinitionId, DefinitionKind};
use crate::core::program::Program;

#[derive(Debug, Clone)]
struct Node {
    kind: DefinitionKind,
    name: String,
    parent: Option<DefinitionId>,
    children: Vec<DefinitionId>,
}

/// A forest of modules backed by an arena of nodes.
#[derive(Debug, Clone, Default)]
pub struct ProgramTree {
    nodes: Vec<Node>,
    modules: Vec<DefinitionId>,
}

impl ProgramTree {
    /// Create an empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module unit.
    pub fn add_module(&mut self, name: impl Into<String>) -> Definition {
        let def = self.push(DefinitionKind::Module, name.into(), None);
        self.modules.push(def.id);
        def
    }

    /// Add a type under a module or (as a nested type) under another type.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is not a module or type of this program.
    pub fn add_type(&mut self, parent: DefinitionId, name: impl Into<String>) -> Definition {
        let parent_kind = self.node(parent).kind;
        assert!(
            matches!(parent_kind, DefinitionKind::Module | DefinitionKind::Type),
            "a type cannot be declared inside a {}",
            parent_kind
        );
        self.push(DefinitionKind::Type, name.into(), Some(parent))
    }

    /// Add a method, field, property or event to a type.
    ///
    /// # Panics
    ///
    /// Panics if `owner` is not a type or `kind` is not a member kind.
    pub fn add_member(
        &mut self,
        owner: DefinitionId,
        kind: DefinitionKind,
        name: impl Into<String>,
    ) -> Definition {
        assert_eq!(self.node(owner).kind, DefinitionKind::Type, "members belong to types");
        assert!(
            !matches!(kind, DefinitionKind::Module | DefinitionKind::Type),
            "{} is not a member kind",
            kind
        );
        self.push(kind, name.into(), Some(owner))
    }

    /// Get a definition handle by id.
    pub fn get(&self, id: DefinitionId) -> Option<Definition> {
        self.nodes
            .get(id.0 as usize)
            .map(|n| Definition::new(id, n.kind))
    }

    /// Simple name of a definition.
    pub fn name(&self, id: DefinitionId) -> Option<&str> {
        self.nodes.get(id.0 as usize).map(|n| n.name.as_str())
    }

    /// Rename a definition. Returns `false` for an unknown id.
    pub fn rename(&mut self, id: DefinitionId, name: impl Into<String>) -> bool {
        match self.nodes.get_mut(id.0 as usize) {
            Some(node) => {
                node.name = name.into();
                true
            }
            None => false,
        }
    }

    pub fn parent(&self, id: DefinitionId) -> Option<Definition> {
        self.nodes
            .get(id.0 as usize)
            .and_then(|n| n.parent)
            .and_then(|p| self.get(p))
    }

    /// Direct children of a definition, in declaration order.
    pub fn children(&self, id: DefinitionId) -> Vec<Definition> {
        self.nodes
            .get(id.0 as usize)
            .map(|n| n.children.iter().filter_map(|&c| self.get(c)).collect())
            .unwrap_or_default()
    }

    /// Find a definition by its path (see [`Program::path_of`]).
    pub fn find(&self, path: &str) -> Option<Definition> {
        (0..self.nodes.len() as u32)
            .map(DefinitionId)
            .find(|&id| self.path(id).as_deref() == Some(path))
            .and_then(|id| self.get(id))
    }

    /// Number of definitions, modules included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Move every module of `other` into this program. Returns the new
    /// module handles.
    pub fn absorb(&mut self, other: &ProgramTree) -> Vec<Definition> {
        other
            .modules
            .iter()
            .map(|&m| {
                let module = self.add_module(other.node(m).name.clone());
                self.copy_children(other, m, module.id);
                module
            })
            .collect()
    }

    /// Load a program from its JSON description.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let doc: ProgramDoc = serde_json::from_slice(bytes)?;
        let mut tree = ProgramTree::new();
        for module in &doc.modules {
            let id = tree.add_module(module.name.clone()).id;
            for ty in &module.types {
                tree.load_type(id, ty);
            }
        }
        Ok(tree)
    }

    /// Serialize the whole program.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        let doc = ProgramDoc {
            modules: self.modules.iter().map(|&m| self.module_doc(m)).collect(),
        };
        serde_json::to_vec_pretty(&doc)
    }

    /// Serialize one module unit, or `None` when `module` is not a module.
    pub fn module_to_json(&self, module: DefinitionId) -> serde_json::Result<Option<Vec<u8>>> {
        if !self.modules.contains(&module) {
            return Ok(None);
        }
        serde_json::to_vec_pretty(&self.module_doc(module)).map(Some)
    }

    fn push(
        &mut self,
        kind: DefinitionKind,
        name: String,
        parent: Option<DefinitionId>,
    ) -> Definition {
        let id = DefinitionId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            name,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.0 as usize].children.push(id);
        }
        Definition::new(id, kind)
    }

    fn node(&self, id: DefinitionId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    fn path(&self, id: DefinitionId) -> Option<String> {
        let node = self.nodes.get(id.0 as usize)?;
        let parent = node.parent.map(|p| (p, self.node(p)));
        Some(match (node.kind, parent) {
            (DefinitionKind::Module, _) | (_, None) => node.name.clone(),
            (DefinitionKind::Type, Some((_, p))) if p.kind == DefinitionKind::Module => {
                node.name.clone()
            }
            (DefinitionKind::Type, Some((p, _))) => format!("{}/{}", self.path(p)?, node.name),
            (_, Some((p, _))) => format!("{}::{}", self.path(p)?, node.name),
        })
    }

    fn preorder(&self, id: DefinitionId, out: &mut Vec<Definition>) {
        let node = self.node(id);
        out.push(Definition::new(id, node.kind));
        for &child in &node.children {
            self.preorder(child, out);
        }
    }

    fn copy_children(&mut self, other: &ProgramTree, from: DefinitionId, to: DefinitionId) {
        for &child in &other.node(from).children {
            let node = other.node(child);
            let copy = self.push(node.kind, node.name.clone(), Some(to));
            self.copy_children(other, child, copy.id);
        }
    }

    fn load_type(&mut self, parent: DefinitionId, doc: &TypeDoc) {
        let ty = self.add_type(parent, doc.name.clone()).id;
        let members = [
            (DefinitionKind::Method, &doc.methods),
            (DefinitionKind::Field, &doc.fields),
            (DefinitionKind::Property, &doc.properties),
            (DefinitionKind::Event, &doc.events),
        ];
        for (kind, names) in members {
            for name in names {
                self.add_member(ty, kind, name.clone());
            }
        }
        for nested in &doc.nested {
            self.load_type(ty, nested);
        }
    }

    fn module_doc(&self, module: DefinitionId) -> ModuleDoc {
        ModuleDoc {
            name: self.node(module).name.clone(),
            types: self
                .node(module)
                .children
                .iter()
                .map(|&t| self.type_doc(t))
                .collect(),
        }
    }

    fn type_doc(&self, ty: DefinitionId) -> TypeDoc {
        let mut doc = TypeDoc {
            name: self.node(ty).name.clone(),
            ..TypeDoc::default()
        };
        for &child in &self.node(ty).children {
            let node = self.node(child);
            match node.kind {
                DefinitionKind::Method => doc.methods.push(node.name.clone()),
                DefinitionKind::Field => doc.fields.push(node.name.clone()),
                DefinitionKind::Property => doc.properties.push(node.name.clone()),
                DefinitionKind::Event => doc.events.push(node.name.clone()),
                DefinitionKind::Type => doc.nested.push(self.type_doc(child)),
                DefinitionKind::Module => {}
            }
        }
        doc
    }
}

impl Program for ProgramTree {
    fn modules(&self) -> Vec<Definition> {
        self.modules
            .iter()
            .map(|&m| Definition::new(m, DefinitionKind::Module))
            .collect()
    }

    fn definitions_of(&self, module: DefinitionId) -> Vec<Definition> {
        let mut out = Vec::new();
        if self.modules.contains(&module) {
            self.preorder(module, &mut out);
        }
        out
    }

    /// Modules are paths by name, top-level types by full name, nested types
    /// as `Outer/Inner`, members as `Type::member`.
    fn path_of(&self, def: DefinitionId) -> Option<String> {
        self.path(def)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProgramDoc {
    #[serde(default)]
    modules: Vec<ModuleDoc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ModuleDoc {
    name: String,
    #[serde(default)]
    types: Vec<TypeDoc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct TypeDoc {
    name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    methods: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    properties: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    events: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    nested: Vec<TypeDoc>,
}
