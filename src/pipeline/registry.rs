//! Plugin registry and initialization ordering.
//!
//! Plugins are registered explicitly, once per run. Their declared
//! before/after constraints are resolved into a deterministic initialization
//! order, and that order decides which plugin inserts its phases first. The
//! order never re-sorts phases afterwards: within a slot, insertion order is
//! execution order.

use std::collections::{BTreeSet, HashMap};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::core::plugin::Plugin;
use crate::core::plugin_id::PluginId;
use crate::core::preset::Preset;
use crate::pipeline::errors::ConfigurationError;
use crate::pipeline::table::{Pipeline, PipelineScope};

/// Known plugins, in registration order.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
    by_id: HashMap<PluginId, usize>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. Ids must be unique.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> Result<(), ConfigurationError> {
        let id = plugin.id();
        if self.by_id.contains_key(&id) {
            return Err(ConfigurationError::DuplicatePlugin { plugin: id });
        }

        tracing::trace!(plugin = %id, preset = %plugin.preset(), "registered plugin");
        self.by_id.insert(id, self.plugins.len());
        self.plugins.push(plugin);
        Ok(())
    }

    /// Get a plugin by id.
    pub fn get(&self, id: PluginId) -> Option<&dyn Plugin> {
        self.by_id.get(&id).map(|&i| self.plugins[i].as_ref())
    }

    /// Check if a plugin is registered.
    pub fn contains(&self, id: PluginId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Iterate plugins in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Plugin> + '_ {
        self.plugins.iter().map(|p| p.as_ref())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Plugins enabled by `preset`, in registration order.
    pub fn plugins_in_preset(&self, preset: Preset) -> Vec<PluginId> {
        self.iter()
            .filter(|p| preset.enables(p.preset()))
            .map(|p| p.id())
            .collect()
    }

    /// Resolve the plugin initialization order.
    ///
    /// Every constraint becomes an edge `A -> B` ("A initializes before B").
    /// The result is a topological order of that graph; among plugins that
    /// are ready at the same time, the one registered first wins.
    pub fn resolve_order(&self) -> Result<Vec<PluginId>, ConfigurationError> {
        let graph = self.constraint_graph()?;

        let mut in_degree: Vec<usize> = graph
            .node_indices()
            .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();

        // Node indices follow registration order, so the smallest ready
        // index is the earliest registered ready plugin.
        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(graph.node_count());
        while let Some(i) = ready.pop_first() {
            let node = NodeIndex::new(i);
            order.push(graph[node]);

            for next in graph.neighbors(node) {
                let d = &mut in_degree[next.index()];
                *d -= 1;
                if *d == 0 {
                    ready.insert(next.index());
                }
            }
        }

        if order.len() < graph.node_count() {
            return Err(ConfigurationError::Cycle {
                plugins: find_cycle(&graph),
            });
        }

        tracing::debug!(
            order = %order.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(", "),
            "resolved plugin order"
        );
        Ok(order)
    }

    /// Resolve the order, then let every plugin insert its phases.
    pub fn build_pipeline(&self) -> Result<Pipeline, ConfigurationError> {
        let order = self.resolve_order()?;
        let mut pipeline = Pipeline::new();

        for id in order {
            let plugin = &self.plugins[self.by_id[&id]];
            let before = pipeline.len();
            plugin.populate_pipeline(&mut PipelineScope::new(&mut pipeline, id));
            tracing::debug!(
                plugin = %id,
                phases = pipeline.len() - before,
                "plugin populated pipeline"
            );
        }

        Ok(pipeline)
    }

    fn constraint_graph(&self) -> Result<DiGraph<PluginId, ()>, ConfigurationError> {
        let mut graph = DiGraph::with_capacity(self.plugins.len(), 0);
        for plugin in &self.plugins {
            graph.add_node(plugin.id());
        }

        for (i, plugin) in self.plugins.iter().enumerate() {
            let node = NodeIndex::new(i);
            let id = plugin.id();

            for other in plugin.before() {
                let target = self.lookup(other, || format!("`before` list of plugin `{}`", id))?;
                graph.update_edge(node, target, ());
            }
            for other in plugin.after() {
                let source = self.lookup(other, || format!("`after` list of plugin `{}`", id))?;
                graph.update_edge(source, node, ());
            }
        }

        Ok(graph)
    }

    fn lookup(
        &self,
        id: PluginId,
        referenced_by: impl FnOnce() -> String,
    ) -> Result<NodeIndex, ConfigurationError> {
        self.by_id
            .get(&id)
            .map(|&i| NodeIndex::new(i))
            .ok_or_else(|| ConfigurationError::UnknownPlugin {
                plugin: id.to_string(),
                referenced_by: referenced_by(),
            })
    }
}

/// Plugins on one cycle, in registration order.
fn find_cycle(graph: &DiGraph<PluginId, ()>) -> Vec<PluginId> {
    let component = tarjan_scc(graph)
        .into_iter()
        .find(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .unwrap_or_default();

    let mut nodes = component;
    nodes.sort();
    nodes.into_iter().map(|n| graph[n]).collect()
}
