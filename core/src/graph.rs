//! Graph builder: turns a flat design into an indexed adjacency arena.
//!
//! Nodes are addressed by `NodeIdx` (their position in the design's
//! component list) so the traversal hot path never does id lookups.

use crate::{
    component::{ComponentSpec, ComponentType},
    design::Design,
    error::{EngineError, EngineResult},
};
use std::collections::HashMap;

pub type NodeIdx = usize;

#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<ComponentSpec>,
    index: HashMap<String, NodeIdx>,
    successors: Vec<Vec<NodeIdx>>,
    roots: Vec<NodeIdx>,
}

impl Graph {
    /// Resolve every component and connection. Fails with `InvalidInput`
    /// on duplicate ids, unresolvable edges or malformed properties;
    /// nothing is simulated in that case.
    pub fn build(design: &Design) -> EngineResult<Self> {
        let mut nodes = Vec::with_capacity(design.components.len());
        let mut index = HashMap::with_capacity(design.components.len());

        for component in &design.components {
            let spec = ComponentSpec::resolve(component)?;
            if index.insert(spec.id.clone(), nodes.len()).is_some() {
                return Err(EngineError::invalid(format!(
                    "duplicate component id '{}'",
                    spec.id
                )));
            }
            nodes.push(spec);
        }

        let mut successors = vec![Vec::new(); nodes.len()];
        for conn in &design.connections {
            let from = *index.get(&conn.from_id).ok_or_else(|| {
                EngineError::invalid(format!(
                    "connection {} -> {}: unknown source component",
                    conn.from_id, conn.to_id
                ))
            })?;
            let to = *index.get(&conn.to_id).ok_or_else(|| {
                EngineError::invalid(format!(
                    "connection {} -> {}: unknown target component",
                    conn.from_id, conn.to_id
                ))
            })?;
            successors[from].push(to);
        }

        let roots = nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.kind == ComponentType::TrafficSource)
            .map(|(i, _)| i)
            .collect();

        Ok(Self { nodes, index, successors, roots })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: NodeIdx) -> &ComponentSpec {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIdx, &ComponentSpec)> {
        self.nodes.iter().enumerate()
    }

    pub fn successors(&self, idx: NodeIdx) -> &[NodeIdx] {
        &self.successors[idx]
    }

    /// Traffic-origin nodes, in design order.
    pub fn roots(&self) -> &[NodeIdx] {
        &self.roots
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIdx> {
        self.index.get(id).copied()
    }
}
