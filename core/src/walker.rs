//! Iterative depth-first walker with path-local cycle protection.
//!
//! Every arrival at a node is a separate visit: a node reachable through
//! two branches of a diamond is visited twice and accumulates both. A
//! node that is already on the CURRENT path is not re-entered; that
//! arrival is truncated and counted instead of looping forever.
//!
//! Paths live in an arena of parent-linked frames, so each work item
//! carries one index rather than a cloned visited set, and stack depth
//! is independent of graph depth.

use crate::{
    error::EngineResult,
    graph::{Graph, NodeIdx},
};

/// Per-pass behaviour plugged into the walker.
pub trait Visitor {
    /// Whatever travels along an edge (a traffic split plus any
    /// path-scoped context).
    type Carry;

    /// Handle one arrival at `node`. Returns what to send along each
    /// outgoing edge, as `(successor, carry)` pairs in edge order.
    fn arrive(
        &mut self,
        graph: &Graph,
        node: NodeIdx,
        carry: Self::Carry,
    ) -> EngineResult<Vec<(NodeIdx, Self::Carry)>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub arrivals: usize,
    /// Arrivals refused because the node was already on the path.
    pub truncated: usize,
    /// Arrivals dropped after the arrival budget ran out.
    pub budget_dropped: usize,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    node: NodeIdx,
    parent: Option<usize>,
}

#[derive(Default)]
struct PathArena {
    frames: Vec<Frame>,
}

impl PathArena {
    fn push(&mut self, node: NodeIdx, parent: Option<usize>) -> usize {
        self.frames.push(Frame { node, parent });
        self.frames.len() - 1
    }

    fn on_path(&self, node: NodeIdx, mut cursor: Option<usize>) -> bool {
        while let Some(i) = cursor {
            let frame = self.frames[i];
            if frame.node == node {
                return true;
            }
            cursor = frame.parent;
        }
        false
    }

    /// Node ids along the path ending at `frame`, root first.
    fn path(&self, frame: usize) -> Vec<NodeIdx> {
        let mut out = Vec::new();
        let mut cursor = Some(frame);
        while let Some(i) = cursor {
            out.push(self.frames[i].node);
            cursor = self.frames[i].parent;
        }
        out.reverse();
        out
    }
}

struct WorkItem<C> {
    node: NodeIdx,
    carry: C,
    parent: Option<usize>,
}

/// Something the walker refused to enter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truncation {
    pub node: NodeIdx,
    /// The path that tried to re-enter `node`, root first.
    pub path: Vec<NodeIdx>,
}

/// Walk from `seeds` (each seed starts its own path). Visits happen in
/// the same order a recursive DFS over edge order would produce.
pub fn walk<V: Visitor>(
    graph: &Graph,
    visitor: &mut V,
    seeds: Vec<(NodeIdx, V::Carry)>,
    max_arrivals: usize,
) -> EngineResult<(WalkStats, Vec<Truncation>)> {
    let mut arena = PathArena::default();
    let mut stats = WalkStats::default();
    let mut truncations = Vec::new();

    let mut stack: Vec<WorkItem<V::Carry>> = seeds
        .into_iter()
        .rev()
        .map(|(node, carry)| WorkItem { node, carry, parent: None })
        .collect();

    while let Some(item) = stack.pop() {
        if arena.on_path(item.node, item.parent) {
            stats.truncated += 1;
            let path = item.parent.map(|p| arena.path(p)).unwrap_or_default();
            truncations.push(Truncation { node: item.node, path });
            continue;
        }
        if stats.arrivals >= max_arrivals {
            stats.budget_dropped += 1;
            continue;
        }
        stats.arrivals += 1;

        let frame = arena.push(item.node, item.parent);
        let next = visitor.arrive(graph, item.node, item.carry)?;
        for (node, carry) in next.into_iter().rev() {
            stack.push(WorkItem { node, carry, parent: Some(frame) });
        }
    }

    if stats.budget_dropped > 0 {
        log::warn!(
            "walk stopped after {} arrivals; {} further arrivals dropped",
            stats.arrivals,
            stats.budget_dropped
        );
    }

    Ok((stats, truncations))
}
