//! Pass 1: potential load.
//!
//! Walks from every traffic source ignoring capacity and failures, and
//! sums what would arrive at each node along every path. Crash and
//! scaling decisions are judged against this offered load, not against
//! what survives throttling upstream of the node.

use crate::{
    component::ComponentType,
    config::CapacityConfig,
    error::EngineResult,
    graph::{Graph, NodeIdx},
    traffic::Traffic,
    walker::{walk, Truncation, Visitor, WalkStats},
};

/// Output of Pass 1, indexed by `NodeIdx`.
#[derive(Debug, Clone)]
pub struct PotentialLoad {
    pub per_node: Vec<Traffic>,
    pub reached: Vec<bool>,
    pub stats: WalkStats,
    pub truncations: Vec<Truncation>,
}

impl PotentialLoad {
    pub fn total(&self, node: NodeIdx) -> f64 {
        self.per_node[node].total()
    }
}

/// What a node sends onward, before the even split across its edges.
/// `filter_losses` adds the WAF's false positives, which only the
/// actual-flow pass models.
pub(crate) fn pass_through(
    kind: ComponentType,
    traffic: Traffic,
    capacity: &CapacityConfig,
    filter_losses: bool,
) -> Traffic {
    match kind {
        k if k.absorbs_reads() => Traffic {
            read: traffic.read * (1.0 - capacity.cache_hit_ratio),
            ..traffic
        },
        ComponentType::Waf => {
            let keep = if filter_losses { 1.0 - capacity.waf_false_positive } else { 1.0 };
            Traffic {
                read: traffic.read * keep,
                write: traffic.write * keep,
                malicious: traffic.malicious * capacity.waf_malicious_pass,
            }
        }
        // Stores serve what reaches them and forward nothing.
        k if k.is_store() => Traffic::ZERO,
        _ => traffic,
    }
}

struct PotentialPass<'a> {
    capacity: &'a CapacityConfig,
    per_node: Vec<Traffic>,
    reached: Vec<bool>,
}

impl Visitor for PotentialPass<'_> {
    type Carry = Traffic;

    fn arrive(
        &mut self,
        graph: &Graph,
        node: NodeIdx,
        incoming: Traffic,
    ) -> EngineResult<Vec<(NodeIdx, Traffic)>> {
        self.per_node[node] += incoming;
        self.reached[node] = true;

        let kind = graph.node(node).kind;
        if kind.is_store() {
            return Ok(Vec::new());
        }
        let successors = graph.successors(node);
        let out = pass_through(kind, incoming, self.capacity, false);
        let share = out.split(successors.len());
        Ok(successors.iter().map(|&s| (s, share)).collect())
    }
}

/// Run Pass 1 from `seeds` (one entry per traffic source).
pub fn compute(
    graph: &Graph,
    seeds: Vec<(NodeIdx, Traffic)>,
    capacity: &CapacityConfig,
    max_arrivals: usize,
) -> EngineResult<PotentialLoad> {
    let mut pass = PotentialPass {
        capacity,
        per_node: vec![Traffic::ZERO; graph.len()],
        reached: vec![false; graph.len()],
    };
    let (stats, truncations) = walk(graph, &mut pass, seeds, max_arrivals)?;
    Ok(PotentialLoad {
        per_node: pass.per_node,
        reached: pass.reached,
        stats,
        truncations,
    })
}
