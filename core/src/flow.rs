//! Pass 2: actual flow.
//!
//! Replays the graph from the same sources, now honouring the
//! per-node assessments: crashed nodes swallow what reaches them and
//! overloaded nodes admit a proportional share of every inbound path.
//! Queues forward at their processing rate and release drained backlog
//! as extra flow. Caches and stores fulfil requests. All accounting is
//! accumulated per node index.

use crate::{
    component::ComponentType,
    config::{CapacityConfig, ScoringConfig},
    error::{EngineError, EngineResult},
    graph::{Graph, NodeIdx},
    potential::{pass_through, PotentialLoad},
    resources::{NodeAssessment, QueuePlan},
    traffic::Traffic,
    walker::{walk, Visitor, WalkStats},
};

/// What travels along an edge in Pass 2.
#[derive(Debug, Clone, Copy)]
pub struct FlowCarry {
    pub traffic: Traffic,
    /// The path has crossed an API gateway.
    pub via_gateway: bool,
}

impl FlowCarry {
    pub fn from_source(traffic: Traffic) -> Self {
        Self { traffic, via_gateway: false }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeFlow {
    pub arrivals: usize,
    /// Everything that reached the node, before throttling.
    pub arrived: Traffic,
    pub admitted: Traffic,
    pub forwarded: Traffic,
    /// Legitimate requests this node completed.
    pub fulfilled: f64,
    /// Writes a replication slave received and could not apply.
    pub rejected_writes: f64,
    /// Weighted malicious requests that reached stored data.
    pub incidents: f64,
}

#[derive(Debug, Clone)]
pub struct ActualFlow {
    pub per_node: Vec<NodeFlow>,
    pub stats: WalkStats,
}

impl ActualFlow {
    pub fn fulfilled(&self) -> f64 {
        self.per_node.iter().map(|n| n.fulfilled).sum()
    }

    pub fn incidents(&self) -> f64 {
        self.per_node.iter().map(|n| n.incidents).sum()
    }

    pub fn reached(&self, node: NodeIdx) -> bool {
        self.per_node[node].arrivals > 0
    }
}

struct FlowPass<'a> {
    potential: &'a PotentialLoad,
    assessments: &'a [NodeAssessment],
    queue_plans: &'a [Option<QueuePlan>],
    capacity: &'a CapacityConfig,
    scoring: &'a ScoringConfig,
    per_node: Vec<NodeFlow>,
}

impl Visitor for FlowPass<'_> {
    type Carry = FlowCarry;

    fn arrive(
        &mut self,
        graph: &Graph,
        node: NodeIdx,
        carry: FlowCarry,
    ) -> EngineResult<Vec<(NodeIdx, FlowCarry)>> {
        if !self.potential.reached[node] {
            // Pass 1 ran out of arrival budget before this node.
            if self.potential.stats.budget_dropped > 0 {
                return Ok(Vec::new());
            }
            let msg = format!(
                "component '{}' reached by actual flow but not by potential load",
                graph.node(node).id
            );
            log::error!("{msg}");
            return Err(EngineError::SimulationInvariantViolation(msg));
        }

        let spec = graph.node(node);
        let assessment = &self.assessments[node];
        let flow = &mut self.per_node[node];
        flow.arrivals += 1;
        flow.arrived += carry.traffic;

        if !assessment.is_up() {
            return Ok(Vec::new());
        }

        let via_gateway = carry.via_gateway || spec.kind == ComponentType::ApiGateway;
        let successors = graph.successors(node);

        // Queues buffer everything; other kinds admit their share.
        let admitted = if spec.kind == ComponentType::MessageQueue {
            carry.traffic
        } else {
            carry.traffic.scaled(assessment.admit_ratio)
        };
        flow.admitted += admitted;

        if spec.kind.is_store() {
            flow.fulfilled += admitted.read;
            if spec.is_slave() {
                flow.rejected_writes += admitted.write;
            } else {
                flow.fulfilled += admitted.write;
            }
            if spec.kind.is_data_store() {
                let weight = if via_gateway { self.scoring.gateway_mitigation } else { 1.0 };
                flow.incidents += carry.traffic.malicious * weight;
            }
            return Ok(Vec::new());
        }

        if spec.kind.absorbs_reads() {
            flow.fulfilled += admitted.read * self.capacity.cache_hit_ratio;
        }

        if let Some(plan) = &self.queue_plans[node] {
            let out = admitted.scaled(plan.inflow_ratio);
            flow.forwarded += out;
            return Ok(successors
                .iter()
                .zip(&plan.shares)
                .map(|(&s, &share)| (s, FlowCarry { traffic: out.scaled(share), via_gateway }))
                .collect());
        }

        let out = pass_through(spec.kind, admitted, self.capacity, true);
        flow.forwarded += out;
        let share = out.split(successors.len());
        Ok(successors
            .iter()
            .map(|&s| (s, FlowCarry { traffic: share, via_gateway }))
            .collect())
    }
}

#[allow(clippy::too_many_arguments)]
pub fn compute(
    graph: &Graph,
    mut seeds: Vec<(NodeIdx, FlowCarry)>,
    potential: &PotentialLoad,
    assessments: &[NodeAssessment],
    queue_plans: &[Option<QueuePlan>],
    capacity: &CapacityConfig,
    scoring: &ScoringConfig,
    max_arrivals: usize,
) -> EngineResult<ActualFlow> {
    let mut pass = FlowPass {
        potential,
        assessments,
        queue_plans,
        capacity,
        scoring,
        per_node: vec![NodeFlow::default(); graph.len()],
    };

    // Drained backlog leaves each queue as its own flow, whether or not
    // anything arrived at the queue this tick.
    for (queue, plan) in queue_plans.iter().enumerate() {
        let Some(plan) = plan else { continue };
        if plan.drained.is_zero() {
            continue;
        }
        pass.per_node[queue].forwarded += plan.drained;
        for (&consumer, &share) in graph.successors(queue).iter().zip(&plan.shares) {
            seeds.push((consumer, FlowCarry::from_source(plan.drained.scaled(share))));
        }
    }

    let (stats, _) = walk(graph, &mut pass, seeds, max_arrivals)?;
    Ok(ActualFlow { per_node: pass.per_node, stats })
}
