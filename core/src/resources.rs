//! Resource & failure model.
//!
//! Runs between the two passes. For every node it decides, from the
//! Pass-1 offered load and the incoming `EngineState`:
//!   1. persistent crash (state says the node is down)
//!   2. base capacity, widened for replicated databases' reads
//!   3. auto-scaled replica count and which replicas are still booting
//!   4. overload crash (offered > capacity x kind multiplier, outside grace)
//!   5. synthetic CPU / RAM and out-of-memory crash
//!   6. the proportional throttle applied to every inbound path
//!
//! Message queues additionally get a `QueuePlan` (processing rate,
//! backlog, consumer shares) once every consumer's health is known.

use crate::{
    component::{ComponentSpec, ComponentType, DeliveryMode, KindProfile, Replication},
    config::{CapacityConfig, ResourceConfig},
    graph::{Graph, NodeIdx},
    potential::PotentialLoad,
    state::{rescale_replica_starts, EngineState},
    traffic::Traffic,
    types::Seconds,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashCause {
    /// Already down when this tick started.
    Persistent,
    Overload,
    OutOfMemory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeAssessment {
    pub crash: Option<CrashCause>,
    /// `None` when the component has no throughput limit.
    pub effective_capacity: Option<f64>,
    /// Replicas billed this tick: active plus booting.
    pub replicas: u32,
    pub booting: u32,
    pub crash_limit: Option<f64>,
    pub in_grace: bool,
    /// Offered load over effective capacity, unweighted.
    pub utilization: f64,
    pub cpu_pct: f64,
    pub ram_pct: f64,
    /// Share of each inbound path admitted; 1.0 when under capacity.
    pub admit_ratio: f64,
    /// Boot timestamps to carry into the next tick (auto-scaled nodes).
    pub next_replica_starts: Option<Vec<Seconds>>,
}

impl NodeAssessment {
    pub fn is_up(&self) -> bool {
        self.crash.is_none()
    }

    /// True when this tick's assessment took the node down.
    pub fn crashed_now(&self) -> bool {
        matches!(self.crash, Some(CrashCause::Overload | CrashCause::OutOfMemory))
    }
}

pub fn crash_multiplier(kind: ComponentType, config: &CapacityConfig) -> f64 {
    match kind {
        ComponentType::MessageQueue | ComponentType::ObjectStorage => config.durable_crash_multiplier,
        ComponentType::LoadBalancer | ComponentType::Cdn | ComponentType::Waf => {
            config.edge_crash_multiplier
        }
        ComponentType::AutoScalingGroup => config.scaling_group_crash_multiplier,
        _ => config.default_crash_multiplier,
    }
}

/// Capacity before auto-scaling. A master database with slaves serves
/// reads from every replica, so the read share of its load sees
/// `(1 + slaves)` times the base.
fn base_capacity(spec: &ComponentSpec, offered: &Traffic) -> Option<f64> {
    let base = spec.max_qps?;
    match &spec.profile {
        KindProfile::Store(store)
            if spec.kind == ComponentType::Database && store.replication == Replication::MasterSlave =>
        {
            let total = offered.total();
            let read_share = if total > 0.0 {
                (offered.read + offered.malicious) / total
            } else {
                1.0
            };
            Some(base * (1.0 + store.slave_count as f64 * read_share))
        }
        _ => Some(base),
    }
}

/// Largest throughput a consumer could ever take, counting its
/// auto-scaling ceiling.
pub fn max_potential_capacity(spec: &ComponentSpec) -> Option<f64> {
    let base = spec.max_qps?;
    Some(match spec.autoscale() {
        Some(p) => base * p.max_replicas as f64,
        None => base,
    })
}

fn ram_usage(spec: &ComponentSpec, utilization: f64, backlog: f64, config: &ResourceConfig) -> f64 {
    match spec.kind {
        k if k.absorbs_reads() => config.cache_ram_base_pct + config.cache_ram_per_util_pct * utilization,
        ComponentType::MessageQueue => {
            let buffer = spec.max_qps.map(|q| q * config.queue_buffer_seconds).unwrap_or(0.0);
            let fill = if buffer > 0.0 { backlog / buffer } else { 0.0 };
            config.queue_ram_base_pct + config.queue_ram_span_pct * fill
        }
        k if k.is_store() => config.store_ram_base_pct + config.store_ram_per_util_pct * utilization,
        _ => config.default_ram_base_pct + config.default_ram_per_util_pct * utilization,
    }
}

pub struct Assessor<'a> {
    pub capacity: &'a CapacityConfig,
    pub resources: &'a ResourceConfig,
    pub state: &'a EngineState,
    pub elapsed: Seconds,
}

impl Assessor<'_> {
    pub fn assess_all(&self, graph: &Graph, potential: &PotentialLoad) -> Vec<NodeAssessment> {
        graph
            .nodes()
            .map(|(idx, spec)| self.assess(spec, &potential.per_node[idx]))
            .collect()
    }

    fn assess(&self, spec: &ComponentSpec, offered: &Traffic) -> NodeAssessment {
        let in_grace = self
            .state
            .in_grace(&spec.id, self.elapsed, self.capacity.restart_grace_seconds);
        let mut a = NodeAssessment {
            crash: None,
            effective_capacity: None,
            replicas: 1,
            booting: 0,
            crash_limit: None,
            in_grace,
            utilization: 0.0,
            cpu_pct: self.resources.cpu_idle_pct,
            ram_pct: 0.0,
            admit_ratio: 1.0,
            next_replica_starts: None,
        };

        // 1. Persistent crash.
        if self.state.is_crashed(&spec.id) {
            a.crash = Some(CrashCause::Persistent);
            a.cpu_pct = 0.0;
            return a;
        }

        let load = offered.total();
        let base = base_capacity(spec, offered);

        // 2-3. Capacity, with auto-scaling when enabled.
        a.effective_capacity = match (base, spec.autoscale()) {
            (Some(single), Some(profile)) if single > 0.0 => {
                let threshold = profile
                    .scale_up_threshold
                    .unwrap_or(self.capacity.default_scale_up_threshold)
                    .max(f64::EPSILON);
                let wanted = (load / (single * threshold)).ceil();
                let target = wanted.clamp(1.0, profile.max_replicas as f64) as u32;

                let extra = (target - 1) as usize;
                let starts = rescale_replica_starts(
                    self.state.replica_starts_of(&spec.id),
                    extra,
                    self.elapsed,
                );
                let booting = starts
                    .iter()
                    .filter(|&&at| self.elapsed - at < self.capacity.replica_warmup_seconds)
                    .count() as u32;

                a.replicas = target;
                a.booting = booting;
                a.next_replica_starts = Some(starts);
                Some(single * (target - booting) as f64)
            }
            (cap, _) => cap,
        };

        let Some(capacity) = a.effective_capacity else {
            a.ram_pct = ram_usage(spec, 0.0, self.state.backlog_of(&spec.id), self.resources);
            return a;
        };

        // 4. Overload crash.
        let limit = capacity * crash_multiplier(spec.kind, self.capacity);
        a.crash_limit = Some(limit);
        if !in_grace && load > limit {
            a.crash = Some(CrashCause::Overload);
            a.cpu_pct = 0.0;
            return a;
        }

        // 5. Synthetic CPU and RAM.
        a.utilization = if capacity > 0.0 {
            load / capacity
        } else if load > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
        let weighted = offered.read + offered.malicious + offered.write * self.resources.write_cost_factor;
        let weighted_util = if capacity > 0.0 {
            weighted / capacity
        } else if weighted > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
        a.cpu_pct = (self.resources.cpu_idle_pct + weighted_util * self.resources.cpu_scale_pct)
            .clamp(0.0, 100.0);
        // RAM holds admitted work only; the throttled excess is shed.
        a.ram_pct = ram_usage(
            spec,
            a.utilization.min(1.0),
            self.state.backlog_of(&spec.id),
            self.resources,
        );
        if !in_grace && a.ram_pct > 100.0 {
            a.crash = Some(CrashCause::OutOfMemory);
            a.cpu_pct = 0.0;
            return a;
        }

        // 6. Proportional throttle. Queues buffer instead.
        if spec.kind != ComponentType::MessageQueue && load > capacity {
            a.admit_ratio = if load > 0.0 { capacity / load } else { 1.0 };
        }
        a
    }
}

/// How a message queue drains this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuePlan {
    /// min(own throughput, summed base capacity of live consumers).
    pub processing_rate: f64,
    /// Share of arriving traffic forwarded this tick; never above 1.
    pub inflow_ratio: f64,
    /// Carried backlog processed this tick, forwarded on top of the
    /// inflow from the queue itself.
    pub drained: Traffic,
    pub backlog: f64,
    pub delay_ms: f64,
    /// Fraction of forwarded traffic per outgoing edge, in edge order.
    pub shares: Vec<f64>,
}

/// Plan one queue from its Pass-1 inflow and the backlog it carries in.
/// Fresh inflow is processed first; spare processing drains backlog.
/// Drained backlog keeps the inflow's mix, or counts as writes when
/// nothing arrived.
pub fn plan_queue(
    graph: &Graph,
    node: NodeIdx,
    offered: Traffic,
    carried_backlog: f64,
    assessments: &[NodeAssessment],
    latency_ceiling_ms: f64,
) -> QueuePlan {
    let spec = graph.node(node);
    let consumers = graph.successors(node);

    let consumer_capacity: f64 = consumers
        .iter()
        .filter(|&&c| assessments[c].is_up())
        .map(|&c| graph.node(c).max_qps.unwrap_or(f64::INFINITY))
        .sum();
    let processing_rate = spec.max_qps.unwrap_or(f64::INFINITY).min(consumer_capacity);

    let inflow = offered.total();
    let from_inflow = processing_rate.min(inflow);
    let from_backlog = (processing_rate - from_inflow).min(carried_backlog).max(0.0);
    let backlog = (inflow - from_inflow + carried_backlog - from_backlog).max(0.0);
    let inflow_ratio = if inflow > 0.0 { from_inflow / inflow } else { 0.0 };
    let drained = if inflow > 0.0 {
        offered.scaled(from_backlog / inflow)
    } else {
        Traffic { write: from_backlog, ..Traffic::ZERO }
    };
    let delay_ms = if backlog <= 0.0 {
        0.0
    } else if processing_rate > 0.0 {
        (backlog / processing_rate * 1000.0).min(latency_ceiling_ms)
    } else {
        latency_ceiling_ms
    };

    let pull = matches!(
        &spec.profile,
        KindProfile::Queue(q) if q.delivery == DeliveryMode::Pull
    );
    let shares = if pull {
        pull_shares(graph, consumers, assessments, from_inflow + from_backlog)
    } else {
        let n = consumers.len().max(1) as f64;
        vec![1.0 / n; consumers.len()]
    };

    QueuePlan { processing_rate, inflow_ratio, drained, backlog, delay_ms, shares }
}

/// Pull delivery: `amount` is split evenly across live consumers, but
/// no consumer takes more than the most it could ever handle; what a
/// capped consumer cannot take is spread over the others. Dead
/// consumers take nothing.
fn pull_shares(
    graph: &Graph,
    consumers: &[NodeIdx],
    assessments: &[NodeAssessment],
    amount: f64,
) -> Vec<f64> {
    let caps: Vec<Option<f64>> = consumers
        .iter()
        .map(|&c| {
            assessments[c]
                .is_up()
                .then(|| max_potential_capacity(graph.node(c)).unwrap_or(f64::INFINITY))
        })
        .collect();

    let mut open: Vec<usize> = (0..consumers.len()).filter(|&i| caps[i].is_some()).collect();
    if open.is_empty() {
        return vec![0.0; consumers.len()];
    }
    if amount <= 0.0 {
        let even = 1.0 / open.len() as f64;
        return caps.iter().map(|c| if c.is_some() { even } else { 0.0 }).collect();
    }

    let mut taken = vec![0.0; consumers.len()];
    let mut remaining = amount;
    while remaining > 0.0 && !open.is_empty() {
        let even = remaining / open.len() as f64;
        let mut still_open = Vec::with_capacity(open.len());
        for &i in &open {
            let room = caps[i].unwrap_or(0.0) - taken[i];
            if even < room {
                taken[i] += even;
                remaining -= even;
                still_open.push(i);
            } else {
                taken[i] += room.max(0.0);
                remaining -= room.max(0.0);
            }
        }
        if still_open.len() == open.len() {
            break;
        }
        open = still_open;
    }

    taken.iter().map(|t| t / amount).collect()
}
