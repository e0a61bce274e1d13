//! The evaluation engine: scores one design at one instant.
//!
//! EXECUTION ORDER (fixed):
//!   1. Validate inputs and build the graph arena
//!   2. Demand model: traffic emitted by every source
//!   3. Pass 1: potential load per node
//!   4. Resource & failure model: capacity, scaling, crashes, throttle
//!   5. Queue plans (need every consumer's health from step 4)
//!   6. Pass 2: actual flow, fulfilment, security incidents
//!   7. Scoring, latency, result and next state
//!
//! RULES:
//!   - `evaluate` is a pure function of (design, scenario, elapsed, state).
//!   - Inputs are never mutated; carried state comes back in `next_state`.
//!   - All randomness flows through `EventRng`.

use crate::{
    component::ComponentType,
    config::EngineConfig,
    demand::DemandModel,
    design::Design,
    error::{EngineError, EngineResult},
    evaluation::{Evaluation, EvaluationResult},
    event::EvalEvent,
    flow::{self, ActualFlow, FlowCarry},
    graph::{Graph, NodeIdx},
    potential::{self, PotentialLoad},
    resources::{plan_queue, Assessor, CrashCause, NodeAssessment, QueuePlan},
    scenario::Scenario,
    scoring::{self, ConsistencyExposure, ScoreContext},
    state::EngineState,
    traffic::Traffic,
    types::Seconds,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct SimEngine {
    config: EngineConfig,
}

impl SimEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate with state seeded from the design's property markers.
    pub fn evaluate_snapshot(
        &self,
        design: &Design,
        scenario: &Scenario,
        elapsed: Seconds,
    ) -> EngineResult<Evaluation> {
        let state = EngineState::from_design(design)?;
        self.evaluate(design, scenario, elapsed, &state)
    }

    pub fn evaluate(
        &self,
        design: &Design,
        scenario: &Scenario,
        elapsed: Seconds,
        state: &EngineState,
    ) -> EngineResult<Evaluation> {
        validate(design, scenario, elapsed)?;
        let graph = Graph::build(design)?;
        for id in state.unknown_ids(&graph) {
            log::warn!("design {}: state names unknown component '{id}', ignored", design.id);
        }

        let cfg = &self.config;
        let max_arrivals = cfg.traversal.max_arrivals;

        // Demand.
        let demand = DemandModel::new(&cfg.demand);
        let retention = design.retention_rate();
        let sources: Vec<(NodeIdx, Traffic)> = graph
            .roots()
            .iter()
            .map(|&r| (r, demand.source_traffic(graph.node(r), &scenario.phases, retention, elapsed)))
            .collect();
        let offered = sources.iter().fold(Traffic::ZERO, |acc, (_, t)| acc + *t);

        // Pass 1.
        let potential = potential::compute(&graph, sources.clone(), &cfg.capacity, max_arrivals)?;

        // Resource & failure model.
        let assessments = Assessor {
            capacity: &cfg.capacity,
            resources: &cfg.resources,
            state,
            elapsed,
        }
        .assess_all(&graph, &potential);

        let queue_plans: Vec<Option<QueuePlan>> = graph
            .nodes()
            .map(|(idx, spec)| {
                let live = spec.kind == ComponentType::MessageQueue
                    && potential.reached[idx]
                    && assessments[idx].is_up();
                live.then(|| {
                    plan_queue(
                        &graph,
                        idx,
                        potential.per_node[idx],
                        state.backlog_of(&spec.id),
                        &assessments,
                        cfg.scoring.latency_ceiling_ms,
                    )
                })
            })
            .collect();

        // Pass 2.
        let actual = flow::compute(
            &graph,
            sources.into_iter().map(|(n, t)| (n, FlowCarry::from_source(t))).collect(),
            &potential,
            &assessments,
            &queue_plans,
            &cfg.capacity,
            &cfg.scoring,
            max_arrivals,
        )?;

        let ledger = Ledger {
            graph: &graph,
            state,
            potential: &potential,
            assessments: &assessments,
            queue_plans: &queue_plans,
            actual: &actual,
        };
        let result = self.assemble(design, scenario, elapsed, offered, &ledger);
        let next_state = ledger.next_state();

        log::debug!(
            "design={} t={elapsed:.1}s offered={:.1} fulfilled={:.1} score={:.1} passed={} crashed={}",
            design.id,
            result.offered_rps,
            result.fulfilled_rps,
            result.total_score,
            result.passed,
            result.crashed_component_ids.len()
        );

        Ok(Evaluation { result, next_state })
    }

    fn assemble(
        &self,
        design: &Design,
        scenario: &Scenario,
        elapsed: Seconds,
        offered: Traffic,
        l: &Ledger<'_>,
    ) -> EvaluationResult {
        let cfg = &self.config;
        let graph = l.graph;

        let mut crashed_ids = Vec::new();
        let mut active_ids = Vec::new();
        let mut loads = BTreeMap::new();
        let mut capacities = BTreeMap::new();
        let mut replicas = BTreeMap::new();
        let mut backlog = BTreeMap::new();
        let mut cpu = BTreeMap::new();
        let mut ram = BTreeMap::new();
        let mut malicious = BTreeMap::new();
        let mut events = Vec::new();

        let mut base_latency = 0.0;
        let mut congestion: f64 = 1.0;
        let mut cost = 0.0;
        let mut exposure = ConsistencyExposure::default();
        let mut replicated_database = false;
        let mut bottleneck: Option<(f64, NodeIdx)> = None;

        for (idx, spec) in graph.nodes() {
            let a = &l.assessments[idx];
            let flow = &l.actual.per_node[idx];
            let id = &spec.id;

            cost += spec.operational_cost * a.replicas as f64;

            if let Some(cause) = a.crash {
                crashed_ids.push(id.clone());
                match cause {
                    CrashCause::Overload => {
                        log::info!("t={elapsed:.1}s {} '{id}' crashed under {:.1} rps", spec.kind.label(), l.potential.total(idx));
                        events.push(EvalEvent::NodeCrashed {
                            component_id: id.clone(),
                            potential_load: l.potential.total(idx),
                            crash_limit: a.crash_limit.unwrap_or(0.0),
                        });
                        bottleneck.get_or_insert((f64::INFINITY, idx));
                    }
                    CrashCause::OutOfMemory => {
                        log::info!("t={elapsed:.1}s {} '{id}' ran out of memory", spec.kind.label());
                        events.push(EvalEvent::NodeOutOfMemory {
                            component_id: id.clone(),
                            ram_usage: a.ram_pct,
                        });
                        bottleneck.get_or_insert((f64::INFINITY, idx));
                    }
                    CrashCause::Persistent => {}
                }
            }

            if l.actual.reached(idx) {
                loads.insert(id.clone(), flow.arrived.total());
                if flow.arrived.malicious > 0.0 {
                    malicious.insert(id.clone(), flow.arrived.malicious);
                }
            }

            if l.potential.reached[idx] && a.is_up() {
                cpu.insert(id.clone(), a.cpu_pct);
                ram.insert(id.clone(), a.ram_pct);
            }
            if let (Some(c), true) = (a.effective_capacity, a.is_up()) {
                capacities.insert(id.clone(), c);
            }
            if a.next_replica_starts.is_some() {
                replicas.insert(id.clone(), a.replicas);
                if a.replicas > 1 {
                    events.push(EvalEvent::ReplicasScaled {
                        component_id: id.clone(),
                        replicas: a.replicas,
                        booting: a.booting,
                    });
                }
            }

            if spec.kind == ComponentType::MessageQueue {
                let b = match &l.queue_plans[idx] {
                    Some(plan) => plan.backlog,
                    None => l.state.backlog_of(id),
                };
                if b > 0.0 {
                    backlog.insert(id.clone(), b);
                }
            }

            if !l.actual.reached(idx) {
                continue;
            }
            // Visited: a crashed node still costs its base latency.
            base_latency += spec.base_latency_ms;
            if !a.is_up() {
                continue;
            }

            // Active from here on.
            active_ids.push(id.clone());
            if spec.has_replicas() {
                replicated_database = true;
            }
            // Queue overload shows up as backlog delay instead.
            if a.effective_capacity.is_some() && spec.kind != ComponentType::MessageQueue {
                congestion = congestion.max(scoring::congestion_term(a.cpu_pct, a.utilization, &cfg.scoring));
            }
            if a.admit_ratio < 1.0 {
                events.push(EvalEvent::NodeThrottled {
                    component_id: id.clone(),
                    admitted_ratio: a.admit_ratio,
                });
                if bottleneck.map_or(true, |(u, _)| a.utilization > u) {
                    bottleneck = Some((a.utilization, idx));
                }
            }
            if let Some(plan) = &l.queue_plans[idx] {
                base_latency += plan.delay_ms;
                if plan.backlog > 0.0 {
                    events.push(EvalEvent::BacklogAccumulated {
                        component_id: id.clone(),
                        backlog: plan.backlog,
                        delay_ms: plan.delay_ms,
                    });
                }
            }

            match spec.kind {
                ComponentType::MessageQueue => exposure.message_queues += 1,
                ComponentType::NoSql => exposure.nosql_stores += 1,
                k if k.absorbs_reads() => exposure.caches += 1,
                _ => {}
            }
            if flow.rejected_writes > 0.0 {
                exposure.slave_writes += 1;
            }
        }

        for t in &l.potential.truncations {
            events.push(EvalEvent::PathTruncated {
                component_id: graph.node(t.node).id.clone(),
                path: t.path.iter().map(|&n| graph.node(n).id.clone()).collect(),
            });
        }

        let latency = scoring::total_latency(base_latency, congestion, &cfg.scoring);
        let fulfilled = l.actual.fulfilled();
        let incidents = l.actual.incidents();
        let offered_legit = offered.legitimate();

        let ctx = ScoreContext {
            offered: offered_legit,
            fulfilled,
            crashed: crashed_ids.len(),
            replicated_database,
            incidents,
            exposure,
            cost,
            budget: scenario.budget(),
            latency_ms: latency,
            goal_latency_ms: scenario.goal.max_latency_ms,
            bottleneck: bottleneck.map(|(_, idx)| {
                let spec = graph.node(idx);
                format!("{} ({})", spec.id, spec.kind.label())
            }),
        };
        let (breakdown, scores) = scoring::score_all(&ctx, &cfg.scoring);
        let total_score = scoring::composite(&breakdown, &cfg.scoring.weights);
        let success_rate = scoring::success_rate(fulfilled, offered_legit);

        EvaluationResult {
            design_id: design.id.clone(),
            scenario_id: scenario.id.clone(),
            elapsed_seconds: elapsed,
            total_score,
            passed: total_score >= cfg.scoring.pass_threshold,
            scores,
            breakdown,
            offered_rps: offered_legit,
            read_rps: offered.read,
            write_rps: offered.write,
            malicious_rps: offered.malicious,
            fulfilled_rps: fulfilled,
            success_rate,
            error_rate: 1.0 - success_rate,
            avg_latency_ms: latency,
            congestion_factor: congestion,
            total_cost: cost,
            budget: scenario.budget(),
            security_incidents: incidents,
            active_component_ids: active_ids,
            crashed_component_ids: crashed_ids,
            component_loads: loads,
            effective_capacity: capacities,
            replica_counts: replicas,
            backlog,
            cpu_usage: cpu,
            ram_usage: ram,
            malicious_load: malicious,
            events,
        }
    }
}

/// Everything the passes produced, borrowed together for assembly.
struct Ledger<'a> {
    graph: &'a Graph,
    state: &'a EngineState,
    potential: &'a PotentialLoad,
    assessments: &'a [NodeAssessment],
    queue_plans: &'a [Option<QueuePlan>],
    actual: &'a ActualFlow,
}

impl Ledger<'_> {
    /// The incoming state advanced by this tick: new crashes join the
    /// crash set, queues carry their new backlog, auto-scaled nodes
    /// carry their resized replica boot list.
    fn next_state(&self) -> EngineState {
        let mut next = self.state.clone();
        for (idx, spec) in self.graph.nodes() {
            let a = &self.assessments[idx];
            if a.crashed_now() {
                next.crashed.insert(spec.id.clone());
            }
            if let Some(plan) = &self.queue_plans[idx] {
                if plan.backlog > 0.0 {
                    next.backlog.insert(spec.id.clone(), plan.backlog);
                } else {
                    next.backlog.remove(&spec.id);
                }
            }
            match &a.next_replica_starts {
                Some(starts) if starts.is_empty() => {
                    next.replica_starts.remove(&spec.id);
                }
                Some(starts) => {
                    next.replica_starts.insert(spec.id.clone(), starts.clone());
                }
                None => {}
            }
        }
        next
    }
}

fn validate(design: &Design, scenario: &Scenario, elapsed: Seconds) -> EngineResult<()> {
    if !elapsed.is_finite() || elapsed < 0.0 {
        return Err(EngineError::invalid(format!(
            "elapsed time must be a non-negative number of seconds, got {elapsed}"
        )));
    }
    for phase in &scenario.phases {
        let values = [phase.start_qps, phase.end_qps, phase.duration_seconds];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(EngineError::invalid(format!(
                "scenario {}: phase '{}' has a negative or non-finite value",
                scenario.id, phase.name
            )));
        }
    }
    if !design.scenario_id.is_empty() && design.scenario_id != scenario.id {
        log::warn!(
            "design {} references scenario {} but is evaluated against {}",
            design.id,
            design.scenario_id,
            scenario.id
        );
    }
    Ok(())
}
