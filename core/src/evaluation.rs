//! Evaluation results: the engine's output for one instant.

use crate::{
    event::EvalEvent,
    state::EngineState,
    types::{ComponentId, DesignId, Rps, ScenarioId, Seconds},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One scored dimension with a human-readable remark.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Score {
    pub dimension: String,
    /// 0-100.
    pub value: f64,
    pub comment: String,
}

/// Every dimension's value, for callers that want fields, not a list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub capacity: f64,
    pub reliability: f64,
    pub security: f64,
    pub cost: f64,
    pub consistency: f64,
    pub latency: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub design_id: DesignId,
    pub scenario_id: ScenarioId,
    pub elapsed_seconds: Seconds,

    pub total_score: f64,
    pub passed: bool,
    pub scores: Vec<Score>,
    pub breakdown: ScoreBreakdown,

    pub offered_rps: Rps,
    pub read_rps: Rps,
    pub write_rps: Rps,
    pub malicious_rps: Rps,
    pub fulfilled_rps: Rps,
    pub success_rate: f64,
    pub error_rate: f64,

    pub avg_latency_ms: f64,
    pub congestion_factor: f64,
    /// Operational cost per second, including extra replicas.
    pub total_cost: f64,
    pub budget: Option<f64>,
    pub security_incidents: f64,

    pub active_component_ids: Vec<ComponentId>,
    pub crashed_component_ids: Vec<ComponentId>,
    pub component_loads: BTreeMap<ComponentId, Rps>,
    pub effective_capacity: BTreeMap<ComponentId, Rps>,
    pub replica_counts: BTreeMap<ComponentId, u32>,
    pub backlog: BTreeMap<ComponentId, f64>,
    pub cpu_usage: BTreeMap<ComponentId, f64>,
    pub ram_usage: BTreeMap<ComponentId, f64>,
    pub malicious_load: BTreeMap<ComponentId, Rps>,

    pub events: Vec<EvalEvent>,
}

/// A result plus the state the caller should pass to the next tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evaluation {
    pub result: EvaluationResult,
    pub next_state: EngineState,
}
