//! Scenarios: the traffic a design is scored against.

use crate::types::{Rps, ScenarioId, Seconds};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub id: ScenarioId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub goal: Goal,
    /// Ordered; exponential growth is approximated by chaining phases.
    #[serde(default)]
    pub phases: Vec<TrafficPhase>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    #[serde(default)]
    pub min_qps: Rps,
    #[serde(default)]
    pub max_latency_ms: f64,
    #[serde(default)]
    pub availability: f64,
    /// How long the test must be sustained, in seconds.
    #[serde(default)]
    pub duration: Seconds,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrafficPhase {
    pub name: String,
    pub start_qps: Rps,
    pub end_qps: Rps,
    pub duration_seconds: Seconds,
}

impl TrafficPhase {
    pub fn new(name: &str, start_qps: Rps, end_qps: Rps, duration_seconds: Seconds) -> Self {
        Self { name: name.into(), start_qps, end_qps, duration_seconds }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Constraint {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
}

pub const BUDGET_CONSTRAINT: &str = "budget";

impl Scenario {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            description: String::new(),
            goal: Goal::default(),
            phases: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn phase(mut self, phase: TrafficPhase) -> Self {
        self.phases.push(phase);
        self
    }

    pub fn with_budget(mut self, budget: f64) -> Self {
        self.constraints.push(Constraint { kind: BUDGET_CONSTRAINT.into(), value: budget });
        self
    }

    /// Operational budget ceiling per second, if the scenario sets one.
    pub fn budget(&self) -> Option<f64> {
        self.constraints
            .iter()
            .find(|c| c.kind.eq_ignore_ascii_case(BUDGET_CONSTRAINT))
            .map(|c| c.value)
    }

    pub fn total_duration(&self) -> Seconds {
        self.phases.iter().map(|p| p.duration_seconds).sum()
    }
}
