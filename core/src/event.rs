//! Evaluation events: what happened to which component this tick.
//!
//! Events are reported inside the result in node order, so two
//! identical evaluations list identical events.

use crate::types::{ComponentId, Rps};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvalEvent {
    /// Offered load exceeded capacity times the kind's crash multiplier.
    NodeCrashed {
        component_id: ComponentId,
        potential_load: Rps,
        crash_limit: Rps,
    },
    /// Synthetic memory usage went past 100%.
    NodeOutOfMemory {
        component_id: ComponentId,
        ram_usage: f64,
    },
    /// Still up, but only part of the offered load is admitted.
    NodeThrottled {
        component_id: ComponentId,
        admitted_ratio: f64,
    },
    ReplicasScaled {
        component_id: ComponentId,
        replicas: u32,
        booting: u32,
    },
    BacklogAccumulated {
        component_id: ComponentId,
        backlog: f64,
        delay_ms: f64,
    },
    /// A traffic path tried to re-enter a node already on it.
    PathTruncated {
        component_id: ComponentId,
        path: Vec<ComponentId>,
    },
}

impl EvalEvent {
    /// Stable snake_case name, matching the serialised `type` tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            EvalEvent::NodeCrashed { .. }        => "node_crashed",
            EvalEvent::NodeOutOfMemory { .. }    => "node_out_of_memory",
            EvalEvent::NodeThrottled { .. }      => "node_throttled",
            EvalEvent::ReplicasScaled { .. }     => "replicas_scaled",
            EvalEvent::BacklogAccumulated { .. } => "backlog_accumulated",
            EvalEvent::PathTruncated { .. }      => "path_truncated",
        }
    }
}
