//! Per-tick engine state.
//!
//! The engine owns no state between calls. Everything that must carry
//! across ticks (crashes, restart timestamps, queue backlog, replica
//! boot times) lives in an `EngineState` value that the caller passes
//! in and receives back, updated, in `Evaluation::next_state`.
//!
//! Ordered collections keep serialised state byte-stable.

use crate::{
    design::Design,
    error::EngineResult,
    graph::Graph,
    types::{ComponentId, Seconds},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineState {
    /// Components that are down until explicitly restarted.
    pub crashed: BTreeSet<ComponentId>,
    /// Last restart time per component, which opens a grace window.
    pub restarts: BTreeMap<ComponentId, Seconds>,
    /// Unprocessed work carried by queue-like components.
    pub backlog: BTreeMap<ComponentId, f64>,
    /// Boot timestamps of replicas beyond the primary instance.
    pub replica_starts: BTreeMap<ComponentId, Vec<Seconds>>,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a state from the markers older saves keep in component
    /// properties (`crashed`, `restarted_at`, `backlog`, `replica_starts`).
    pub fn from_design(design: &Design) -> EngineResult<Self> {
        let graph = Graph::build(design)?;
        Ok(Self::from_graph(&graph))
    }

    pub(crate) fn from_graph(graph: &Graph) -> Self {
        let mut state = Self::default();
        for (_, spec) in graph.nodes() {
            let m = &spec.markers;
            if m.crashed {
                state.crashed.insert(spec.id.clone());
            }
            if let Some(at) = m.restarted_at {
                state.restarts.insert(spec.id.clone(), at);
            }
            if m.backlog > 0.0 {
                state.backlog.insert(spec.id.clone(), m.backlog);
            }
            if !m.replica_starts.is_empty() {
                state.replica_starts.insert(spec.id.clone(), m.replica_starts.clone());
            }
        }
        state
    }

    pub fn is_crashed(&self, id: &str) -> bool {
        self.crashed.contains(id)
    }

    /// Bring a component back up at `at`. It is immune to overload
    /// crashes for the configured grace window after that.
    pub fn restart(&mut self, id: &str, at: Seconds) {
        self.crashed.remove(id);
        self.restarts.insert(id.to_string(), at);
        log::info!("component {id} restarted at t={at:.1}s");
    }

    pub fn in_grace(&self, id: &str, elapsed: Seconds, grace: Seconds) -> bool {
        self.restarts
            .get(id)
            .is_some_and(|&at| elapsed - at < grace)
    }

    pub fn backlog_of(&self, id: &str) -> f64 {
        self.backlog.get(id).copied().unwrap_or(0.0)
    }

    pub fn replica_starts_of(&self, id: &str) -> &[Seconds] {
        self.replica_starts.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Entries naming components the graph does not contain.
    pub(crate) fn unknown_ids<'a>(&'a self, graph: &Graph) -> Vec<&'a str> {
        let mut ids: BTreeSet<&str> = BTreeSet::new();
        ids.extend(self.crashed.iter().map(String::as_str));
        ids.extend(self.restarts.keys().map(String::as_str));
        ids.extend(self.backlog.keys().map(String::as_str));
        ids.extend(self.replica_starts.keys().map(String::as_str));
        ids.into_iter().filter(|id| graph.index_of(id).is_none()).collect()
    }
}

/// Resize a replica boot list to `extra` entries: keep the oldest,
/// append `now` for each replica that starts booting this tick.
pub fn rescale_replica_starts(current: &[Seconds], extra: usize, now: Seconds) -> Vec<Seconds> {
    let mut starts: Vec<Seconds> = current.to_vec();
    starts.sort_by(|a, b| a.total_cmp(b));
    starts.truncate(extra);
    while starts.len() < extra {
        starts.push(now);
    }
    starts
}
