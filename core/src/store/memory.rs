//! In-memory repositories. Readers share the lock; writers are exclusive.

use super::{stamp_for_save, DesignRepository, ScenarioRepository};
use crate::{
    design::Design,
    error::{EngineError, EngineResult},
    scenario::{Goal, Scenario, TrafficPhase},
    types::DesignId,
};
use anyhow::Context;
use std::collections::BTreeMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryDesignStore {
    designs: RwLock<BTreeMap<DesignId, Design>>,
}

impl MemoryDesignStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DesignRepository for MemoryDesignStore {
    fn save(&self, design: Design) -> EngineResult<DesignId> {
        let mut designs = self.designs.write().map_err(|_| EngineError::StorePoisoned)?;
        let previous = designs.get(&design.id).map(|d| d.created_at);
        let design = stamp_for_save(design, previous);
        let id = design.id.clone();
        designs.insert(id.clone(), design);
        log::debug!("design {id} saved ({} in store)", designs.len());
        Ok(id)
    }

    fn get(&self, id: &str) -> EngineResult<Design> {
        let designs = self.designs.read().map_err(|_| EngineError::StorePoisoned)?;
        designs
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("design", id))
    }

    fn list_by_player(&self, player_id: &str) -> EngineResult<Vec<Design>> {
        let designs = self.designs.read().map_err(|_| EngineError::StorePoisoned)?;
        Ok(designs
            .values()
            .filter(|d| d.player_id == player_id)
            .cloned()
            .collect())
    }
}

pub struct MemoryScenarioStore {
    scenarios: RwLock<BTreeMap<String, Scenario>>,
}

impl MemoryScenarioStore {
    pub fn empty() -> Self {
        Self { scenarios: RwLock::new(BTreeMap::new()) }
    }

    /// Store seeded with the built-in scenarios.
    pub fn with_builtin() -> Self {
        let scenarios = builtin_scenarios()
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();
        Self { scenarios: RwLock::new(scenarios) }
    }

    /// Load a scenario catalog from a JSON file: `{ "scenarios": [...] }`.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        #[derive(serde::Deserialize)]
        struct ScenarioFile {
            scenarios: Vec<Scenario>,
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario catalog {path}"))?;
        let file: ScenarioFile = serde_json::from_str(&content)
            .with_context(|| format!("parsing scenario catalog {path}"))?;
        let store = Self::empty();
        for s in file.scenarios {
            store.insert(s)?;
        }
        Ok(store)
    }

    pub fn insert(&self, scenario: Scenario) -> EngineResult<()> {
        let mut scenarios = self.scenarios.write().map_err(|_| EngineError::StorePoisoned)?;
        scenarios.insert(scenario.id.clone(), scenario);
        Ok(())
    }
}

impl ScenarioRepository for MemoryScenarioStore {
    fn get(&self, id: &str) -> EngineResult<Scenario> {
        let scenarios = self.scenarios.read().map_err(|_| EngineError::StorePoisoned)?;
        scenarios
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("scenario", id))
    }

    fn list_all(&self) -> EngineResult<Vec<Scenario>> {
        let scenarios = self.scenarios.read().map_err(|_| EngineError::StorePoisoned)?;
        Ok(scenarios.values().cloned().collect())
    }
}

pub fn builtin_scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            id: "s1".into(),
            title: "URL shortener".into(),
            description: "Serve a URL shortener through exponential growth from 100 to 10,000 requests per second.".into(),
            goal: Goal { min_qps: 10_000.0, max_latency_ms: 200.0, availability: 99.9, duration: 60.0 },
            phases: vec![
                TrafficPhase::new("Initial Launch", 100.0, 1_000.0, 10.0),
                TrafficPhase::new("Going Viral", 1_000.0, 5_000.0, 10.0),
                TrafficPhase::new("Peak Traffic", 5_000.0, 10_000.0, 10.0),
            ],
            constraints: vec![],
        }
        .with_budget(10.0),
        Scenario {
            id: "s2".into(),
            title: "Flash sale".into(),
            description: "A quiet shop hit by a sudden sale spike, then a long tail.".into(),
            goal: Goal { min_qps: 20_000.0, max_latency_ms: 300.0, availability: 99.5, duration: 120.0 },
            phases: vec![
                TrafficPhase::new("Warm Up", 500.0, 500.0, 30.0),
                TrafficPhase::new("Sale Opens", 500.0, 20_000.0, 15.0),
                TrafficPhase::new("Sale Peak", 20_000.0, 20_000.0, 45.0),
                TrafficPhase::new("Tail", 20_000.0, 3_000.0, 30.0),
            ],
            constraints: vec![],
        }
        .with_budget(25.0),
        Scenario {
            id: "s3".into(),
            title: "Under siege".into(),
            description: "Steady legitimate load while attackers probe the edge. Pair with attack-enabled sources.".into(),
            goal: Goal { min_qps: 2_000.0, max_latency_ms: 250.0, availability: 99.9, duration: 180.0 },
            phases: vec![TrafficPhase::new("Steady", 2_000.0, 2_000.0, 180.0)],
            constraints: vec![],
        }
        .with_budget(15.0),
    ]
}
