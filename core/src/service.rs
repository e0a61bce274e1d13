//! Evaluation service: resolves designs and scenarios through the
//! repositories and hands plain values to the engine.

use crate::{
    design::Design,
    engine::SimEngine,
    error::EngineResult,
    evaluation::Evaluation,
    graph::Graph,
    scenario::Scenario,
    state::EngineState,
    store::{DesignRepository, ScenarioRepository},
    types::{DesignId, Seconds},
};
use std::sync::Arc;

pub struct EvaluationService {
    engine: SimEngine,
    designs: Arc<dyn DesignRepository>,
    scenarios: Arc<dyn ScenarioRepository>,
}

impl EvaluationService {
    pub fn new(
        engine: SimEngine,
        designs: Arc<dyn DesignRepository>,
        scenarios: Arc<dyn ScenarioRepository>,
    ) -> Self {
        Self { engine, designs, scenarios }
    }

    pub fn engine(&self) -> &SimEngine {
        &self.engine
    }

    pub fn evaluate(&self, design_id: &str, elapsed: Seconds, state: &EngineState) -> EngineResult<Evaluation> {
        let design = self.designs.get(design_id)?;
        let scenario = self.scenarios.get(&design.scenario_id)?;
        self.engine.evaluate(&design, &scenario, elapsed, state)
    }

    /// Evaluate with state seeded from the stored design's markers.
    pub fn evaluate_snapshot(&self, design_id: &str, elapsed: Seconds) -> EngineResult<Evaluation> {
        let design = self.designs.get(design_id)?;
        let scenario = self.scenarios.get(&design.scenario_id)?;
        self.engine.evaluate_snapshot(&design, &scenario, elapsed)
    }

    /// Validate and store a design. The scenario it names must exist and
    /// its graph must build.
    pub fn save_design(&self, design: Design) -> EngineResult<DesignId> {
        self.scenarios.get(&design.scenario_id)?;
        let graph = Graph::build(&design)?;
        if graph.roots().is_empty() {
            log::warn!("design {} has no traffic source; it will serve nothing", design.id);
        }
        self.designs.save(design)
    }

    pub fn get_design(&self, id: &str) -> EngineResult<Design> {
        self.designs.get(id)
    }

    pub fn list_designs(&self, player_id: &str) -> EngineResult<Vec<Design>> {
        self.designs.list_by_player(player_id)
    }

    pub fn get_scenario(&self, id: &str) -> EngineResult<Scenario> {
        self.scenarios.get(id)
    }

    pub fn list_scenarios(&self) -> EngineResult<Vec<Scenario>> {
        self.scenarios.list_all()
    }
}
