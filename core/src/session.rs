//! Tick session: drives one design through a scenario over time.
//!
//! RULES:
//!   - The engine is stateless; the session owns the `EngineState` and
//!     threads each tick's `next_state` into the next call.
//!   - World metrics and running cost are applied after every tick.

use crate::{
    design::Design,
    engine::SimEngine,
    error::{EngineError, EngineResult},
    evaluation::EvaluationResult,
    scenario::Scenario,
    state::EngineState,
    types::Seconds,
    world::GameState,
};

pub struct Session {
    engine: SimEngine,
    design: Design,
    scenario: Scenario,
    state: EngineState,
    game: GameState,
    elapsed: Seconds,
}

impl Session {
    /// Start at t=0 with state seeded from the design's markers.
    pub fn new(engine: SimEngine, design: Design, scenario: Scenario, game: GameState) -> EngineResult<Self> {
        let state = EngineState::from_design(&design)?;
        Ok(Self { engine, design, scenario, state, game, elapsed: 0.0 })
    }

    pub fn elapsed(&self) -> Seconds {
        self.elapsed
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn design(&self) -> &Design {
        &self.design
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Evaluate at the current offset, then move the clock by `step`.
    pub fn advance(&mut self, step: Seconds) -> EngineResult<EvaluationResult> {
        if !step.is_finite() || step <= 0.0 {
            return Err(EngineError::invalid(format!("tick step must be positive, got {step}")));
        }
        let eval = self.engine.evaluate(&self.design, &self.scenario, self.elapsed, &self.state)?;
        let r = eval.result;

        self.game.update_metrics(r.avg_latency_ms, r.error_rate, r.offered_rps);
        self.game.deduct_cost(r.total_cost, step);
        self.game.last_tick = self.elapsed;
        self.state = eval.next_state;

        log::info!(
            "t={:.1}s score={:.1} success={:.3} latency={:.1}ms cost={:.2}/s balance={:.2} crashed={}",
            self.elapsed,
            r.total_score,
            r.success_rate,
            r.avg_latency_ms,
            r.total_cost,
            self.game.balance,
            self.state.crashed.len()
        );

        self.elapsed += step;
        Ok(r)
    }

    pub fn run(&mut self, steps: u32, step: Seconds) -> EngineResult<Vec<EvaluationResult>> {
        (0..steps).map(|_| self.advance(step)).collect()
    }

    /// Bring a crashed component back at the current offset.
    pub fn restart(&mut self, component_id: &str) -> EngineResult<()> {
        if !self.design.components.iter().any(|c| c.id == component_id) {
            return Err(EngineError::not_found("component", component_id));
        }
        self.state.restart(component_id, self.elapsed);
        Ok(())
    }
}
