//! Demand model tests, driven through the engine.
//!
//! Tests cover: phase interpolation, burst windows, retention, manual
//! base rates, read/write split, random drops, fluctuation, multiple
//! sources and attack traffic.

use sysdesign_core::{
    component::{Component, ComponentType},
    config::EngineConfig,
    design::Design,
    engine::SimEngine,
    evaluation::EvaluationResult,
    scenario::{Scenario, TrafficPhase},
};

/// Engine with the sinusoidal fluctuation and random drops switched off.
fn quiet_engine() -> SimEngine {
    let mut config = EngineConfig::default();
    config.demand.fluctuation_amplitude = 0.0;
    config.demand.drop_probability = 0.0;
    SimEngine::new(config)
}

fn flat(rate: f64) -> Scenario {
    Scenario::new("flat").phase(TrafficPhase::new("flat", rate, rate, 1_000.0))
}

fn sink_design(source: Component) -> Design {
    Design::new("d", "flat")
        .component(source)
        .component(Component::new("db", ComponentType::Database).with("max_qps", 1_000_000))
        .connect("src", "db")
}

fn eval(engine: &SimEngine, design: &Design, scenario: &Scenario, t: f64) -> EvaluationResult {
    engine.evaluate_snapshot(design, scenario, t).unwrap().result
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

/// Scripted phases interpolate linearly and chain one after another.
#[test]
fn phases_interpolate_and_chain() {
    let scenario = Scenario::new("s1")
        .phase(TrafficPhase::new("Initial Launch", 100.0, 1_000.0, 10.0))
        .phase(TrafficPhase::new("Going Viral", 1_000.0, 5_000.0, 10.0))
        .phase(TrafficPhase::new("Peak Traffic", 5_000.0, 10_000.0, 10.0));
    let design = sink_design(Component::new("src", ComponentType::TrafficSource));
    let engine = quiet_engine();

    let r = eval(&engine, &design, &scenario, 5.0);
    assert!(close(r.offered_rps, 550.0), "offered {}", r.offered_rps);
    assert!(close(r.read_rps, 440.0));
    assert!(close(r.write_rps, 110.0));

    assert!(close(eval(&engine, &design, &scenario, 15.0).offered_rps, 3_000.0));
    // Past the last phase the final end rate holds.
    assert!(close(eval(&engine, &design, &scenario, 500.0).offered_rps, 10_000.0));
}

/// A bursty source multiplies its rate during the active slice of each cycle.
#[test]
fn burst_applies_only_in_active_window() {
    let design = sink_design(Component::new("src", ComponentType::TrafficSource).with("burst", true));
    let engine = quiet_engine();
    let scenario = flat(100.0);

    assert!(close(eval(&engine, &design, &scenario, 1.0).offered_rps, 500.0));
    assert!(close(eval(&engine, &design, &scenario, 5.0).offered_rps, 100.0));
    assert!(close(eval(&engine, &design, &scenario, 11.0).offered_rps, 500.0));
}

/// Retention scales legitimate demand; base rate adds to the phase rate.
#[test]
fn retention_and_base_rate() {
    let engine = quiet_engine();
    let scenario = flat(100.0);

    let design = sink_design(Component::new("src", ComponentType::TrafficSource))
        .with_property("retention_rate", 0.5);
    assert!(close(eval(&engine, &design, &scenario, 0.0).offered_rps, 50.0));

    let design = sink_design(Component::new("src", ComponentType::TrafficSource).with("base_rate", 50));
    assert!(close(eval(&engine, &design, &scenario, 0.0).offered_rps, 150.0));
}

/// A per-source read ratio overrides the default 80/20 split.
#[test]
fn read_ratio_overrides_split() {
    let design = sink_design(Component::new("src", ComponentType::TrafficSource).with("read_ratio", 0.5));
    let r = eval(&quiet_engine(), &design, &flat(1_000.0), 0.0);
    assert!(close(r.read_rps, 500.0));
    assert!(close(r.write_rps, 500.0));
}

/// When a drop fires it covers the opening seconds of its cycle only.
#[test]
fn random_drop_window() {
    let mut config = EngineConfig::default();
    config.demand.fluctuation_amplitude = 0.0;
    config.demand.drop_probability = 1.0;
    let engine = SimEngine::new(config);
    let design = sink_design(Component::new("src", ComponentType::TrafficSource));
    let scenario = flat(100.0);

    assert!(close(eval(&engine, &design, &scenario, 5.0).offered_rps, 30.0));
    assert!(close(eval(&engine, &design, &scenario, 20.0).offered_rps, 100.0));
    assert!(close(eval(&engine, &design, &scenario, 125.0).offered_rps, 30.0));
}

/// The sinusoidal fluctuation peaks a quarter period in.
#[test]
fn fluctuation_peaks_at_quarter_period() {
    let mut config = EngineConfig::default();
    config.demand.drop_probability = 0.0;
    let engine = SimEngine::new(config);
    let design = sink_design(Component::new("src", ComponentType::TrafficSource));

    let r = eval(&engine, &design, &flat(100.0), 15.0);
    assert!(close(r.offered_rps, 110.0), "offered {}", r.offered_rps);
}

/// Every source receives the full phase rate.
#[test]
fn each_source_gets_the_full_rate() {
    let design = Design::new("d", "flat")
        .component(Component::new("a", ComponentType::TrafficSource))
        .component(Component::new("b", ComponentType::TrafficSource))
        .component(Component::new("db", ComponentType::Database))
        .connect("a", "db")
        .connect("b", "db");
    let r = eval(&quiet_engine(), &design, &flat(100.0), 0.0);
    assert!(close(r.offered_rps, 200.0));
    assert!(close(r.fulfilled_rps, 200.0));
}

/// Attack traffic starts after warm-up and is reported apart from
/// legitimate demand.
#[test]
fn attack_traffic_is_separate() {
    let design = sink_design(Component::new("src", ComponentType::TrafficSource).with("attack_enabled", true));
    let engine = quiet_engine();
    let scenario = flat(100.0);

    let early = eval(&engine, &design, &scenario, 10.0);
    assert_eq!(early.malicious_rps, 0.0);

    let r = eval(&engine, &design, &scenario, 30.0);
    assert!(close(r.malicious_rps, 5_000.0));
    assert!(close(r.offered_rps, 100.0));
    assert!(close(r.malicious_load["db"], 5_000.0));
}

/// No phases and no base rate means no traffic and a zero success rate.
#[test]
fn empty_scenario_offers_nothing() {
    let design = sink_design(Component::new("src", ComponentType::TrafficSource));
    let r = eval(&quiet_engine(), &design, &Scenario::new("empty"), 3.0);
    assert_eq!(r.offered_rps, 0.0);
    assert_eq!(r.success_rate, 0.0);
}
