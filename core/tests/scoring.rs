//! Scoring & latency tests through the full engine.

use sysdesign_core::{
    component::{Component, ComponentType},
    config::EngineConfig,
    design::Design,
    engine::SimEngine,
    evaluation::EvaluationResult,
    scenario::{Scenario, TrafficPhase},
};

fn quiet_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.demand.fluctuation_amplitude = 0.0;
    config.demand.drop_probability = 0.0;
    config
}

fn flat(rate: f64) -> Scenario {
    Scenario::new("flat").phase(TrafficPhase::new("flat", rate, rate, 1_000.0))
}

fn eval_with(config: EngineConfig, design: &Design, scenario: &Scenario, t: f64) -> EvaluationResult {
    SimEngine::new(config).evaluate_snapshot(design, scenario, t).unwrap().result
}

fn eval(design: &Design, scenario: &Scenario) -> EvaluationResult {
    eval_with(quiet_config(), design, scenario, 0.0)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn big(id: &str, kind: ComponentType) -> Component {
    Component::new(id, kind).with("max_qps", 1_000_000)
}

fn three_tier() -> Design {
    Design::new("d", "flat")
        .component(Component::new("src", ComponentType::TrafficSource))
        .component(big("lb", ComponentType::LoadBalancer))
        .component(big("web", ComponentType::WebServer))
        .component(big("db", ComponentType::Database))
        .connect("src", "lb")
        .connect("lb", "web")
        .connect("web", "db")
}

/// A healthy design serves everything and passes.
#[test]
fn healthy_design_passes() {
    let r = eval(&three_tier(), &flat(100.0));
    assert!(close(r.success_rate, 1.0));
    assert!(close(r.total_score, 100.0));
    assert!(r.passed);
    let dims: Vec<&str> = r.scores.iter().map(|s| s.dimension.as_str()).collect();
    assert_eq!(dims, ["Capacity", "Reliability", "Security", "Cost", "Consistency", "Latency"]);
}

/// With no traffic source nothing is offered: zero success, no pass.
#[test]
fn design_without_source_fails() {
    let design = Design::new("d", "flat")
        .component(big("web", ComponentType::WebServer))
        .component(big("db", ComponentType::Database))
        .connect("web", "db");
    let r = eval(&design, &flat(100.0));
    assert_eq!(r.success_rate, 0.0);
    assert!(close(r.total_score, 50.0));
    assert!(!r.passed);
}

/// Cost is scored against the scenario budget but does not gate the
/// composite under the default weights.
#[test]
fn budget_overrun_lowers_cost_score_only() {
    let mut design = three_tier();
    design.components[2] = design.components[2].clone().with_cost(1.5);
    let scenario = flat(100.0).with_budget(1.0);

    let r = eval(&design, &scenario);
    assert!(close(r.total_cost, 1.5));
    assert!(close(r.breakdown.cost, 97.5));
    assert!(close(r.total_score, 100.0));
    let cost = r.scores.iter().find(|s| s.dimension == "Cost").unwrap();
    assert!(close(cost.value, 97.5));
}

fn attack_config() -> EngineConfig {
    let mut config = quiet_config();
    config.demand.attack_base_rate = 100.0;
    config.demand.attack_amplitude = 0.0;
    config
}

fn attacked(edge: &[Component]) -> Design {
    let mut design = Design::new("d", "flat")
        .component(Component::new("src", ComponentType::TrafficSource).with("attack_enabled", true));
    let mut prev = "src".to_string();
    for c in edge {
        design = design.component(c.clone()).connect(&prev, &c.id);
        prev = c.id.clone();
    }
    design
        .component(big("web", ComponentType::WebServer))
        .component(big("db", ComponentType::Database))
        .connect(&prev, "web")
        .connect("web", "db")
}

/// Malicious requests reaching a database count in full; a WAF keeps a
/// tenth; a gateway on the path halves what is left.
#[test]
fn security_incidents_by_edge_protection() {
    let scenario = flat(100.0);

    let open = eval_with(attack_config(), &attacked(&[]), &scenario, 30.0);
    assert!(close(open.security_incidents, 100.0));
    assert!(close(open.breakdown.security, 50.0));

    let waf = eval_with(attack_config(), &attacked(&[big("waf", ComponentType::Waf)]), &scenario, 30.0);
    assert!(close(waf.security_incidents, 10.0));
    assert!(close(waf.breakdown.security, 95.0));

    let gated = eval_with(
        attack_config(),
        &attacked(&[big("waf", ComponentType::Waf), big("gw", ComponentType::ApiGateway)]),
        &scenario,
        30.0,
    );
    assert!(close(gated.security_incidents, 5.0));
    assert!(close(gated.breakdown.security, 97.5));
}

/// Attack traffic never counts as offered or fulfilled demand.
#[test]
fn malicious_traffic_is_not_success() {
    let r = eval_with(attack_config(), &attacked(&[]), &flat(100.0), 30.0);
    assert!(close(r.offered_rps, 100.0));
    assert!(close(r.fulfilled_rps, 100.0));
    assert!(close(r.success_rate, 1.0));
}

/// Each asynchronous or eventually-consistent element costs points.
#[test]
fn consistency_penalties() {
    let design = Design::new("d", "flat")
        .component(Component::new("src", ComponentType::TrafficSource))
        .component(big("mq", ComponentType::MessageQueue))
        .component(big("web", ComponentType::WebServer))
        .component(big("cache", ComponentType::Cache))
        .component(big("kv", ComponentType::NoSql))
        .connect("src", "mq")
        .connect("mq", "web")
        .connect("web", "cache")
        .connect("cache", "kv");
    let r = eval(&design, &flat(100.0));
    assert!(close(r.breakdown.consistency, 80.0));
}

/// Writes sent to a replication slave are rejected.
#[test]
fn writes_to_slave_are_rejected() {
    let design = Design::new("d", "flat")
        .component(Component::new("src", ComponentType::TrafficSource))
        .component(big("replica", ComponentType::Database).with("role", "slave"))
        .connect("src", "replica");
    let r = eval(&design, &flat(100.0));
    assert!(close(r.success_rate, 0.8));
    assert!(close(r.breakdown.consistency, 80.0));
}

/// Latency sums base latencies along active nodes and is scored against
/// the goal.
#[test]
fn latency_against_goal() {
    let design = Design::new("d", "flat")
        .component(Component::new("src", ComponentType::TrafficSource))
        .component(
            Component::new("web", ComponentType::WebServer)
                .with("max_qps", 1_000)
                .with("base_latency", 50),
        )
        .component(big("db", ComponentType::Database).with("base_latency", 10))
        .connect("src", "web")
        .connect("web", "db");
    let mut scenario = flat(100.0);
    scenario.goal.max_latency_ms = 30.0;

    let r = eval(&design, &scenario);
    assert!(close(r.avg_latency_ms, 60.0));
    assert!(close(r.congestion_factor, 1.0));
    assert!(close(r.breakdown.latency, 50.0));
}

/// A crashed node was still visited and adds its base latency; the
/// node behind it was never reached and adds nothing.
#[test]
fn crashed_node_still_adds_latency() {
    let design = Design::new("d", "flat")
        .component(Component::new("src", ComponentType::TrafficSource))
        .component(
            big("web", ComponentType::WebServer)
                .with("base_latency", 50)
                .with("crashed", true),
        )
        .component(big("db", ComponentType::Database).with("base_latency", 10))
        .connect("src", "web")
        .connect("web", "db");

    let r = eval(&design, &flat(100.0));
    assert_eq!(r.crashed_component_ids, vec!["web".to_string()]);
    assert!(close(r.avg_latency_ms, 50.0));
    assert!(r.active_component_ids.iter().all(|id| id != "web"));
}

/// A node past its CPU knee multiplies latency.
#[test]
fn saturation_inflates_latency() {
    let design = Design::new("d", "flat")
        .component(Component::new("src", ComponentType::TrafficSource))
        .component(
            Component::new("web", ComponentType::WebServer)
                .with("max_qps", 100)
                .with("base_latency", 50),
        )
        .component(big("db", ComponentType::Database).with("base_latency", 10))
        .connect("src", "web")
        .connect("web", "db");
    let r = eval(&design, &flat(100.0));
    // cpu = 5 + 90 * 1.4, clamped to 100: the cubic term doubles latency.
    assert!(close(r.cpu_usage["web"], 100.0));
    assert!(close(r.avg_latency_ms, 120.0));
}

/// Weights and the pass bar come from configuration.
#[test]
fn pass_threshold_is_configurable() {
    let mut config = quiet_config();
    config.scoring.pass_threshold = 100.5;
    let r = eval_with(config, &three_tier(), &flat(100.0), 0.0);
    assert!(!r.passed);

    let mut config = quiet_config();
    config.scoring.weights.success = 0.0;
    config.scoring.weights.reliability = 0.0;
    config.scoring.weights.security = 0.0;
    config.scoring.weights.cost = 1.0;
    let mut design = three_tier();
    design.components[2] = design.components[2].clone().with_cost(3.0);
    let r = eval_with(config, &design, &flat(100.0).with_budget(1.0), 0.0);
    assert!(close(r.total_score, 90.0));
}
