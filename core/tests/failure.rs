//! Resource & failure model tests.
//!
//! Tests cover: overload crashes, proportional throttling, persistent
//! crashes, per-kind crash limits, restart grace, auto-scaling with
//! replica warm-up, out-of-memory, replicated read capacity and
//! message-queue backlog and delivery.

use sysdesign_core::{
    component::{Component, ComponentType},
    config::EngineConfig,
    design::Design,
    engine::SimEngine,
    evaluation::Evaluation,
    event::EvalEvent,
    scenario::{Scenario, TrafficPhase},
    state::EngineState,
};

fn quiet_engine() -> SimEngine {
    let mut config = EngineConfig::default();
    config.demand.fluctuation_amplitude = 0.0;
    config.demand.drop_probability = 0.0;
    SimEngine::new(config)
}

fn flat(rate: f64) -> Scenario {
    Scenario::new("flat").phase(TrafficPhase::new("flat", rate, rate, 1_000.0))
}

fn run(design: &Design, rate: f64, t: f64, state: &EngineState) -> Evaluation {
    quiet_engine().evaluate(design, &flat(rate), t, state).unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

/// src -> web(max_qps) -> db with an unbounded database.
fn web_tier(max_qps: f64) -> Design {
    Design::new("d", "flat")
        .component(Component::new("src", ComponentType::TrafficSource))
        .component(Component::new("web", ComponentType::WebServer).with("max_qps", max_qps))
        .component(Component::new("db", ComponentType::Database))
        .connect("src", "web")
        .connect("web", "db")
}

fn has_event(eval: &Evaluation, name: &str, id: &str) -> bool {
    eval.result.events.iter().any(|e| {
        e.type_name() == name
            && match e {
                EvalEvent::NodeCrashed { component_id, .. }
                | EvalEvent::NodeOutOfMemory { component_id, .. }
                | EvalEvent::NodeThrottled { component_id, .. }
                | EvalEvent::ReplicasScaled { component_id, .. }
                | EvalEvent::BacklogAccumulated { component_id, .. }
                | EvalEvent::PathTruncated { component_id, .. } => component_id == id,
            }
    })
}

/// Offered load above 1.5x capacity crashes a web server; the crash
/// carries into the next state and nothing downstream is served.
#[test]
fn overload_crashes_and_persists() {
    let eval = run(&web_tier(600.0), 1_000.0, 0.0, &EngineState::new());

    assert_eq!(eval.result.crashed_component_ids, vec!["web".to_string()]);
    assert!(eval.next_state.is_crashed("web"));
    assert_eq!(eval.result.fulfilled_rps, 0.0);
    assert!(has_event(&eval, "node_crashed", "web"));
    assert!(close(eval.result.breakdown.reliability, 90.0));
}

/// Between capacity and the crash limit the node stays up and admits a
/// proportional share.
#[test]
fn overload_below_limit_throttles() {
    let eval = run(&web_tier(800.0), 1_000.0, 0.0, &EngineState::new());

    assert!(eval.result.crashed_component_ids.is_empty());
    assert!(close(eval.result.fulfilled_rps, 800.0));
    assert!(close(eval.result.success_rate, 0.8));
    assert!(has_event(&eval, "node_throttled", "web"));
    assert_eq!(eval.result.cpu_usage["web"], 100.0);
}

/// A crashed component stays down under any load until restarted.
#[test]
fn crashed_component_stays_down() {
    let mut state = EngineState::new();
    state.crashed.insert("web".into());

    let eval = run(&web_tier(1_000.0), 10.0, 50.0, &state);
    assert_eq!(eval.result.crashed_component_ids, vec!["web".to_string()]);
    assert_eq!(eval.result.fulfilled_rps, 0.0);
    assert!(eval.next_state.is_crashed("web"));
    // Already down: no fresh crash event.
    assert!(!has_event(&eval, "node_crashed", "web"));
}

/// The property marker seeds the same persistent crash.
#[test]
fn crashed_marker_seeds_state() {
    let mut design = web_tier(1_000.0);
    design.components[1] = design.components[1].clone().with("crashed", true);
    let eval = quiet_engine().evaluate_snapshot(&design, &flat(10.0), 0.0).unwrap();
    assert!(eval.result.crashed_component_ids.contains(&"web".to_string()));
}

/// A restarted component is immune to overload for five seconds.
#[test]
fn restart_grace_period() {
    let mut state = EngineState::new();
    state.crashed.insert("web".into());
    state.restart("web", 100.0);
    let design = web_tier(600.0);

    let in_grace = run(&design, 1_000.0, 102.0, &state);
    assert!(in_grace.result.crashed_component_ids.is_empty());
    assert!(close(in_grace.result.fulfilled_rps, 600.0));

    let after = run(&design, 1_000.0, 106.0, &in_grace.next_state);
    assert_eq!(after.result.crashed_component_ids, vec!["web".to_string()]);
}

fn scaling_tier() -> Design {
    let mut design = web_tier(1_000.0);
    design.components[1] = design.components[1]
        .clone()
        .with("auto_scaling", true)
        .with("max_replicas", 3)
        .with_cost(0.2);
    design
}

/// Warm replicas add capacity and are billed.
#[test]
fn autoscaling_with_warm_replicas_absorbs_load() {
    let mut state = EngineState::new();
    state.replica_starts.insert("web".into(), vec![0.0, 0.0]);

    let eval = run(&scaling_tier(), 2_500.0, 100.0, &state);
    assert!(eval.result.crashed_component_ids.is_empty());
    assert_eq!(eval.result.replica_counts["web"], 3);
    assert!(close(eval.result.effective_capacity["web"], 3_000.0));
    assert!(close(eval.result.fulfilled_rps, 2_500.0));
    assert!(close(eval.result.total_cost, 0.6));
    assert!(has_event(&eval, "replicas_scaled", "web"));
    assert_eq!(eval.next_state.replica_starts["web"], vec![0.0, 0.0]);
}

/// Replicas started this tick are still booting and add nothing, so a
/// sudden spike crashes the primary.
#[test]
fn booting_replicas_do_not_help() {
    let eval = run(&scaling_tier(), 2_500.0, 100.0, &EngineState::new());

    assert_eq!(eval.result.crashed_component_ids, vec!["web".to_string()]);
    assert_eq!(eval.next_state.replica_starts["web"], vec![100.0, 100.0]);
}

/// Replicas come online once the warm-up has elapsed.
#[test]
fn replicas_finish_booting_after_warmup() {
    let design = scaling_tier();
    let mut state = EngineState::new();
    state.replica_starts.insert("web".into(), vec![100.0, 100.0]);

    // Light enough that the primary survives alone.
    let booting = run(&design, 1_200.0, 110.0, &state);
    assert!(close(booting.result.effective_capacity["web"], 1_000.0));

    let warm = run(&design, 1_200.0, 131.0, &state);
    assert!(close(warm.result.effective_capacity["web"], 2_000.0));
    assert_eq!(warm.result.replica_counts["web"], 2);
    // Shrinking drops the newest boot time.
    assert_eq!(warm.next_state.replica_starts["web"], vec![100.0]);
}

/// A queue holding more than its buffer of backlog runs out of memory
/// even though its inflow is far below the crash limit.
#[test]
fn overfull_queue_runs_out_of_memory() {
    let design = Design::new("d", "flat")
        .component(Component::new("src", ComponentType::TrafficSource))
        .component(Component::new("mq", ComponentType::MessageQueue).with("max_qps", 10))
        .component(Component::new("db", ComponentType::Database))
        .connect("src", "mq")
        .connect("mq", "db");
    let mut state = EngineState::new();
    // Buffer is 10 rps x 300 s = 3000.
    state.backlog.insert("mq".into(), 4_000.0);

    let eval = run(&design, 100.0, 0.0, &state);
    assert_eq!(eval.result.crashed_component_ids, vec!["mq".to_string()]);
    assert!(has_event(&eval, "node_out_of_memory", "mq"));
    assert!(!has_event(&eval, "node_crashed", "mq"));
    assert!(eval.next_state.is_crashed("mq"));
}

/// Overloaded nodes hold only admitted work in memory, so a cache
/// between capacity and its crash limit throttles instead of dying.
#[test]
fn overloaded_cache_throttles_without_running_out_of_memory() {
    let design = Design::new("d", "flat")
        .component(Component::new("src", ComponentType::TrafficSource))
        .component(Component::new("cache", ComponentType::Cache).with("max_qps", 800))
        .component(Component::new("db", ComponentType::Database))
        .connect("src", "cache")
        .connect("cache", "db");
    let eval = run(&design, 1_000.0, 0.0, &EngineState::new());

    assert!(eval.result.crashed_component_ids.is_empty());
    assert!(has_event(&eval, "node_throttled", "cache"));
    assert!(close(eval.result.ram_usage["cache"], 90.0));
}

/// `src -> n` with `n` rated at 100 rps.
fn lone(kind: ComponentType) -> Design {
    Design::new("d", "flat")
        .component(Component::new("src", ComponentType::TrafficSource))
        .component(Component::new("n", kind).with("max_qps", 100))
        .connect("src", "n")
}

/// Just under `limit` the node stays up and reports `under_event`; just
/// over it the node crashes from overload, never from memory.
fn check_crash_limit(kind: ComponentType, limit: f64, under_event: &str) {
    let label = kind.label();

    let under = run(&lone(kind), limit * 0.98, 0.0, &EngineState::new());
    assert!(under.result.crashed_component_ids.is_empty(), "{label} crashed below its limit");
    assert!(has_event(&under, under_event, "n"), "{label} did not report {under_event}");

    let over = run(&lone(kind), limit * 1.02, 0.0, &EngineState::new());
    assert_eq!(over.result.crashed_component_ids, vec!["n".to_string()], "{label}");
    assert!(has_event(&over, "node_crashed", "n"), "{label} did not crash from overload");
    assert!(!has_event(&over, "node_out_of_memory", "n"), "{label} ran out of memory");
}

#[test]
fn edge_infrastructure_tolerates_five_times_capacity() {
    for kind in [ComponentType::LoadBalancer, ComponentType::Cdn, ComponentType::Waf] {
        check_crash_limit(kind, 500.0, "node_throttled");
    }
}

#[test]
fn durable_components_tolerate_fifty_times_capacity() {
    check_crash_limit(ComponentType::ObjectStorage, 5_000.0, "node_throttled");
    check_crash_limit(ComponentType::MessageQueue, 5_000.0, "backlog_accumulated");
}

#[test]
fn scaling_group_tolerates_three_times_capacity() {
    check_crash_limit(ComponentType::AutoScalingGroup, 300.0, "node_throttled");
}

#[test]
fn databases_use_the_default_limit() {
    check_crash_limit(ComponentType::Database, 150.0, "node_throttled");
}

/// Slaves widen a master's read capacity.
#[test]
fn replication_widens_read_capacity() {
    let base = Design::new("d", "flat")
        .component(Component::new("src", ComponentType::TrafficSource))
        .component(Component::new("db", ComponentType::Database).with("max_qps", 1_000))
        .connect("src", "db");
    let alone = run(&base, 2_000.0, 0.0, &EngineState::new());
    assert_eq!(alone.result.crashed_component_ids, vec!["db".to_string()]);

    let mut replicated = base.clone();
    replicated.components[1] = replicated.components[1]
        .clone()
        .with("replication", "master_slave")
        .with("slave_count", 2);
    let eval = run(&replicated, 2_000.0, 0.0, &EngineState::new());
    assert!(eval.result.crashed_component_ids.is_empty());
    assert!(close(eval.result.effective_capacity["db"], 2_600.0));
    assert!(close(eval.result.fulfilled_rps, 2_000.0));
    assert_eq!(eval.result.breakdown.reliability, 100.0);
}

fn queue_design(delivery: &str) -> Design {
    Design::new("d", "flat")
        .component(Component::new("src", ComponentType::TrafficSource))
        .component(
            Component::new("mq", ComponentType::MessageQueue)
                .with("max_qps", 400)
                .with("delivery_mode", delivery),
        )
        .component(Component::new("worker", ComponentType::WebServer).with("max_qps", 5_000))
        .component(Component::new("db", ComponentType::Database))
        .connect("src", "mq")
        .connect("mq", "worker")
        .connect("worker", "db")
}

/// Work the queue cannot process accumulates as backlog and adds delay.
#[test]
fn queue_accumulates_backlog() {
    let design = queue_design("push");
    let first = run(&design, 1_000.0, 0.0, &EngineState::new());

    assert!(close(first.result.backlog["mq"], 600.0));
    assert!(close(first.result.fulfilled_rps, 400.0));
    assert!(close(first.next_state.backlog_of("mq"), 600.0));
    assert!(has_event(&first, "backlog_accumulated", "mq"));
    assert!(first.result.crashed_component_ids.is_empty());

    let second = run(&design, 1_000.0, 1.0, &first.next_state);
    assert!(close(second.result.backlog["mq"], 1_200.0));
    assert!(second.result.avg_latency_ms > first.result.avg_latency_ms);
}

/// When demand falls, carried backlog drains at the processing rate.
#[test]
fn queue_drains_backlog() {
    let mut state = EngineState::new();
    state.backlog.insert("mq".into(), 600.0);

    let eval = run(&queue_design("push"), 100.0, 0.0, &state);
    assert!(close(eval.result.backlog["mq"], 300.0));
    assert!(close(eval.result.component_loads["db"], 400.0));
    assert_eq!(eval.result.success_rate, 1.0);
}

/// With no new traffic at all, drained backlog still reaches the
/// consumers and is served.
#[test]
fn idle_queue_still_drains_backlog() {
    let mut state = EngineState::new();
    state.backlog.insert("mq".into(), 600.0);

    let eval = run(&queue_design("push"), 0.0, 0.0, &state);
    assert!(close(eval.next_state.backlog_of("mq"), 200.0));
    assert!(close(eval.result.component_loads["worker"], 400.0));
    assert!(close(eval.result.component_loads["db"], 400.0));
    assert!(close(eval.result.fulfilled_rps, 400.0));
}

/// Pull delivery splits evenly but caps each consumer at its capacity,
/// handing the rest to the others; push splits evenly regardless.
#[test]
fn pull_delivery_caps_each_consumer() {
    let design = |delivery: &str| {
        Design::new("d", "flat")
            .component(Component::new("src", ComponentType::TrafficSource))
            .component(
                Component::new("mq", ComponentType::MessageQueue)
                    .with("max_qps", 10_000)
                    .with("delivery_mode", delivery),
            )
            .component(Component::new("w1", ComponentType::WebServer).with("max_qps", 300))
            .component(Component::new("w2", ComponentType::WebServer).with("max_qps", 70))
            .connect("src", "mq")
            .connect("mq", "w1")
            .connect("mq", "w2")
    };

    let pull = run(&design("pull"), 200.0, 0.0, &EngineState::new());
    assert!(close(pull.result.component_loads["w1"], 130.0));
    assert!(close(pull.result.component_loads["w2"], 70.0));

    let push = run(&design("push"), 200.0, 0.0, &EngineState::new());
    assert!(close(push.result.component_loads["w1"], 100.0));
    assert!(close(push.result.component_loads["w2"], 100.0));
}

/// Under light load nobody hits a cap, so pull is an even split too.
#[test]
fn pull_delivery_is_even_below_caps() {
    let design = Design::new("d", "flat")
        .component(Component::new("src", ComponentType::TrafficSource))
        .component(
            Component::new("mq", ComponentType::MessageQueue)
                .with("max_qps", 10_000)
                .with("delivery_mode", "pull"),
        )
        .component(Component::new("w1", ComponentType::WebServer).with("max_qps", 300))
        .component(Component::new("w2", ComponentType::WebServer).with("max_qps", 100))
        .connect("src", "mq")
        .connect("mq", "w1")
        .connect("mq", "w2");

    let eval = run(&design, 60.0, 0.0, &EngineState::new());
    assert!(close(eval.result.component_loads["w1"], 30.0));
    assert!(close(eval.result.component_loads["w2"], 30.0));
}

/// Evaluation never mutates its inputs.
#[test]
fn inputs_are_not_mutated() {
    let design = web_tier(600.0);
    let before = design.clone();
    let state = EngineState::new();
    let eval = run(&design, 1_000.0, 0.0, &state);
    assert_eq!(design, before);
    assert!(state.crashed.is_empty());
    assert!(!eval.next_state.crashed.is_empty());
}
