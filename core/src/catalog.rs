//! Purchasable component blueprints.
//!
//! A blueprint is an ordinary `Component` whose id names the catalog
//! entry. Placing one in a design clones it under a fresh component id.

use crate::{
    component::{Component, ComponentType},
    error::{EngineError, EngineResult},
};

fn entry(
    id: &str,
    name: &str,
    kind: ComponentType,
    setup_cost: f64,
    operational_cost: f64,
) -> Component {
    let mut c = Component::new(id, kind).with_cost(operational_cost);
    c.name = name.to_string();
    c.setup_cost = setup_cost;
    c
}

pub fn blueprints() -> Vec<Component> {
    use ComponentType::*;
    vec![
        entry("source-users", "User Traffic", TrafficSource, 0.0, 0.0),
        entry("server-nano", "Nano Server", WebServer, 50.0, 0.05)
            .with("max_qps", 200)
            .with("base_latency", 100),
        entry("server-standard", "Standard Server", WebServer, 200.0, 0.20)
            .with("max_qps", 1_000)
            .with("base_latency", 50),
        entry("server-high-perf", "High-Perf Server", WebServer, 800.0, 0.70)
            .with("max_qps", 5_000)
            .with("base_latency", 20),
        entry("lb-simple", "Round-Robin LB", LoadBalancer, 150.0, 0.10)
            .with("max_qps", 20_000),
        entry("asg-standard", "Auto-Scaling Group", AutoScalingGroup, 400.0, 0.20)
            .with("max_qps", 1_000)
            .with("base_latency", 50)
            .with("auto_scaling", true)
            .with("max_replicas", 5),
        entry("db-relational", "Relational Database", Database, 500.0, 0.50)
            .with("max_qps", 2_000)
            .with("base_latency", 10),
        entry("db-nosql", "NoSQL Store", NoSql, 600.0, 0.60)
            .with("max_qps", 8_000)
            .with("base_latency", 8),
        entry("cache-memory", "In-Memory Cache", Cache, 300.0, 0.15)
            .with("max_qps", 50_000)
            .with("base_latency", 1),
        entry("cdn-edge", "Edge CDN", Cdn, 250.0, 0.20)
            .with("max_qps", 100_000)
            .with("base_latency", 5),
        entry("mq-standard", "Message Queue", MessageQueue, 400.0, 0.30)
            .with("max_qps", 10_000)
            .with("base_latency", 5)
            .with("delivery_mode", "push"),
        entry("waf-basic", "Web Application Firewall", Waf, 200.0, 0.10)
            .with("max_qps", 30_000)
            .with("base_latency", 2),
        entry("gateway-api", "API Gateway", ApiGateway, 250.0, 0.15)
            .with("max_qps", 15_000)
            .with("base_latency", 3),
        entry("storage-object", "Object Storage", ObjectStorage, 100.0, 0.05)
            .with("max_qps", 20_000)
            .with("base_latency", 30),
        entry("search-cluster", "Search Cluster", SearchEngine, 700.0, 0.50)
            .with("max_qps", 3_000)
            .with("base_latency", 25),
    ]
}

pub fn blueprint(id: &str) -> EngineResult<Component> {
    blueprints()
        .into_iter()
        .find(|b| b.id == id)
        .ok_or_else(|| EngineError::not_found("blueprint", id))
}

/// A copy of blueprint `blueprint_id` placed under `component_id`.
pub fn instantiate(blueprint_id: &str, component_id: &str) -> EngineResult<Component> {
    if component_id.trim().is_empty() {
        return Err(EngineError::invalid("component id must not be empty"));
    }
    let mut c = blueprint(blueprint_id)?;
    c.id = component_id.to_string();
    Ok(c)
}
