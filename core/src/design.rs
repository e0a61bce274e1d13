//! A player's design: the component graph plus global properties.

use crate::{
    component::{Component, Properties},
    types::{ComponentId, DesignId, PlayerId, ScenarioId},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A directed edge between two components.
/// Protocol and traffic type are informational; every edge carries the
/// full read/write/malicious split.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Connection {
    pub from_id: ComponentId,
    pub to_id: ComponentId,
    #[serde(default)]
    pub protocol: String,
    #[serde(default = "default_traffic_type")]
    pub traffic_type: String,
}

fn default_traffic_type() -> String {
    "all".into()
}

impl Connection {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from_id: from.into(),
            to_id: to.into(),
            protocol: "HTTP".into(),
            traffic_type: default_traffic_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Design {
    #[serde(default)]
    pub id: DesignId,
    #[serde(default)]
    pub player_id: PlayerId,
    pub scenario_id: ScenarioId,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// Global properties, e.g. `retention_rate`.
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Design {
    pub fn new(id: impl Into<String>, scenario_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            player_id: String::new(),
            scenario_id: scenario_id.into(),
            components: Vec::new(),
            connections: Vec::new(),
            properties: Properties::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    pub fn connect(mut self, from: &str, to: &str) -> Self {
        self.connections.push(Connection::new(from, to));
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Share of users that stay, clamped to [0, 1]. Defaults to 1.
    pub fn retention_rate(&self) -> f64 {
        self.properties
            .get("retention_rate")
            .and_then(Value::as_f64)
            .filter(|r| r.is_finite())
            .map(|r| r.clamp(0.0, 1.0))
            .unwrap_or(1.0)
    }
}
