//! Components: the purchasable building blocks of a design.
//!
//! A `Component` is the wire form: identity, costs and an open-ended
//! property bag as the player's editor saved it. Before simulation
//! every component is resolved ONCE into a `ComponentSpec`, a typed
//! view with one `KindProfile` variant per family of component kinds.
//! The engine never probes the property bag after that point.

use crate::{
    error::{EngineError, EngineResult},
    types::{ComponentId, Seconds},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open-ended component properties as saved by the editor.
pub type Properties = Map<String, Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentType {
    TrafficSource,
    LoadBalancer,
    WebServer,
    Database,
    Cache,
    MessageQueue,
    Cdn,
    Waf,
    ObjectStorage,
    SearchEngine,
    AutoScalingGroup,
    ApiGateway,
    #[serde(rename = "NOSQL", alias = "NO_SQL")]
    NoSql,
}

impl ComponentType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::TrafficSource    => "traffic source",
            Self::LoadBalancer     => "load balancer",
            Self::WebServer        => "web server",
            Self::Database         => "database",
            Self::Cache            => "cache",
            Self::MessageQueue     => "message queue",
            Self::Cdn              => "CDN",
            Self::Waf              => "WAF",
            Self::ObjectStorage    => "object storage",
            Self::SearchEngine     => "search engine",
            Self::AutoScalingGroup => "auto-scaling group",
            Self::ApiGateway       => "API gateway",
            Self::NoSql            => "NoSQL store",
        }
    }

    /// Latency added per request when the property bag has none.
    pub fn default_base_latency_ms(&self) -> f64 {
        match self {
            Self::TrafficSource    => 0.0,
            Self::LoadBalancer     => 1.0,
            Self::WebServer        => 20.0,
            Self::Database         => 10.0,
            Self::Cache            => 1.0,
            Self::MessageQueue     => 5.0,
            Self::Cdn              => 5.0,
            Self::Waf              => 2.0,
            Self::ObjectStorage    => 30.0,
            Self::SearchEngine     => 25.0,
            Self::AutoScalingGroup => 20.0,
            Self::ApiGateway       => 3.0,
            Self::NoSql            => 8.0,
        }
    }

    /// Caches and CDNs answer most reads locally.
    pub fn absorbs_reads(&self) -> bool {
        matches!(self, Self::Cache | Self::Cdn)
    }

    /// Kinds that terminate a request by serving it from stored data.
    pub fn is_store(&self) -> bool {
        matches!(
            self,
            Self::Database | Self::NoSql | Self::ObjectStorage | Self::SearchEngine
        )
    }

    /// Kinds where malicious traffic counts as a security incident.
    pub fn is_data_store(&self) -> bool {
        matches!(self, Self::Database | Self::NoSql)
    }

    pub fn is_scalable(&self) -> bool {
        matches!(self, Self::WebServer | Self::AutoScalingGroup)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Component {
    pub id: ComponentId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ComponentType,
    #[serde(default)]
    pub setup_cost: f64,
    /// Cost per simulated second while deployed.
    #[serde(default)]
    pub operational_cost: f64,
    #[serde(default)]
    pub properties: Properties,
}

impl Component {
    pub fn new(id: impl Into<String>, kind: ComponentType) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind,
            setup_cost: 0.0,
            operational_cost: 0.0,
            properties: Properties::new(),
        }
    }

    pub fn with_cost(mut self, operational_cost: f64) -> Self {
        self.operational_cost = operational_cost;
        self
    }

    /// Builder-style property setter, used by the catalog and tests.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

// ── Typed view ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Replication {
    #[default]
    None,
    MasterSlave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreRole {
    #[default]
    Master,
    Slave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    #[default]
    Push,
    Pull,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceProfile {
    /// Manually configured rate added on top of the scripted phases.
    pub base_rate: f64,
    pub burst: bool,
    /// Share of legitimate traffic that is reads.
    pub read_ratio: Option<f64>,
    pub attack_enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoScaleProfile {
    pub enabled: bool,
    pub max_replicas: u32,
    /// Per-replica utilization above which another replica is wanted.
    pub scale_up_threshold: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreProfile {
    pub replication: Replication,
    pub slave_count: u32,
    pub role: StoreRole,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueProfile {
    pub delivery: DeliveryMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum KindProfile {
    Source(SourceProfile),
    Scalable(AutoScaleProfile),
    Store(StoreProfile),
    Queue(QueueProfile),
    Plain,
}

/// State markers older callers smuggled through the property bag.
/// They only seed an `EngineState`; the engine itself never reads them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyMarkers {
    pub crashed: bool,
    pub restarted_at: Option<Seconds>,
    pub backlog: f64,
    pub replica_starts: Vec<Seconds>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSpec {
    pub id: ComponentId,
    pub name: String,
    pub kind: ComponentType,
    pub operational_cost: f64,
    /// `None` means the component never throttles or overloads.
    pub max_qps: Option<f64>,
    pub base_latency_ms: f64,
    pub profile: KindProfile,
    pub markers: LegacyMarkers,
}

impl ComponentSpec {
    pub fn resolve(component: &Component) -> EngineResult<Self> {
        if component.id.trim().is_empty() {
            return Err(EngineError::invalid("component with empty id"));
        }
        let props = PropertyReader { id: &component.id, props: &component.properties };

        if !component.operational_cost.is_finite() || component.operational_cost < 0.0 {
            return Err(EngineError::invalid(format!(
                "component '{}': operational_cost must be a non-negative number",
                component.id
            )));
        }

        let profile = match component.kind {
            ComponentType::TrafficSource => {
                let read_ratio = props.number("read_ratio")?;
                if let Some(r) = read_ratio {
                    if r > 1.0 {
                        return Err(EngineError::invalid(format!(
                            "component '{}': read_ratio {r} is outside [0, 1]",
                            component.id
                        )));
                    }
                }
                KindProfile::Source(SourceProfile {
                    base_rate: props.number("base_rate")?.unwrap_or(0.0),
                    burst: props.flag("burst")?,
                    read_ratio,
                    attack_enabled: props.flag("attack_enabled")?,
                })
            }
            ComponentType::WebServer | ComponentType::AutoScalingGroup => {
                KindProfile::Scalable(AutoScaleProfile {
                    enabled: props.flag("auto_scaling")?,
                    max_replicas: props.count("max_replicas")?.unwrap_or(1).max(1),
                    scale_up_threshold: props.number("scale_up_threshold")?,
                })
            }
            kind if kind.is_store() => KindProfile::Store(StoreProfile {
                replication: props.keyword("replication")?.unwrap_or_default(),
                slave_count: props.count("slave_count")?.unwrap_or(0),
                role: props.keyword("role")?.unwrap_or_default(),
            }),
            ComponentType::MessageQueue => KindProfile::Queue(QueueProfile {
                delivery: props.keyword("delivery_mode")?.unwrap_or_default(),
            }),
            _ => KindProfile::Plain,
        };

        let markers = LegacyMarkers {
            crashed: props.flag("crashed")?,
            restarted_at: props.number("restarted_at")?,
            backlog: props.number("backlog")?.unwrap_or(0.0),
            replica_starts: props.numbers("replica_starts")?,
        };

        Ok(Self {
            id: component.id.clone(),
            name: component.name.clone(),
            kind: component.kind,
            operational_cost: component.operational_cost,
            max_qps: props.number("max_qps")?,
            base_latency_ms: props
                .number("base_latency")?
                .unwrap_or_else(|| component.kind.default_base_latency_ms()),
            profile,
            markers,
        })
    }

    pub fn autoscale(&self) -> Option<&AutoScaleProfile> {
        match &self.profile {
            KindProfile::Scalable(p) if p.enabled => Some(p),
            _ => None,
        }
    }

    pub fn store(&self) -> Option<&StoreProfile> {
        match &self.profile {
            KindProfile::Store(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_slave(&self) -> bool {
        self.store().is_some_and(|s| s.role == StoreRole::Slave)
    }

    /// True for a master database with at least one replication slave.
    pub fn has_replicas(&self) -> bool {
        self.store().is_some_and(|s| {
            s.replication == Replication::MasterSlave
                && s.role == StoreRole::Master
                && s.slave_count > 0
        })
    }
}

/// Typed access to one component's property bag.
/// Integers and floats are accepted interchangeably for numbers.
struct PropertyReader<'a> {
    id: &'a str,
    props: &'a Properties,
}

impl PropertyReader<'_> {
    fn wrong_type(&self, key: &str, expected: &str) -> EngineError {
        EngineError::invalid(format!(
            "component '{}': property '{key}' must be {expected}",
            self.id
        ))
    }

    fn number(&self, key: &str) -> EngineResult<Option<f64>> {
        match self.props.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => match v.as_f64() {
                Some(n) if n.is_finite() && n >= 0.0 => Ok(Some(n)),
                _ => Err(self.wrong_type(key, "a non-negative number")),
            },
        }
    }

    fn count(&self, key: &str) -> EngineResult<Option<u32>> {
        Ok(self.number(key)?.map(|n| n.round().min(u32::MAX as f64) as u32))
    }

    fn flag(&self, key: &str) -> EngineResult<bool> {
        match self.props.get(key) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(self.wrong_type(key, "a boolean")),
        }
    }

    fn numbers(&self, key: &str) -> EngineResult<Vec<f64>> {
        match self.props.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_f64().ok_or_else(|| self.wrong_type(key, "an array of numbers")))
                .collect(),
            Some(_) => Err(self.wrong_type(key, "an array of numbers")),
        }
    }

    fn keyword<T: serde::de::DeserializeOwned>(&self, key: &str) -> EngineResult<Option<T>> {
        match self.props.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v @ Value::String(_)) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|_| self.wrong_type(key, "a recognised keyword")),
            Some(_) => Err(self.wrong_type(key, "a string")),
        }
    }
}
