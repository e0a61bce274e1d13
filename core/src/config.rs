//! Engine configuration.
//!
//! `EngineConfig::default()` is the shipped policy. Every section is
//! `#[serde(default)]`, so a JSON override file only needs the fields it
//! changes. Scoring weights and thresholds live here rather than inline
//! so they stay named, overridable and testable.

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub demand: DemandConfig,
    pub capacity: CapacityConfig,
    pub resources: ResourceConfig,
    pub scoring: ScoringConfig,
    pub traversal: TraversalConfig,
}

impl EngineConfig {
    /// Load overrides from a JSON file; absent fields keep their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading engine config {path}"))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing engine config {path}"))?;
        Ok(config)
    }
}

// ── Demand ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DemandConfig {
    pub default_read_ratio: f64,

    pub burst_multiplier: f64,
    pub burst_cycle_seconds: f64,
    pub burst_active_seconds: f64,

    /// Relative amplitude of the sinusoidal fluctuation.
    pub fluctuation_amplitude: f64,
    pub fluctuation_period_seconds: f64,

    pub drop_cycle_seconds: f64,
    pub drop_duration_seconds: f64,
    pub drop_probability: f64,
    /// Rate multiplier while a drop event is active.
    pub drop_factor: f64,

    pub attack_warmup_seconds: f64,
    pub attack_period_seconds: f64,
    pub attack_window_seconds: f64,
    pub attack_base_rate: f64,
    pub attack_amplitude: f64,

    /// Master seed for the drop-event RNG.
    pub seed: u64,
}

impl Default for DemandConfig {
    fn default() -> Self {
        Self {
            default_read_ratio:         0.8,
            burst_multiplier:           5.0,
            burst_cycle_seconds:        10.0,
            burst_active_seconds:       3.0,
            fluctuation_amplitude:      0.1,
            fluctuation_period_seconds: 60.0,
            drop_cycle_seconds:         120.0,
            drop_duration_seconds:      15.0,
            drop_probability:           0.05,
            drop_factor:                0.3,
            attack_warmup_seconds:      30.0,
            attack_period_seconds:      60.0,
            attack_window_seconds:      15.0,
            attack_base_rate:           5_000.0,
            attack_amplitude:           2_500.0,
            seed:                       0x5EED_CAFE,
        }
    }
}

// ── Capacity, scaling and failure ──────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CapacityConfig {
    /// Share of reads a cache or CDN answers locally.
    pub cache_hit_ratio: f64,
    /// Share of malicious traffic a WAF lets through.
    pub waf_malicious_pass: f64,
    /// Share of legitimate traffic a WAF wrongly blocks.
    pub waf_false_positive: f64,

    pub default_crash_multiplier: f64,
    pub durable_crash_multiplier: f64,
    pub edge_crash_multiplier: f64,
    pub scaling_group_crash_multiplier: f64,

    pub restart_grace_seconds: f64,
    pub replica_warmup_seconds: f64,
    pub default_scale_up_threshold: f64,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            cache_hit_ratio:                0.8,
            waf_malicious_pass:             0.1,
            waf_false_positive:             0.02,
            default_crash_multiplier:       1.5,
            durable_crash_multiplier:       50.0,
            edge_crash_multiplier:          5.0,
            scaling_group_crash_multiplier: 3.0,
            restart_grace_seconds:          5.0,
            replica_warmup_seconds:         30.0,
            default_scale_up_threshold:     0.7,
        }
    }
}

// ── Synthetic resource usage ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourceConfig {
    pub cpu_idle_pct: f64,
    /// CPU percentage points added per unit of weighted utilization.
    pub cpu_scale_pct: f64,
    /// How many reads one write costs.
    pub write_cost_factor: f64,

    pub cache_ram_base_pct: f64,
    pub cache_ram_per_util_pct: f64,
    pub queue_ram_base_pct: f64,
    pub queue_ram_span_pct: f64,
    /// Seconds of throughput a queue can buffer before memory is full.
    pub queue_buffer_seconds: f64,
    pub store_ram_base_pct: f64,
    pub store_ram_per_util_pct: f64,
    pub default_ram_base_pct: f64,
    pub default_ram_per_util_pct: f64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            cpu_idle_pct:             5.0,
            cpu_scale_pct:            90.0,
            write_cost_factor:        3.0,
            cache_ram_base_pct:       20.0,
            cache_ram_per_util_pct:   70.0,
            queue_ram_base_pct:       10.0,
            queue_ram_span_pct:       90.0,
            queue_buffer_seconds:     300.0,
            store_ram_base_pct:       30.0,
            store_ram_per_util_pct:   50.0,
            default_ram_base_pct:     10.0,
            default_ram_per_util_pct: 20.0,
        }
    }
}

// ── Scoring ────────────────────────────────────────────────────────

/// Relative weights of each dimension in the composite score.
/// Normalised by their sum, so they need not add up to 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringWeights {
    pub success: f64,
    pub reliability: f64,
    pub security: f64,
    pub cost: f64,
    pub consistency: f64,
    pub latency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            success:     0.5,
            reliability: 0.25,
            security:    0.25,
            cost:        0.0,
            consistency: 0.0,
            latency:     0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsistencyPenalties {
    pub message_queue: f64,
    pub cache: f64,
    pub nosql: f64,
    pub slave_write: f64,
}

impl Default for ConsistencyPenalties {
    fn default() -> Self {
        Self { message_queue: 5.0, cache: 5.0, nosql: 10.0, slave_write: 20.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    pub pass_threshold: f64,
    pub crash_penalty: f64,
    pub replication_bonus: f64,
    pub security_incident_weight: f64,
    /// Incident weight multiplier when the path crossed an API gateway.
    pub gateway_mitigation: f64,
    pub consistency_penalties: ConsistencyPenalties,
    pub budget_penalty_per_unit: f64,
    pub latency_ceiling_ms: f64,
    pub cpu_congestion_knee_pct: f64,
    pub utilization_congestion_knee: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights:                     ScoringWeights::default(),
            pass_threshold:              80.0,
            crash_penalty:               10.0,
            replication_bonus:           10.0,
            security_incident_weight:    0.5,
            gateway_mitigation:          0.5,
            consistency_penalties:       ConsistencyPenalties::default(),
            budget_penalty_per_unit:     5.0,
            latency_ceiling_ms:          5_000.0,
            cpu_congestion_knee_pct:     90.0,
            utilization_congestion_knee: 0.95,
        }
    }
}

// ── Traversal ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TraversalConfig {
    /// Upper bound on node arrivals per pass. Dense diamond chains can
    /// multiply paths; beyond this the walk stops and reports truncation.
    pub max_arrivals: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self { max_arrivals: 250_000 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_override_keeps_other_defaults() {
        let json = r#"{ "scoring": { "pass_threshold": 90.0, "weights": { "cost": 0.1 } } }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.scoring.pass_threshold, 90.0);
        assert_eq!(config.scoring.weights.cost, 0.1);
        assert_eq!(config.scoring.weights.success, 0.5);
        assert_eq!(config.capacity, CapacityConfig::default());
    }
}
