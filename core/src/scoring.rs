//! Scoring & latency model.
//!
//! Each dimension is a small pure function of aggregate metrics, so
//! every formula can be checked in isolation. The composite and the
//! pass bar come entirely from `ScoringConfig`.

use crate::{
    config::{ConsistencyPenalties, ScoringConfig, ScoringWeights},
    evaluation::{Score, ScoreBreakdown},
};

pub fn success_rate(fulfilled: f64, offered: f64) -> f64 {
    if offered <= 0.0 {
        return 0.0;
    }
    (fulfilled / offered).clamp(0.0, 1.0)
}

pub fn reliability_score(crashed: usize, replicated_database: bool, config: &ScoringConfig) -> f64 {
    let bonus = if replicated_database { config.replication_bonus } else { 0.0 };
    (100.0 - config.crash_penalty * crashed as f64 + bonus).clamp(0.0, 100.0)
}

pub fn security_score(incidents: f64, config: &ScoringConfig) -> f64 {
    (100.0 - config.security_incident_weight * incidents).max(0.0)
}

/// Asynchronous or eventually-consistent elements a request can touch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsistencyExposure {
    pub message_queues: usize,
    pub caches: usize,
    pub nosql_stores: usize,
    pub slave_writes: usize,
}

pub fn consistency_score(exposure: ConsistencyExposure, penalties: &ConsistencyPenalties) -> f64 {
    let penalty = penalties.message_queue * exposure.message_queues as f64
        + penalties.cache * exposure.caches as f64
        + penalties.nosql * exposure.nosql_stores as f64
        + penalties.slave_write * exposure.slave_writes as f64;
    (100.0 - penalty).max(0.0)
}

/// 100 at or under budget, minus a fixed penalty per unit over it.
pub fn cost_score(cost: f64, budget: Option<f64>, config: &ScoringConfig) -> f64 {
    match budget {
        Some(limit) if cost > limit => {
            (100.0 - config.budget_penalty_per_unit * (cost - limit)).max(0.0)
        }
        _ => 100.0,
    }
}

/// Latency multiplier one node contributes. CPU past the knee blows up
/// cubically; utilization past its knee grows linearly.
pub fn congestion_term(cpu_pct: f64, utilization: f64, config: &ScoringConfig) -> f64 {
    let knee = config.cpu_congestion_knee_pct;
    let cpu_term = if cpu_pct > knee {
        1.0 + ((cpu_pct - knee) / (100.0 - knee).max(f64::EPSILON)).powi(3)
    } else {
        1.0
    };
    let util_knee = config.utilization_congestion_knee;
    let util_term = if utilization > util_knee {
        1.0 + (utilization - util_knee) * 10.0
    } else {
        1.0
    };
    cpu_term.max(util_term)
}

pub fn total_latency(base_sum_ms: f64, congestion: f64, config: &ScoringConfig) -> f64 {
    (base_sum_ms * congestion).min(config.latency_ceiling_ms)
}

/// Full marks within the goal; proportional decay beyond it.
pub fn latency_score(latency_ms: f64, goal_ms: f64) -> f64 {
    if goal_ms <= 0.0 || latency_ms <= goal_ms {
        100.0
    } else {
        (100.0 * goal_ms / latency_ms).clamp(0.0, 100.0)
    }
}

/// Weight-normalised sum of the dimensions.
pub fn composite(breakdown: &ScoreBreakdown, weights: &ScoringWeights) -> f64 {
    let parts = [
        (weights.success, breakdown.capacity),
        (weights.reliability, breakdown.reliability),
        (weights.security, breakdown.security),
        (weights.cost, breakdown.cost),
        (weights.consistency, breakdown.consistency),
        (weights.latency, breakdown.latency),
    ];
    let total_weight: f64 = parts.iter().map(|(w, _)| w.max(0.0)).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    parts.iter().map(|(w, v)| w.max(0.0) * v).sum::<f64>() / total_weight
}

/// Inputs to the per-dimension remarks.
pub struct ScoreContext {
    pub offered: f64,
    pub fulfilled: f64,
    pub crashed: usize,
    pub replicated_database: bool,
    pub incidents: f64,
    pub exposure: ConsistencyExposure,
    pub cost: f64,
    pub budget: Option<f64>,
    pub latency_ms: f64,
    pub goal_latency_ms: f64,
    pub bottleneck: Option<String>,
}

pub fn score_all(ctx: &ScoreContext, config: &ScoringConfig) -> (ScoreBreakdown, Vec<Score>) {
    let breakdown = ScoreBreakdown {
        capacity: success_rate(ctx.fulfilled, ctx.offered) * 100.0,
        reliability: reliability_score(ctx.crashed, ctx.replicated_database, config),
        security: security_score(ctx.incidents, config),
        cost: cost_score(ctx.cost, ctx.budget, config),
        consistency: consistency_score(ctx.exposure, &config.consistency_penalties),
        latency: latency_score(ctx.latency_ms, ctx.goal_latency_ms),
    };

    let capacity_comment = match &ctx.bottleneck {
        Some(b) => format!(
            "Served {:.1} of {:.1} rps; bottleneck: {b}",
            ctx.fulfilled, ctx.offered
        ),
        None => format!("Served {:.1} of {:.1} rps", ctx.fulfilled, ctx.offered),
    };
    let reliability_comment = match (ctx.crashed, ctx.replicated_database) {
        (0, true)  => "No crashed components; replicated database".to_string(),
        (0, false) => "No crashed components".to_string(),
        (n, _)     => format!("{n} crashed component(s)"),
    };
    let cost_comment = match ctx.budget {
        Some(b) => format!("Operating cost {:.2}/s against budget {:.2}/s", ctx.cost, b),
        None => format!("Operating cost {:.2}/s (no budget set)", ctx.cost),
    };
    let e = ctx.exposure;

    let scores = vec![
        Score { dimension: "Capacity".into(), value: breakdown.capacity, comment: capacity_comment },
        Score { dimension: "Reliability".into(), value: breakdown.reliability, comment: reliability_comment },
        Score {
            dimension: "Security".into(),
            value: breakdown.security,
            comment: format!("Security incident weight {:.1}", ctx.incidents),
        },
        Score { dimension: "Cost".into(), value: breakdown.cost, comment: cost_comment },
        Score {
            dimension: "Consistency".into(),
            value: breakdown.consistency,
            comment: format!(
                "{} queue(s), {} cache(s), {} NoSQL store(s), {} slave write target(s)",
                e.message_queues, e.caches, e.nosql_stores, e.slave_writes
            ),
        },
        Score {
            dimension: "Latency".into(),
            value: breakdown.latency,
            comment: format!("Latency {:.1} ms", ctx.latency_ms),
        },
    ];
    (breakdown, scores)
}
