//! Endless-mode world state: the player's running balance and health.

use crate::types::{PlayerId, Rps, Seconds};
use serde::{Deserialize, Serialize};

/// Revenue per successfully served request.
const REVENUE_PER_REQUEST: f64 = 0.01;
/// Latency above which system health starts to fall.
const HEALTH_LATENCY_FLOOR_MS: f64 = 500.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub player_id: PlayerId,
    pub balance: f64,
    pub total_users: u64,
    /// 0-100, from latency and error rate.
    pub system_health: f64,
    /// Simulated seconds the system has been running.
    pub uptime: Seconds,
    pub last_tick: Seconds,
}

impl GameState {
    pub fn new(player_id: impl Into<String>, balance: f64) -> Self {
        Self {
            player_id: player_id.into(),
            balance,
            total_users: 0,
            system_health: 100.0,
            uptime: 0.0,
            last_tick: 0.0,
        }
    }

    /// Fold one evaluation into the world: health from latency and
    /// errors, revenue and users from the requests that succeeded.
    pub fn update_metrics(&mut self, avg_latency_ms: f64, error_rate: f64, rps: Rps) {
        let mut health = 100.0;
        if avg_latency_ms > HEALTH_LATENCY_FLOOR_MS {
            health -= (avg_latency_ms - HEALTH_LATENCY_FLOOR_MS) / 10.0;
        }
        health -= error_rate * 100.0;
        self.system_health = health.clamp(0.0, 100.0);

        let successful = (rps * (1.0 - error_rate.clamp(0.0, 1.0))).max(0.0);
        self.balance += successful * REVENUE_PER_REQUEST;
        self.total_users += successful.floor() as u64;
    }

    pub fn deduct_cost(&mut self, cost_per_second: f64, seconds: Seconds) {
        self.balance -= cost_per_second * seconds;
        self.uptime += seconds;
    }

    pub fn is_bankrupt(&self) -> bool {
        self.balance < 0.0
    }
}
