//! Demand model: what each traffic source emits at one instant.
//!
//! Legitimate rate, in order of application:
//!   1. Scripted phase rate (linear within a phase, clamped after the last)
//!   2. + manual source base rate
//!   3. x burst multiplier during the active slice of each burst cycle
//!   4. x (1 + amplitude * sin(2πt / period))
//!   5. x drop factor during a rolled random-drop window
//!   6. x design retention rate
//!
//! Attack traffic is computed separately and never mixes with the
//! legitimate split.

use crate::{
    component::{ComponentSpec, KindProfile},
    config::DemandConfig,
    rng::{stream_key, EventRng},
    scenario::TrafficPhase,
    traffic::Traffic,
    types::{Rps, Seconds},
};
use std::f64::consts::PI;

/// Scripted rate at `elapsed`. Phases are walked in order, each one
/// consuming its duration from the offset.
pub fn phase_rate(phases: &[TrafficPhase], elapsed: Seconds) -> Rps {
    let mut remaining = elapsed.max(0.0);
    for phase in phases {
        if phase.duration_seconds > 0.0 && remaining < phase.duration_seconds {
            let progress = remaining / phase.duration_seconds;
            return phase.start_qps + (phase.end_qps - phase.start_qps) * progress;
        }
        remaining -= phase.duration_seconds.max(0.0);
    }
    phases.last().map(|p| p.end_qps).unwrap_or(0.0)
}

pub struct DemandModel<'a> {
    config: &'a DemandConfig,
}

impl<'a> DemandModel<'a> {
    pub fn new(config: &'a DemandConfig) -> Self {
        Self { config }
    }

    /// Traffic one source emits at `elapsed`. Non-source components emit nothing.
    pub fn source_traffic(
        &self,
        source: &ComponentSpec,
        phases: &[TrafficPhase],
        retention_rate: f64,
        elapsed: Seconds,
    ) -> Traffic {
        let KindProfile::Source(profile) = &source.profile else {
            return Traffic::ZERO;
        };

        let legitimate = self.legitimate_rate(
            &source.id,
            phase_rate(phases, elapsed) + profile.base_rate,
            profile.burst,
            retention_rate,
            elapsed,
        );
        let malicious = if profile.attack_enabled {
            self.attack_rate(elapsed)
        } else {
            0.0
        };

        let read_ratio = profile
            .read_ratio
            .unwrap_or(self.config.default_read_ratio)
            .clamp(0.0, 1.0);

        Traffic::new(legitimate * read_ratio, legitimate * (1.0 - read_ratio), malicious)
    }

    fn legitimate_rate(
        &self,
        source_id: &str,
        base: Rps,
        burst: bool,
        retention_rate: f64,
        t: Seconds,
    ) -> Rps {
        let c = self.config;
        let mut rate = base;

        if burst && c.burst_cycle_seconds > 0.0 && t.rem_euclid(c.burst_cycle_seconds) < c.burst_active_seconds {
            rate *= c.burst_multiplier;
        }

        if c.fluctuation_period_seconds > 0.0 {
            rate *= 1.0 + c.fluctuation_amplitude * (2.0 * PI * t / c.fluctuation_period_seconds).sin();
        }

        if self.drop_active(source_id, t) {
            rate *= c.drop_factor;
        }

        (rate * retention_rate.clamp(0.0, 1.0)).max(0.0)
    }

    /// A drop is rolled once per drop cycle and, when it fires, covers
    /// the opening seconds of that cycle.
    fn drop_active(&self, source_id: &str, t: Seconds) -> bool {
        let c = self.config;
        if c.drop_cycle_seconds <= 0.0 || t.rem_euclid(c.drop_cycle_seconds) >= c.drop_duration_seconds {
            return false;
        }
        let cycle = (t / c.drop_cycle_seconds).floor().max(0.0) as u64;
        EventRng::new(c.seed, stream_key(source_id), cycle).chance(c.drop_probability)
    }

    /// Pulsed malicious rate: zero before warm-up, then a half-sine pulse
    /// on top of the base rate during the opening window of each period.
    pub fn attack_rate(&self, t: Seconds) -> Rps {
        let c = self.config;
        if t < c.attack_warmup_seconds || c.attack_period_seconds <= 0.0 || c.attack_window_seconds <= 0.0 {
            return 0.0;
        }
        let in_period = (t - c.attack_warmup_seconds).rem_euclid(c.attack_period_seconds);
        if in_period >= c.attack_window_seconds {
            return 0.0;
        }
        c.attack_base_rate + c.attack_amplitude * (PI * in_period / c.attack_window_seconds).sin()
    }
}
