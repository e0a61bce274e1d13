//! Deterministic random number generation.
//!
//! RULE: Nothing in the engine may call any platform RNG.
//! Every roll comes from an `EventRng` derived from the configured
//! master seed, a stable stream key and a cycle index. The same
//! (seed, stream, cycle) always replays the same sequence, which is
//! what keeps `evaluate` a pure function of its inputs.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub struct EventRng {
    inner: Pcg64Mcg,
}

impl EventRng {
    /// `stream` separates independent event families (e.g. one per
    /// traffic source); `cycle` is the index of the time window rolled.
    pub fn new(master_seed: u64, stream: u64, cycle: u64) -> Self {
        let derived_seed = master_seed
            ^ stream.wrapping_mul(0x9e37_79b9_7f4a_7c15)
            ^ cycle.wrapping_mul(0xc2b2_ae3d_27d4_eb4f);
        Self { inner: Pcg64Mcg::seed_from_u64(derived_seed) }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// Stable 64-bit key for a string (FNV-1a). Used to derive per-source
/// streams; std's hashers are not stable across releases.
pub fn stream_key(s: &str) -> u64 {
    s.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}
