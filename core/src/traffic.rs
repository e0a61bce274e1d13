//! Request rates split by kind, as they travel along edges.

use crate::types::Rps;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Traffic {
    pub read: Rps,
    pub write: Rps,
    pub malicious: Rps,
}

impl Traffic {
    pub const ZERO: Traffic = Traffic { read: 0.0, write: 0.0, malicious: 0.0 };

    pub fn new(read: Rps, write: Rps, malicious: Rps) -> Self {
        Self { read, write, malicious }
    }

    pub fn legitimate(&self) -> Rps {
        self.read + self.write
    }

    pub fn total(&self) -> Rps {
        self.read + self.write + self.malicious
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            read: self.read * factor,
            write: self.write * factor,
            malicious: self.malicious * factor,
        }
    }

    /// Even share for one of `ways` outgoing edges.
    pub fn split(&self, ways: usize) -> Self {
        if ways == 0 {
            return Self::ZERO;
        }
        self.scaled(1.0 / ways as f64)
    }

    pub fn is_zero(&self) -> bool {
        self.total() <= 0.0
    }
}

impl Add for Traffic {
    type Output = Traffic;
    fn add(self, rhs: Traffic) -> Traffic {
        Traffic {
            read: self.read + rhs.read,
            write: self.write + rhs.write,
            malicious: self.malicious + rhs.malicious,
        }
    }
}

impl AddAssign for Traffic {
    fn add_assign(&mut self, rhs: Traffic) {
        *self = *self + rhs;
    }
}
