//! Shared primitive types used across the entire engine.

/// Simulated time, in seconds since the scenario started.
pub type Seconds = f64;

/// Requests per second.
pub type Rps = f64;

/// A stable, unique identifier for a component inside one design.
pub type ComponentId = String;

pub type DesignId = String;

pub type ScenarioId = String;

pub type PlayerId = String;
