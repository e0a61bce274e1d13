//! Storage collaborators.
//!
//! RULE: The engine never performs lookups itself. Callers resolve a
//! design and its scenario through these repositories and hand the
//! engine plain values.

mod memory;
mod sqlite;

pub use memory::{builtin_scenarios, MemoryDesignStore, MemoryScenarioStore};
pub use sqlite::SqliteDesignStore;

use crate::{
    design::Design,
    error::EngineResult,
    scenario::Scenario,
    types::DesignId,
};

pub trait DesignRepository: Send + Sync {
    /// Insert or replace. Returns the id the design was stored under.
    fn save(&self, design: Design) -> EngineResult<DesignId>;
    /// Fails with `NotFound` for an unknown id.
    fn get(&self, id: &str) -> EngineResult<Design>;
    fn list_by_player(&self, player_id: &str) -> EngineResult<Vec<Design>>;
}

pub trait ScenarioRepository: Send + Sync {
    /// Fails with `NotFound` for an unknown id.
    fn get(&self, id: &str) -> EngineResult<Scenario>;
    fn list_all(&self) -> EngineResult<Vec<Scenario>>;
}

/// Stamp a design for storage: assign an id when it has none and
/// maintain the created/updated timestamps.
pub(crate) fn stamp_for_save(mut design: Design, previous_created_at: Option<i64>) -> Design {
    let now = chrono::Utc::now().timestamp();
    if design.id.trim().is_empty() {
        design.id = uuid::Uuid::new_v4().to_string();
    }
    design.created_at = previous_created_at
        .filter(|&t| t > 0)
        .unwrap_or(if design.created_at > 0 { design.created_at } else { now });
    design.updated_at = now;
    design
}
