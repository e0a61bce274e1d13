//! SQLite-backed design repository.
//!
//! RULE: Only this file talks to the database.

use super::{stamp_for_save, DesignRepository};
use crate::{
    design::Design,
    error::{EngineError, EngineResult},
    types::DesignId,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

pub struct SqliteDesignStore {
    // rusqlite connections are Send but not Sync.
    conn: Mutex<Connection>,
}

impl SqliteDesignStore {
    /// Open (or create) the design database at `path`.
    pub fn open(path: &str) -> EngineResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> EngineResult<()> {
        let conn = self.conn.lock().map_err(|_| EngineError::StorePoisoned)?;
        conn.execute_batch(include_str!("../../migrations/001_designs.sql"))?;
        Ok(())
    }

    pub fn count(&self) -> EngineResult<i64> {
        let conn = self.conn.lock().map_err(|_| EngineError::StorePoisoned)?;
        Ok(conn.query_row("SELECT COUNT(*) FROM design", [], |r| r.get(0))?)
    }
}

impl DesignRepository for SqliteDesignStore {
    fn save(&self, design: Design) -> EngineResult<DesignId> {
        let conn = self.conn.lock().map_err(|_| EngineError::StorePoisoned)?;
        let previous: Option<i64> = conn
            .query_row(
                "SELECT created_at FROM design WHERE design_id = ?1",
                params![design.id],
                |r| r.get(0),
            )
            .optional()?;
        let design = stamp_for_save(design, previous);
        let body = serde_json::to_string(&design)?;
        conn.execute(
            "INSERT INTO design (design_id, player_id, scenario_id, body_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(design_id) DO UPDATE SET
                player_id = excluded.player_id,
                scenario_id = excluded.scenario_id,
                body_json = excluded.body_json,
                updated_at = excluded.updated_at",
            params![
                design.id,
                design.player_id,
                design.scenario_id,
                body,
                design.created_at,
                design.updated_at,
            ],
        )?;
        log::debug!("design {} persisted", design.id);
        Ok(design.id)
    }

    fn get(&self, id: &str) -> EngineResult<Design> {
        let conn = self.conn.lock().map_err(|_| EngineError::StorePoisoned)?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body_json FROM design WHERE design_id = ?1",
                params![id],
                |r| r.get(0),
            )
            .optional()?;
        match body {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Err(EngineError::not_found("design", id)),
        }
    }

    fn list_by_player(&self, player_id: &str) -> EngineResult<Vec<Design>> {
        let conn = self.conn.lock().map_err(|_| EngineError::StorePoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT body_json FROM design WHERE player_id = ?1 ORDER BY design_id ASC",
        )?;
        let rows = stmt.query_map(params![player_id], |r| r.get::<_, String>(0))?;
        let mut designs = Vec::new();
        for row in rows {
            designs.push(serde_json::from_str(&row?)?);
        }
        Ok(designs)
    }
}
