//! SQLite-backed proposal store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use crate::domain::{AppError, RawProposal};
use crate::ports::ProposalStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS proposals (
    proposal_id INTEGER NOT NULL PRIMARY KEY,
    status      TEXT NOT NULL,
    payload     TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
";

/// Proposal history kept in one SQLite file.
///
/// Each row stores the full flat payload as JSON so sentinel values such as
/// `"NaN"` survive untouched. A single mutex-guarded connection serializes
/// readers against the reconciler's writes.
#[derive(Debug)]
pub struct SqliteProposalStore {
    connection: Mutex<Connection>,
}

impl SqliteProposalStore {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let connection = Connection::open(path)?;
        connection.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(connection)
    }

    pub fn in_memory() -> Result<Self, AppError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(connection: Connection) -> Result<Self, AppError> {
        connection.execute_batch(SCHEMA)?;
        log::debug!("proposal schema ready");
        Ok(Self { connection: Mutex::new(connection) })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
impl SqliteProposalStore {
    /// Replace a row's payload with text that does not decode.
    pub(crate) fn corrupt_payload(&self, proposal_id: u64) {
        self.conn()
            .execute(
                "UPDATE proposals SET payload = 'not json' WHERE proposal_id = ?1",
                params![proposal_id as i64],
            )
            .unwrap();
    }
}

fn proposal_id(raw: &RawProposal) -> Result<u64, AppError> {
    raw.get("proposalId")
        .and_then(Value::as_u64)
        .ok_or_else(|| AppError::MissingField("proposalId".into()))
}

fn status(raw: &RawProposal) -> String {
    raw.get("status").and_then(Value::as_str).unwrap_or_default().to_string()
}

fn decode(proposal_id: i64, payload: &str) -> Option<RawProposal> {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(raw)) => Some(raw),
        Ok(_) => {
            log::warn!("stored proposal {} is not a JSON object, skipping", proposal_id);
            None
        }
        Err(e) => {
            log::warn!("stored proposal {} is not valid JSON ({}), skipping", proposal_id, e);
            None
        }
    }
}

impl ProposalStore for SqliteProposalStore {
    fn get_proposals(&self) -> Result<Vec<RawProposal>, AppError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT proposal_id, payload FROM proposals ORDER BY proposal_id")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;

        let mut proposals = Vec::new();
        for row in rows {
            let (id, payload) = row?;
            if let Some(raw) = decode(id, &payload) {
                proposals.push(raw);
            }
        }
        Ok(proposals)
    }

    fn get_proposal(&self, proposal_id: u64) -> Result<Option<RawProposal>, AppError> {
        let conn = self.conn();
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM proposals WHERE proposal_id = ?1",
                params![proposal_id as i64],
                |row| row.get(0),
            )
            .optional()?;

        Ok(payload.and_then(|payload| decode(proposal_id as i64, &payload)))
    }

    fn add_proposal(&self, raw: &RawProposal) -> Result<u64, AppError> {
        let id = proposal_id(raw)?;
        let payload = serde_json::to_string(raw)?;

        self.conn().execute(
            "INSERT INTO proposals (proposal_id, status, payload, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![id as i64, status(raw), payload, Utc::now().to_rfc3339()],
        )?;
        Ok(id)
    }

    fn update_proposal(&self, raw: &RawProposal) -> Result<usize, AppError> {
        let id = proposal_id(raw)?;
        let payload = serde_json::to_string(raw)?;

        let count = self.conn().execute(
            "UPDATE proposals SET status = ?1, payload = ?2, updated_at = ?3 WHERE proposal_id = ?4",
            params![status(raw), payload, Utc::now().to_rfc3339(), id as i64],
        )?;
        Ok(count)
    }
}
