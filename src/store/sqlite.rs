use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::error::{QueueError, Result};
use crate::scheduler::{JobRecord, JobStatus, Priority};
use crate::store::JobStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id              TEXT PRIMARY KEY,
    kind            TEXT NOT NULL,
    payload         TEXT NOT NULL,
    priority        INTEGER NOT NULL DEFAULT 2,
    status          TEXT NOT NULL CHECK(status IN ('queued', 'running', 'completed', 'failed', 'cancelled')),
    attempt_count   INTEGER NOT NULL DEFAULT 0,
    output          TEXT,
    error           TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_status_priority ON jobs(status, priority, created_at);
"#;

const SELECT_COLUMNS: &str =
    "id, kind, payload, priority, status, attempt_count, output, error, created_at, updated_at";

/// Durable store backed by a single SQLite table keyed by job id.
///
/// Runs in WAL mode so an abrupt process death never leaves a partially
/// written transition: each status update is one SQL statement that
/// either fully lands or is absent after restart.
pub struct SqliteStore {
    conn: Connection,
}

/// Fixed-width RFC 3339 (microseconds, Z suffix) so lexicographic
/// comparison in SQL matches chronological order.
fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| QueueError::Internal(format!("bad timestamp {raw:?}: {e}")))
}

/// Column values as SQLite hands them back, before domain parsing.
struct RawRow {
    id: String,
    kind: String,
    payload: String,
    priority: i32,
    status: String,
    attempt_count: u32,
    output: Option<String>,
    error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            payload: row.get(2)?,
            priority: row.get(3)?,
            status: row.get(4)?,
            attempt_count: row.get(5)?,
            output: row.get(6)?,
            error: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_record(self) -> Result<JobRecord> {
        Ok(JobRecord {
            id: Uuid::parse_str(&self.id)
                .map_err(|e| QueueError::Internal(format!("bad job id {:?}: {e}", self.id)))?,
            kind: self.kind,
            payload: serde_json::from_str(&self.payload)?,
            priority: Priority::from_i32(self.priority),
            status: JobStatus::parse(&self.status)
                .ok_or_else(|| QueueError::Internal(format!("bad status {:?}", self.status)))?,
            attempt_count: self.attempt_count,
            output: self.output,
            error: self.error,
            created_at: decode_ts(&self.created_at)?,
            updated_at: decode_ts(&self.updated_at)?,
        })
    }
}

impl SqliteStore {
    /// Open (or create) the store at `path`. Pass `None` for an
    /// in-memory database (not durable; mainly useful in tests).
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)?,
            None => Connection::open_in_memory()?,
        };

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self { conn })
    }

    fn query_records<P: rusqlite::Params>(&self, sql: &str, args: P) -> Result<Vec<JobRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(args, RawRow::from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }
}

impl JobStore for SqliteStore {
    fn insert(&mut self, record: &JobRecord) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO jobs ({SELECT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
            params![
                record.id.to_string(),
                record.kind,
                serde_json::to_string(&record.payload)?,
                record.priority.as_i32(),
                record.status.as_str(),
                record.attempt_count,
                record.output,
                record.error,
                encode_ts(record.created_at),
                encode_ts(record.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Option<JobRecord>> {
        let mut records = self.query_records(
            &format!("SELECT {SELECT_COLUMNS} FROM jobs WHERE id = ?1"),
            params![id.to_string()],
        )?;
        Ok(if records.is_empty() {
            None
        } else {
            Some(records.remove(0))
        })
    }

    fn update_status(
        &mut self,
        id: Uuid,
        status: JobStatus,
        output: Option<&str>,
        error: Option<&str>,
    ) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE jobs SET status = ?1, output = ?2, error = ?3, updated_at = ?4 WHERE id = ?5",
            params![
                status.as_str(),
                output,
                error,
                encode_ts(Utc::now()),
                id.to_string()
            ],
        )?;
        if changed == 0 {
            return Err(QueueError::JobNotFound(id));
        }
        Ok(())
    }

    fn mark_running(&mut self, id: Uuid) -> Result<u32> {
        let changed = self.conn.execute(
            "UPDATE jobs SET status = 'running', attempt_count = attempt_count + 1, updated_at = ?1
             WHERE id = ?2",
            params![encode_ts(Utc::now()), id.to_string()],
        )?;
        if changed == 0 {
            return Err(QueueError::JobNotFound(id));
        }
        let attempts: u32 = self.conn.query_row(
            "SELECT attempt_count FROM jobs WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )?;
        Ok(attempts)
    }

    fn update_priority(&mut self, id: Uuid, priority: Priority) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE jobs SET priority = ?1 WHERE id = ?2",
            params![priority.as_i32(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(QueueError::JobNotFound(id));
        }
        Ok(())
    }

    fn scan_by_status(&self, status: JobStatus) -> Result<Vec<JobRecord>> {
        self.query_records(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM jobs WHERE status = ?1
                 ORDER BY created_at ASC, id ASC"
            ),
            params![status.as_str()],
        )
    }

    fn scan_all(&self) -> Result<Vec<JobRecord>> {
        self.query_records(
            &format!("SELECT {SELECT_COLUMNS} FROM jobs ORDER BY created_at ASC, id ASC"),
            [],
        )
    }

    fn requeue_interrupted(&mut self) -> Result<u32> {
        let count = self.conn.execute(
            "UPDATE jobs SET status = 'queued', updated_at = ?1 WHERE status = 'running'",
            params![encode_ts(Utc::now())],
        )?;
        Ok(count as u32)
    }

    fn delete_older_than(&mut self, cutoff: DateTime<Utc>) -> Result<u32> {
        let count = self.conn.execute(
            "DELETE FROM jobs
             WHERE status IN ('completed', 'failed', 'cancelled')
             AND updated_at < ?1",
            params![encode_ts(cutoff)],
        )?;
        Ok(count as u32)
    }
}
