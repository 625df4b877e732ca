//! SQLite-backed schedule store.
//!
//! Holds one `schedule_states` row per learner/term with a `version` column
//! used for optimistic compare-and-swap, plus the `app_state` table keeping a
//! simulated current date for the command-line tool.

use super::{ScheduleStore, Versioned};
use crate::error::{Result, SchedulerError, StorageError, ValidationError};
use crate::models::{LearnerId, ScheduleKey, ScheduleState, TermId};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SELECT_COLUMNS: &str = "learner_id, term_id, repetitions, ease_factor, interval_days,
     next_review_at, last_reviewed_at, times_correct, times_incorrect, mastery_level, version";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database file and its tables.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "opening schedule database");
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schedule_states (
                learner_id TEXT NOT NULL,
                term_id TEXT NOT NULL,
                repetitions INTEGER NOT NULL DEFAULT 0,
                ease_factor REAL NOT NULL DEFAULT 2.5,
                interval_days INTEGER NOT NULL DEFAULT 1,
                next_review_at INTEGER,
                last_reviewed_at INTEGER,
                times_correct INTEGER NOT NULL DEFAULT 0,
                times_incorrect INTEGER NOT NULL DEFAULT 0,
                mastery_level INTEGER NOT NULL DEFAULT 0,
                version INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (learner_id, term_id)
            )",
            (),
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_schedule_states_due
             ON schedule_states (learner_id, next_review_at)",
            (),
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS app_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            (),
        )?;

        conn.execute(
            "INSERT OR IGNORE INTO app_state (key, value) VALUES ('current_date', ?1)",
            params![Utc::now().timestamp_millis().to_string()],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SchedulerError::Storage(StorageError::Poisoned))
    }

    /// Simulated "today" used by the CLI instead of the wall clock.
    pub fn current_date(&self) -> Result<DateTime<Utc>> {
        let conn = self.conn()?;
        let value: String = conn.query_row(
            "SELECT value FROM app_state WHERE key = 'current_date'",
            [],
            |row| row.get(0),
        )?;

        value
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| {
                StorageError::Corrupt(format!("current_date is not a timestamp: {value}")).into()
            })
    }

    pub fn set_current_date(&self, date: DateTime<Utc>) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO app_state (key, value) VALUES ('current_date', ?1)",
            params![date.timestamp_millis().to_string()],
        )?;
        Ok(())
    }

    /// Moves the simulated date forward by 24 hours.
    pub fn advance_day(&self) -> Result<DateTime<Utc>> {
        let today = self.current_date()?;
        let next_day = today
            .checked_add_signed(Duration::days(1))
            .ok_or(ValidationError::TimestampOutOfRange(today))?;
        self.set_current_date(next_day)?;
        Ok(next_day)
    }

    fn load_with(conn: &Connection, key: &ScheduleKey) -> Result<Option<Versioned<ScheduleState>>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM schedule_states WHERE learner_id = ?1 AND term_id = ?2"
        );
        let row = conn
            .query_row(
                &sql,
                params![key.learner_id.as_str(), key.term_id.as_str()],
                row_to_state,
            )
            .optional()?;
        Ok(row)
    }
}

fn millis(at: Option<DateTime<Utc>>) -> Option<i64> {
    at.map(|at| at.timestamp_millis())
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(idx)? {
        None => Ok(None),
        Some(ms) => DateTime::from_timestamp_millis(ms)
            .map(Some)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms)),
    }
}

fn row_to_state(row: &Row<'_>) -> rusqlite::Result<Versioned<ScheduleState>> {
    let version: i64 = row.get(10)?;
    Ok(Versioned {
        version: u64::try_from(version)
            .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(10, version))?,
        value: ScheduleState {
            learner_id: LearnerId::new(row.get::<_, String>(0)?),
            term_id: TermId::new(row.get::<_, String>(1)?),
            repetitions: row.get(2)?,
            ease_factor: row.get(3)?,
            interval_days: row.get(4)?,
            next_review_at: timestamp(row, 5)?,
            last_reviewed_at: timestamp(row, 6)?,
            times_correct: row.get(7)?,
            times_incorrect: row.get(8)?,
            mastery_level: row.get(9)?,
        },
    })
}

impl ScheduleStore for SqliteStore {
    fn load(&self, key: &ScheduleKey) -> Result<Option<Versioned<ScheduleState>>> {
        let conn = self.conn()?;
        Self::load_with(&conn, key)
    }

    fn insert_if_absent(&self, state: ScheduleState) -> Result<(Versioned<ScheduleState>, bool)> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO schedule_states (
                learner_id, term_id, repetitions, ease_factor, interval_days,
                next_review_at, last_reviewed_at, times_correct, times_incorrect,
                mastery_level, version
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1)",
            params![
                state.learner_id.as_str(),
                state.term_id.as_str(),
                state.repetitions,
                state.ease_factor,
                state.interval_days,
                millis(state.next_review_at),
                millis(state.last_reviewed_at),
                state.times_correct,
                state.times_incorrect,
                state.mastery_level,
            ],
        )?;
        if inserted == 0 {
            tracing::debug!(key = %state.key(), "schedule state already present");
        }

        let key = state.key();
        let row = Self::load_with(&conn, &key)?.ok_or_else(|| {
            StorageError::Corrupt(format!("row {key} missing right after insert"))
        })?;
        Ok((row, inserted == 1))
    }

    fn compare_and_swap(&self, expected_version: u64, next: &ScheduleState) -> Result<u64> {
        let conn = self.conn()?;
        let expected = i64::try_from(expected_version)
            .map_err(|_| StorageError::Corrupt(format!("version {expected_version} too large")))?;

        let updated = conn.execute(
            "UPDATE schedule_states
             SET repetitions = ?1, ease_factor = ?2, interval_days = ?3,
                 next_review_at = ?4, last_reviewed_at = ?5, times_correct = ?6,
                 times_incorrect = ?7, mastery_level = ?8, version = version + 1
             WHERE learner_id = ?9 AND term_id = ?10 AND version = ?11",
            params![
                next.repetitions,
                next.ease_factor,
                next.interval_days,
                millis(next.next_review_at),
                millis(next.last_reviewed_at),
                next.times_correct,
                next.times_incorrect,
                next.mastery_level,
                next.learner_id.as_str(),
                next.term_id.as_str(),
                expected,
            ],
        )?;

        if updated == 1 {
            return Ok(expected_version + 1);
        }

        let key = next.key();
        match Self::load_with(&conn, &key)? {
            Some(_) => Err(SchedulerError::Conflict {
                learner_id: key.learner_id,
                term_id: key.term_id,
                attempts: 1,
            }),
            None => Err(SchedulerError::NotFound {
                learner_id: key.learner_id,
                term_id: key.term_id,
            }),
        }
    }

    fn states_for_learner(&self, learner_id: &LearnerId) -> Result<Vec<ScheduleState>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM schedule_states WHERE learner_id = ?1 ORDER BY term_id"
        ))?;

        let states = stmt
            .query_map(params![learner_id.as_str()], row_to_state)?
            .map(|row| row.map(|versioned| versioned.value))
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(states)
    }

    /// Uses the `(learner_id, next_review_at)` index instead of a full scan.
    fn due_for_learner(
        &self,
        learner_id: &LearnerId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ScheduleState>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM schedule_states
             WHERE learner_id = ?1 AND next_review_at IS NOT NULL AND next_review_at <= ?2
             ORDER BY next_review_at ASC, term_id ASC
             LIMIT ?3"
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let states = stmt
            .query_map(
                params![learner_id.as_str(), now.timestamp_millis(), limit],
                row_to_state,
            )?
            .map(|row| row.map(|versioned| versioned.value))
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(states)
    }
}
