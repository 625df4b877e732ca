//! JSON import/export of a learner's schedule rows.
//! Import only adds rows that are missing; stored progress is never overwritten.

use crate::database::ScheduleStore;
use crate::error::{Result, StorageError};
use crate::models::{LearnerId, ScheduleState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub learner_id: LearnerId,
    pub exported_at: DateTime<Utc>,
    pub states: Vec<ScheduleState>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Writes every schedule row of `learner_id` to `path` as pretty JSON.
pub fn export_progress<S: ScheduleStore>(
    store: &S,
    learner_id: &LearnerId,
    path: impl AsRef<Path>,
    now: DateTime<Utc>,
) -> Result<ProgressSnapshot> {
    let snapshot = ProgressSnapshot {
        learner_id: learner_id.clone(),
        exported_at: now,
        states: store.states_for_learner(learner_id)?,
    };

    let json_string = serde_json::to_string_pretty(&snapshot).map_err(StorageError::from)?;
    let mut file = File::create(path).map_err(StorageError::from)?;
    file.write_all(json_string.as_bytes())
        .map_err(StorageError::from)?;
    Ok(snapshot)
}

pub fn read_snapshot(path: impl AsRef<Path>) -> Result<ProgressSnapshot> {
    let mut file = File::open(path).map_err(StorageError::from)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(StorageError::from)?;

    Ok(serde_json::from_str(&contents).map_err(StorageError::from)?)
}

/// Validates every row first, then inserts those the store does not have yet.
pub fn import_progress<S: ScheduleStore>(store: &S, path: impl AsRef<Path>) -> Result<ImportReport> {
    let snapshot = read_snapshot(path)?;
    for state in &snapshot.states {
        state.check_invariants()?;
        if state.learner_id != snapshot.learner_id {
            return Err(StorageError::Corrupt(format!(
                "row for {} inside snapshot of {}",
                state.learner_id, snapshot.learner_id
            ))
            .into());
        }
    }

    let mut report = ImportReport::default();
    for state in snapshot.states {
        if store.insert_if_absent(state)?.1 {
            report.inserted += 1;
        } else {
            report.skipped += 1;
        }
    }

    tracing::info!(
        learner = %snapshot.learner_id,
        inserted = report.inserted,
        skipped = report.skipped,
        "progress imported"
    );
    Ok(report)
}
