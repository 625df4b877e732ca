//! In-process store, mostly for tests and embedding without SQLite.
use super::{ScheduleStore, Versioned};
use crate::error::{Result, SchedulerError, StorageError};
use crate::models::{LearnerId, ScheduleKey, ScheduleState};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<ScheduleKey, Versioned<ScheduleState>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> Result<MutexGuard<'_, HashMap<ScheduleKey, Versioned<ScheduleState>>>> {
        self.rows
            .lock()
            .map_err(|_| SchedulerError::Storage(StorageError::Poisoned))
    }
}

impl ScheduleStore for MemoryStore {
    fn load(&self, key: &ScheduleKey) -> Result<Option<Versioned<ScheduleState>>> {
        Ok(self.rows()?.get(key).cloned())
    }

    fn insert_if_absent(&self, state: ScheduleState) -> Result<(Versioned<ScheduleState>, bool)> {
        let mut rows = self.rows()?;
        match rows.entry(state.key()) {
            Entry::Occupied(row) => Ok((row.get().clone(), false)),
            Entry::Vacant(slot) => {
                let row = slot.insert(Versioned {
                    version: 1,
                    value: state,
                });
                Ok((row.clone(), true))
            }
        }
    }

    fn compare_and_swap(&self, expected_version: u64, next: &ScheduleState) -> Result<u64> {
        let key = next.key();
        let mut rows = self.rows()?;
        let Some(row) = rows.get_mut(&key) else {
            return Err(SchedulerError::NotFound {
                learner_id: key.learner_id,
                term_id: key.term_id,
            });
        };
        if row.version != expected_version {
            return Err(SchedulerError::Conflict {
                learner_id: key.learner_id,
                term_id: key.term_id,
                attempts: 1,
            });
        }
        row.version += 1;
        row.value = next.clone();
        Ok(row.version)
    }

    fn states_for_learner(&self, learner_id: &LearnerId) -> Result<Vec<ScheduleState>> {
        Ok(self
            .rows()?
            .values()
            .filter(|row| &row.value.learner_id == learner_id)
            .map(|row| row.value.clone())
            .collect())
    }
}
