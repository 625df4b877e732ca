//! Persistence boundary for schedule states.
//!
//! Stores only keep rows; they never run the scheduler. Every write of a
//! reviewed state goes through [`ScheduleStore::compare_and_swap`] so two
//! submissions computed from the same stale row cannot both land.
//! Timestamps are kept at millisecond precision.

pub mod db;
pub mod memory;

pub use db::SqliteStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::models::{LearnerId, ScheduleKey, ScheduleState, select_due};
use chrono::{DateTime, Utc};

/// A stored row together with its write version.
#[derive(Clone, Debug, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

pub trait ScheduleStore: Send + Sync {
    fn load(&self, key: &ScheduleKey) -> Result<Option<Versioned<ScheduleState>>>;

    /// Inserts `state` unless a row for its key exists. Returns whichever row
    /// is stored afterwards and whether this call created it; an existing row
    /// is never modified.
    fn insert_if_absent(&self, state: ScheduleState) -> Result<(Versioned<ScheduleState>, bool)>;

    /// Replaces the row for `next.key()` if it is still at `expected_version`.
    /// Fails with `Conflict` when another writer got there first.
    fn compare_and_swap(&self, expected_version: u64, next: &ScheduleState) -> Result<u64>;

    fn states_for_learner(&self, learner_id: &LearnerId) -> Result<Vec<ScheduleState>>;

    fn due_for_learner(
        &self,
        learner_id: &LearnerId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ScheduleState>> {
        Ok(select_due(self.states_for_learner(learner_id)?, now, limit))
    }
}
