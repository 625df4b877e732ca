//! Wrapper for a due schedule state that tracks progress within one session.
use super::ScheduleState;
use chrono::{DateTime, Utc};

#[derive(Clone, Debug)]
pub struct ReviewItem {
    pub state: ScheduleState,
    pub is_learned: bool,
    pub last_graded_at: Option<DateTime<Utc>>,
}

impl ReviewItem {
    pub fn new(state: ScheduleState) -> Self {
        Self {
            state,
            is_learned: false,
            last_graded_at: None,
        }
    }

    /// Stores the post-review state; passing grades mark the item learned.
    pub fn record(&mut self, state: ScheduleState, passed: bool, at: DateTime<Utc>) {
        self.state = state;
        self.is_learned = passed;
        self.last_graded_at = Some(at);
    }
}
