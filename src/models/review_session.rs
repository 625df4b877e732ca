//! Review session over a learner's due set.
//! Items graded below 3 come back in later rounds until every item passes.

use super::{ExerciseOutcome, LearnerId, Quality, ReviewItem, ScheduleState};
use crate::database::ScheduleStore;
use crate::error::Result;
use crate::service::ReviewService;
use chrono::{DateTime, Utc};

pub struct ReviewSession {
    pub learner_id: LearnerId,
    pub all_items: Vec<ReviewItem>,
    pub current_round_items: Vec<usize>,
    pub current_index: usize,
    pub round_number: usize,
}

impl ReviewSession {
    /// Starts a session from the learner's current due set.
    pub fn start<S: ScheduleStore>(
        service: &ReviewService<S>,
        learner_id: &LearnerId,
        limit: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let due = service.list_due(learner_id, limit, now)?;
        Ok(Self::from_due(learner_id.clone(), due))
    }

    pub fn from_due(learner_id: LearnerId, due: Vec<ScheduleState>) -> Self {
        let all_items: Vec<_> = due.into_iter().map(ReviewItem::new).collect();
        let indices: Vec<usize> = (0..all_items.len()).collect();

        Self {
            learner_id,
            all_items,
            current_round_items: indices,
            current_index: 0,
            round_number: 1,
        }
    }

    pub fn current(&self) -> Option<&ReviewItem> {
        self.current_round_items
            .get(self.current_index)
            .and_then(|&idx| self.all_items.get(idx))
    }

    /// Grades the current item through the service and moves to the next one.
    /// Returns `None` once the session is completed.
    pub fn grade_current<S: ScheduleStore>(
        &mut self,
        service: &ReviewService<S>,
        quality: Quality,
        now: DateTime<Utc>,
    ) -> Result<Option<ScheduleState>> {
        let Some(idx) = self.current_idx() else {
            return Ok(None);
        };
        let term_id = self.all_items[idx].state.term_id.clone();
        let next = service.submit_review(&self.learner_id, &term_id, quality, now)?;
        self.all_items[idx].record(next.clone(), quality.is_passing(), now);
        self.advance();
        Ok(Some(next))
    }

    /// Like [`Self::grade_current`], deriving the grade from a raw outcome.
    pub fn grade_current_outcome<S: ScheduleStore>(
        &mut self,
        service: &ReviewService<S>,
        outcome: &ExerciseOutcome,
        now: DateTime<Utc>,
    ) -> Result<Option<ScheduleState>> {
        let Some(idx) = self.current_idx() else {
            return Ok(None);
        };
        let term_id = self.all_items[idx].state.term_id.clone();
        let next = service.submit_outcome(&self.learner_id, &term_id, outcome, now)?;
        let passed = next.repetitions > 0;
        self.all_items[idx].record(next.clone(), passed, now);
        self.advance();
        Ok(Some(next))
    }

    /// Leaves the current item ungraded; it returns in the next round.
    pub fn skip(&mut self) {
        if self.current_idx().is_some() {
            self.advance();
        }
    }

    fn current_idx(&self) -> Option<usize> {
        self.current_round_items.get(self.current_index).copied()
    }

    fn advance(&mut self) {
        if self.current_index + 1 < self.current_round_items.len() {
            self.current_index += 1;
        } else {
            self.start_next_round();
        }
    }

    /// Next round holds the items that were not passed in this one.
    /// An empty round means the session is over.
    fn start_next_round(&mut self) {
        let failed: Vec<usize> = self
            .current_round_items
            .iter()
            .copied()
            .filter(|&idx| self.all_items.get(idx).is_some_and(|item| !item.is_learned))
            .collect();

        self.current_index = 0;
        if failed.is_empty() {
            self.current_round_items.clear();
            return;
        }

        self.current_round_items = failed;
        self.round_number += 1;
    }

    pub fn learned_count(&self) -> usize {
        self.current_round_items
            .iter()
            .filter(|&&idx| self.all_items.get(idx).is_some_and(|item| item.is_learned))
            .count()
    }

    pub fn total_count(&self) -> usize {
        self.current_round_items.len()
    }

    pub fn remaining_count(&self) -> usize {
        self.total_count() - self.learned_count()
    }

    pub fn is_completed(&self) -> bool {
        self.current_round_items.is_empty()
    }

    pub fn phase_message(&self) -> String {
        if self.round_number == 1 {
            format!("Round {}: {} terms", self.round_number, self.total_count())
        } else {
            format!(
                "Round {} (Review): {} terms to retry",
                self.round_number,
                self.total_count()
            )
        }
    }
}
