//! Review service: the boundary callers talk to.
//!
//! Wraps a [`ScheduleStore`] and runs every review as a read-compute-write
//! cycle keyed by (learner, term). The compute step is pure, so a cycle that
//! loses a compare-and-swap race is simply redone against the fresh row.

use crate::config::SchedulerConfig;
use crate::database::ScheduleStore;
use crate::error::{Result, SchedulerError, ValidationError};
use crate::models::{
    ExerciseOutcome, LearnerId, Quality, Review, ScheduleKey, ScheduleState, TermId,
    derive_quality, schedule_review,
};
use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;

/// Stores keep millisecond timestamps, so `now` is cut to that precision
/// before it reaches a state the caller gets back.
fn store_precision(now: DateTime<Utc>) -> DateTime<Utc> {
    now.trunc_subsecs(3)
}

/// Aggregate view of one learner's schedule rows.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerStats {
    pub discovered: usize,
    pub due: usize,
    pub reviewed: usize,
    pub mean_ease_factor: Option<f64>,
    pub mean_mastery: Option<f64>,
}

pub struct ReviewService<S> {
    store: S,
    config: SchedulerConfig,
}

impl<S: ScheduleStore> ReviewService<S> {
    pub fn new(store: S, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Creates the schedule row on first exposure. Existing rows come back untouched.
    pub fn discover(
        &self,
        learner_id: &LearnerId,
        term_id: &TermId,
        now: DateTime<Utc>,
    ) -> Result<ScheduleState> {
        let key = ScheduleKey::new(learner_id.clone(), term_id.clone());
        let fresh = ScheduleState::discovered(key, store_precision(now), self.config.discovery_due);
        let (stored, inserted) = self.store.insert_if_absent(fresh)?;
        if inserted {
            tracing::info!(learner = %learner_id, term = %term_id, "term discovered");
        }
        Ok(stored.value)
    }

    pub fn submit_review(
        &self,
        learner_id: &LearnerId,
        term_id: &TermId,
        quality: Quality,
        now: DateTime<Utc>,
    ) -> Result<ScheduleState> {
        let key = ScheduleKey::new(learner_id.clone(), term_id.clone());
        self.apply(&key, Review::from_quality(quality), now)
    }

    /// Derives quality from the raw outcome first. Mastery follows
    /// `outcome.correct` rather than the derived grade.
    pub fn submit_outcome(
        &self,
        learner_id: &LearnerId,
        term_id: &TermId,
        outcome: &ExerciseOutcome,
        now: DateTime<Utc>,
    ) -> Result<ScheduleState> {
        let review = Review {
            quality: derive_quality(outcome)?,
            correct: outcome.correct,
        };
        let key = ScheduleKey::new(learner_id.clone(), term_id.clone());
        self.apply(&key, review, now)
    }

    /// Applies one dampened quality to every term a composite exercise touched.
    /// All terms are checked for existence before the first write.
    pub fn submit_composite_outcome(
        &self,
        learner_id: &LearnerId,
        term_ids: &[TermId],
        outcome: &ExerciseOutcome,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduleState>> {
        let review = Review {
            quality: derive_quality(outcome)?,
            correct: outcome.correct,
        };
        if term_ids.is_empty() {
            return Err(ValidationError::NoTerms.into());
        }

        let mut keys: Vec<ScheduleKey> = Vec::with_capacity(term_ids.len());
        for term_id in term_ids {
            let key = ScheduleKey::new(learner_id.clone(), term_id.clone());
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        if !self.config.implicit_discovery {
            for key in &keys {
                if self.store.load(key)?.is_none() {
                    return Err(not_found(key));
                }
            }
        }

        keys.iter().map(|key| self.apply(key, review, now)).collect()
    }

    pub fn list_due(
        &self,
        learner_id: &LearnerId,
        limit: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduleState>> {
        let limit = limit.unwrap_or(self.config.default_due_limit);
        if limit == 0 {
            return Err(ValidationError::ZeroLimit.into());
        }
        self.store.due_for_learner(learner_id, now, limit)
    }

    pub fn stats(&self, learner_id: &LearnerId, now: DateTime<Utc>) -> Result<LearnerStats> {
        let states = self.store.states_for_learner(learner_id)?;
        let count = states.len();
        let mean = |total: f64| (count > 0).then(|| total / count as f64);

        Ok(LearnerStats {
            discovered: count,
            due: states.iter().filter(|s| s.is_due(now)).count(),
            reviewed: states.iter().filter(|s| s.last_reviewed_at.is_some()).count(),
            mean_ease_factor: mean(states.iter().map(|s| s.ease_factor).sum()),
            mean_mastery: mean(states.iter().map(|s| f64::from(s.mastery_level)).sum()),
        })
    }

    fn apply(&self, key: &ScheduleKey, review: Review, now: DateTime<Utc>) -> Result<ScheduleState> {
        let now = store_precision(now);
        let mut attempts = 0;
        loop {
            attempts += 1;

            let row = match self.store.load(key)? {
                Some(row) => row,
                None if self.config.implicit_discovery => {
                    tracing::info!(key = %key, "discovering term on first review");
                    let fresh =
                        ScheduleState::discovered(key.clone(), now, self.config.discovery_due);
                    self.store.insert_if_absent(fresh)?.0
                }
                None => return Err(not_found(key)),
            };

            let next = schedule_review(&row.value, review, now)?;
            match self.store.compare_and_swap(row.version, &next) {
                Ok(version) => {
                    tracing::debug!(
                        key = %key,
                        quality = %review.quality,
                        old_interval = row.value.interval_days,
                        new_interval = next.interval_days,
                        ease_factor = next.ease_factor,
                        version,
                        "review applied"
                    );
                    return Ok(next);
                }
                Err(SchedulerError::Conflict { .. }) if attempts <= self.config.max_conflict_retries => {
                    tracing::warn!(key = %key, attempts, "schedule state changed underneath review, retrying");
                }
                Err(SchedulerError::Conflict {
                    learner_id,
                    term_id,
                    ..
                }) => {
                    return Err(SchedulerError::Conflict {
                        learner_id,
                        term_id,
                        attempts,
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn not_found(key: &ScheduleKey) -> SchedulerError {
    SchedulerError::NotFound {
        learner_id: key.learner_id.clone(),
        term_id: key.term_id.clone(),
    }
}
