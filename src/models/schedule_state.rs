//! Per learner/term spaced-repetition state.
//!
//! A `ScheduleState` is created once when a learner first meets a term and is
//! afterwards only replaced by the output of [`crate::models::sm2::schedule`].
//! Invariants held after every transition:
//! - `ease_factor >= 1.3`
//! - `interval_days >= 1`
//! - `next_review_at == last_reviewed_at + interval_days` once reviewed
//! - `mastery_level` within 0..=100

use super::{LearnerId, ScheduleKey, TermId};
use crate::error::ValidationError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;
/// Hundred-year ceiling keeps `now + interval` inside the timestamp range.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;
pub const MASTERY_MAX: u8 = 100;
pub const MASTERY_CORRECT_STEP: u8 = 10;
pub const MASTERY_INCORRECT_STEP: u8 = 5;

/// Whether a freshly discovered term is due right away.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryDue {
    /// `next_review_at = now`, so the term shows up in the next due query.
    #[default]
    Immediate,
    /// `next_review_at` stays empty until the first explicit review.
    AfterFirstReview,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleState {
    pub learner_id: LearnerId,
    pub term_id: TermId,
    pub repetitions: u32,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub next_review_at: Option<DateTime<Utc>>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub times_correct: u32,
    pub times_incorrect: u32,
    pub mastery_level: u8,
}

impl ScheduleState {
    /// Initial state for a term the learner has just been exposed to.
    pub fn discovered(key: ScheduleKey, now: DateTime<Utc>, policy: DiscoveryDue) -> Self {
        let next_review_at = match policy {
            DiscoveryDue::Immediate => Some(now),
            DiscoveryDue::AfterFirstReview => None,
        };

        Self {
            learner_id: key.learner_id,
            term_id: key.term_id,
            repetitions: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            interval_days: 1,
            next_review_at,
            last_reviewed_at: None,
            times_correct: 0,
            times_incorrect: 0,
            mastery_level: 0,
        }
    }

    pub fn key(&self) -> ScheduleKey {
        ScheduleKey::new(self.learner_id.clone(), self.term_id.clone())
    }

    /// Never-scheduled states are not due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at.is_some_and(|at| at <= now)
    }

    /// Reports the first broken invariant, if any.
    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        let broken = |reason: String| ValidationError::Invariant {
            term_id: self.term_id.clone(),
            reason,
        };

        if !self.ease_factor.is_finite() || self.ease_factor < MIN_EASE_FACTOR {
            return Err(broken(format!(
                "ease factor {} below {}",
                self.ease_factor, MIN_EASE_FACTOR
            )));
        }
        if self.interval_days < 1 {
            return Err(broken("interval must be at least one day".to_string()));
        }
        if self.mastery_level > MASTERY_MAX {
            return Err(broken(format!(
                "mastery level {} above {}",
                self.mastery_level, MASTERY_MAX
            )));
        }
        if let Some(last) = self.last_reviewed_at {
            let expected = last.checked_add_signed(Duration::days(i64::from(self.interval_days)));
            if expected.is_none() || self.next_review_at != expected {
                return Err(broken(
                    "next review is not last review plus interval".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Display-only mastery accumulator, kept apart from the SM-2 fields.
pub fn apply_mastery(level: u8, correct: bool) -> u8 {
    if correct {
        level.saturating_add(MASTERY_CORRECT_STEP).min(MASTERY_MAX)
    } else {
        level.saturating_sub(MASTERY_INCORRECT_STEP)
    }
}
