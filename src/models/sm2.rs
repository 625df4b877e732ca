//! SM-2 (SuperMemo 2) review scheduling.
//!
//! - Each term has an ease factor (EF) that is adjusted after every review, pass or fail
//! - Quality grades 0-2: repetitions reset to 0 and the term is due again in 1 day
//! - Quality grades 3-5: interval grows 1 day → 6 days → previous interval × EF
//! - EF never drops below 1.3, so repeatedly failed terms keep shorter intervals
//!   even after they start passing again
//!
//! Mastery is a separate display counter and never feeds back into EF or interval.

use super::schedule_state::{MAX_INTERVAL_DAYS, MIN_EASE_FACTOR, ScheduleState, apply_mastery};
use super::Quality;
use crate::error::ValidationError;
use chrono::{DateTime, Duration, Utc};

/// One graded review. `correct` comes from the raw outcome when there is one
/// and only drives the mastery accumulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Review {
    pub quality: Quality,
    pub correct: bool,
}

impl Review {
    pub fn from_quality(quality: Quality) -> Self {
        Self {
            quality,
            correct: quality.is_passing(),
        }
    }
}

/// EF' = max(1.3, EF + 0.1 − (5−q)·(0.08 + (5−q)·0.02))
pub fn next_ease_factor(ease_factor: f64, quality: Quality) -> f64 {
    let miss = f64::from(Quality::MAX - quality.value());
    (ease_factor + 0.1 - miss * (0.08 + miss * 0.02)).max(MIN_EASE_FACTOR)
}

/// Computes the state after a review graded `quality` at `now`.
///
/// Fails only when `now` is so close to the end of the timestamp range that
/// the next review date cannot be represented.
pub fn schedule(
    prior: &ScheduleState,
    quality: Quality,
    now: DateTime<Utc>,
) -> Result<ScheduleState, ValidationError> {
    schedule_review(prior, Review::from_quality(quality), now)
}

pub fn schedule_review(
    prior: &ScheduleState,
    review: Review,
    now: DateTime<Utc>,
) -> Result<ScheduleState, ValidationError> {
    let quality = review.quality;
    let ease_factor = next_ease_factor(prior.ease_factor, quality);

    let (interval_days, repetitions) = if quality.is_passing() {
        let interval = match prior.repetitions {
            0 => 1,
            1 => 6,
            _ => grow_interval(prior.interval_days, ease_factor),
        };
        (interval, prior.repetitions.saturating_add(1))
    } else {
        (1, 0)
    };

    let (times_correct, times_incorrect) = if quality.is_passing() {
        (prior.times_correct.saturating_add(1), prior.times_incorrect)
    } else {
        (prior.times_correct, prior.times_incorrect.saturating_add(1))
    };

    let next_review_at = now
        .checked_add_signed(Duration::days(i64::from(interval_days)))
        .ok_or(ValidationError::TimestampOutOfRange(now))?;

    Ok(ScheduleState {
        learner_id: prior.learner_id.clone(),
        term_id: prior.term_id.clone(),
        repetitions,
        ease_factor,
        interval_days,
        next_review_at: Some(next_review_at),
        last_reviewed_at: Some(now),
        times_correct,
        times_incorrect,
        mastery_level: apply_mastery(prior.mastery_level, review.correct),
    })
}

fn grow_interval(interval_days: u32, ease_factor: f64) -> u32 {
    let grown = (f64::from(interval_days) * ease_factor).round();
    // `as` saturates before the clamp.
    (grown as u32).clamp(1, MAX_INTERVAL_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiscoveryDue, ScheduleKey};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn state(repetitions: u32, ease_factor: f64, interval_days: u32) -> ScheduleState {
        let mut state = ScheduleState::discovered(
            ScheduleKey::new("ana".into(), "perro".into()),
            now(),
            DiscoveryDue::Immediate,
        );
        state.repetitions = repetitions;
        state.ease_factor = ease_factor;
        state.interval_days = interval_days;
        state
    }

    fn quality(value: u8) -> Quality {
        Quality::new(value).unwrap()
    }

    #[test]
    fn test_first_review() {
        let next = schedule(&state(0, 2.5, 1), quality(5), now()).unwrap();
        assert_eq!(next.repetitions, 1);
        assert_eq!(next.interval_days, 1);
        assert_eq!(next.last_reviewed_at, Some(now()));
        assert_eq!(next.next_review_at, Some(now() + Duration::days(1)));
    }

    #[test]
    fn test_second_review() {
        let next = schedule(&state(1, 2.5, 1), quality(4), now()).unwrap();
        assert_eq!(next.repetitions, 2);
        assert_eq!(next.interval_days, 6);
        assert_eq!(next.next_review_at, Some(now() + Duration::days(6)));
    }

    #[test]
    fn test_third_review_multiplies_by_new_ease() {
        let next = schedule(&state(2, 2.5, 6), quality(4), now()).unwrap();
        assert_eq!(next.repetitions, 3);
        // EF stays 2.5 at quality 4; 6 × 2.5 = 15
        assert_eq!(next.interval_days, 15);

        let next = schedule(&state(2, 2.5, 6), quality(5), now()).unwrap();
        // EF' = 2.6; 6 × 2.6 = 15.6 → 16
        assert_eq!(next.interval_days, 16);
    }

    #[test]
    fn test_quality_below_3_resets() {
        let next = schedule(&state(2, 2.5, 6), quality(2), now()).unwrap();
        assert_eq!(next.interval_days, 1);
        assert_eq!(next.repetitions, 0);
        // EF should still be updated
        assert!(next.ease_factor < 2.5);
        assert_eq!(next.times_incorrect, 1);
        assert_eq!(next.times_correct, 0);
    }

    #[test]
    fn test_ease_factor_formula() {
        assert!((next_ease_factor(2.5, quality(5)) - 2.6).abs() < 1e-9);
        assert!((next_ease_factor(2.5, quality(4)) - 2.5).abs() < 1e-9);
        assert!((next_ease_factor(2.5, quality(3)) - 2.36).abs() < 1e-9);
        assert!((next_ease_factor(2.5, quality(2)) - 2.18).abs() < 1e-9);
        assert!((next_ease_factor(2.5, quality(0)) - 1.7).abs() < 1e-9);
    }

    #[test]
    fn test_ef_floor() {
        let next = schedule(&state(1, 1.3, 1), quality(0), now()).unwrap();
        assert!(next.ease_factor >= MIN_EASE_FACTOR);
        assert_eq!(next.ease_factor, MIN_EASE_FACTOR);
    }

    #[test]
    fn test_failure_keeps_lowered_ease_for_later_growth() {
        let failed = schedule(&state(5, 2.5, 40), quality(0), now()).unwrap();
        let first = schedule(&failed, quality(4), now()).unwrap();
        let second = schedule(&first, quality(4), now()).unwrap();
        let third = schedule(&second, quality(4), now()).unwrap();
        assert_eq!(first.interval_days, 1);
        assert_eq!(second.interval_days, 6);
        // 6 × 1.7 = 10.2 → 10, well below the 15 an untouched EF would give
        assert_eq!(third.interval_days, 10);
    }

    #[test]
    fn test_mastery_follows_outcome_correctness() {
        let prior = state(0, 2.5, 1);
        let graded = schedule(&prior, quality(4), now()).unwrap();
        assert_eq!(graded.mastery_level, 10);

        // Correct answer dampened to a failing grade still counts for mastery.
        let review = Review {
            quality: quality(2),
            correct: true,
        };
        let next = schedule_review(&prior, review, now()).unwrap();
        assert_eq!(next.mastery_level, 10);
        assert_eq!(next.repetitions, 0);
        assert_eq!(next.times_incorrect, 1);

        let mut high = state(3, 2.5, 15);
        high.mastery_level = 2;
        assert_eq!(schedule(&high, quality(1), now()).unwrap().mastery_level, 0);
    }

    #[test]
    fn test_result_holds_invariants() {
        let mut current = state(0, 2.5, 1);
        for (i, grade) in [5u8, 4, 3, 0, 1, 5, 5, 2, 3].into_iter().enumerate() {
            let at = now() + Duration::days(i as i64 * 3);
            current = schedule(&current, quality(grade), at).unwrap();
            assert!(current.check_invariants().is_ok(), "step {i}");
        }
    }

    #[test]
    fn test_interval_is_capped() {
        let next = schedule(&state(30, 2.5, 30_000), quality(5), now()).unwrap();
        assert_eq!(next.interval_days, MAX_INTERVAL_DAYS);
        assert!(next.check_invariants().is_ok());
    }

    #[test]
    fn test_now_at_end_of_time_is_rejected() {
        let last = DateTime::<Utc>::MAX_UTC - Duration::hours(12);
        let err = schedule(&state(0, 2.5, 1), quality(5), last).unwrap_err();
        assert_eq!(err, ValidationError::TimestampOutOfRange(last));

        let err = schedule(&state(0, 2.5, 1), quality(0), DateTime::<Utc>::MAX_UTC).unwrap_err();
        assert!(matches!(err, ValidationError::TimestampOutOfRange(_)));
    }

    #[test]
    fn test_deterministic() {
        let prior = state(3, 2.1, 12);
        assert_eq!(
            schedule(&prior, quality(3), now()).unwrap(),
            schedule(&prior, quality(3), now()).unwrap()
        );
    }
}
