//! Recall quality and its derivation from raw exercise outcomes.
//!
//! Derivation runs in two stages. The outcome is first classified on its own
//! (correctness, partial credit, hints, speed), then composite exercises are
//! dampened by how much of the exercise was completed. Both single-term and
//! multi-term exercises end up on the same 0..=5 scale the scheduler reads.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Answers faster than this count as instant recall (or a quick guess).
pub const FAST_RESPONSE_MS: i64 = 1500;
pub const STEADY_RESPONSE_MS: i64 = 3000;
pub const SLOW_RESPONSE_MS: i64 = 5000;
/// Partial scores at or above this still count as good recall.
pub const HIGH_PARTIAL_SCORE: f64 = 0.85;

/// SM-2 recall grade: 0 = blackout, 5 = perfect instant recall.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Quality(u8);

impl Quality {
    pub const MAX: u8 = 5;
    pub const PASSING: u8 = 3;

    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if value > Self::MAX {
            return Err(ValidationError::QualityOutOfRange(i64::from(value)));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Grades of 3 and above keep the learning streak alive.
    pub fn is_passing(self) -> bool {
        self.0 >= Self::PASSING
    }
}

impl TryFrom<u8> for Quality {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Quality::new(value)
    }
}

impl TryFrom<i64> for Quality {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= Self::MAX)
            .map(Quality)
            .ok_or(ValidationError::QualityOutOfRange(value))
    }
}

impl From<Quality> for u8 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    Flashcard,
    MultipleChoice,
    TypedAnswer,
    ImageLabel,
    /// Pair terms with their translations.
    Matching,
    /// Drop terms into categories.
    Sorting,
    /// Questions about a passage that uses several terms.
    Comprehension,
}

impl ExerciseKind {
    /// Composite exercises cover several terms at once.
    pub fn is_composite(self) -> bool {
        matches!(
            self,
            ExerciseKind::Matching | ExerciseKind::Sorting | ExerciseKind::Comprehension
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ExerciseKind::Flashcard => "flashcard",
            ExerciseKind::MultipleChoice => "multiple_choice",
            ExerciseKind::TypedAnswer => "typed_answer",
            ExerciseKind::ImageLabel => "image_label",
            ExerciseKind::Matching => "matching",
            ExerciseKind::Sorting => "sorting",
            ExerciseKind::Comprehension => "comprehension",
        }
    }
}

/// Sub-items finished in a composite exercise, e.g. matched pairs out of all pairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeProgress {
    pub completed: i64,
    pub total: i64,
}

impl CompositeProgress {
    pub fn new(completed: i64, total: i64) -> Self {
        Self { completed, total }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.total <= 0 {
            return Err(ValidationError::NonPositiveTotal(self.total));
        }
        if self.completed < 0 || self.completed > self.total {
            return Err(ValidationError::CompletedExceedsTotal {
                completed: self.completed,
                total: self.total,
            });
        }
        Ok(())
    }

    /// Caps `base` by completion ratio. Integer comparisons keep the
    /// 0.75 and 0.5 thresholds exact.
    fn dampen(&self, base: u8) -> u8 {
        let (done, total) = (self.completed, self.total);
        if done == total {
            base
        } else if 4 * done >= 3 * total {
            base.min(4)
        } else if 2 * done >= total {
            3
        } else {
            2
        }
    }
}

/// Raw result of one exercise attempt, as reported by the exercise UI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseOutcome {
    pub correct: bool,
    /// Fraction of the answer that was right, 1.0 = fully correct.
    pub score: f64,
    #[serde(default)]
    pub time_taken_ms: Option<i64>,
    #[serde(default)]
    pub hints_used: Option<i64>,
    pub kind: ExerciseKind,
    #[serde(default)]
    pub progress: Option<CompositeProgress>,
}

impl ExerciseOutcome {
    pub fn single(kind: ExerciseKind, correct: bool, score: f64) -> Self {
        Self {
            correct,
            score,
            time_taken_ms: None,
            hints_used: None,
            kind,
            progress: None,
        }
    }

    pub fn composite(
        kind: ExerciseKind,
        correct: bool,
        score: f64,
        completed: i64,
        total: i64,
    ) -> Self {
        Self {
            progress: Some(CompositeProgress::new(completed, total)),
            ..Self::single(kind, correct, score)
        }
    }

    pub fn with_time(mut self, ms: i64) -> Self {
        self.time_taken_ms = Some(ms);
        self
    }

    pub fn with_hints(mut self, hints: i64) -> Self {
        self.hints_used = Some(hints);
        self
    }

    /// Parses caller-supplied JSON. Malformed input is a validation failure,
    /// not a storage one.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json).map_err(|err| ValidationError::MalformedOutcome(err.to_string()))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.score.is_finite() || !(0.0..=1.0).contains(&self.score) {
            return Err(ValidationError::ScoreOutOfRange(self.score));
        }
        if let Some(ms) = self.time_taken_ms.filter(|ms| *ms < 0) {
            return Err(ValidationError::NegativeTime(ms));
        }
        if let Some(hints) = self.hints_used.filter(|h| *h < 0) {
            return Err(ValidationError::NegativeHints(hints));
        }
        match (self.kind.is_composite(), &self.progress) {
            (true, Some(progress)) => progress.validate(),
            (true, None) => Err(ValidationError::MissingCompositeProgress(
                self.kind.name().to_string(),
            )),
            (false, Some(_)) => Err(ValidationError::UnexpectedCompositeProgress(
                self.kind.name().to_string(),
            )),
            (false, None) => Ok(()),
        }
    }
}

/// Classifies the outcome itself, first matching rule wins.
fn base_quality(outcome: &ExerciseOutcome) -> u8 {
    let fast = |limit: i64| outcome.time_taken_ms.is_some_and(|ms| ms < limit);

    if !outcome.correct {
        return if outcome.score > 0.0 && outcome.score < 1.0 {
            2
        } else if fast(FAST_RESPONSE_MS) {
            1
        } else {
            0
        };
    }

    if outcome.hints_used.is_some_and(|h| h > 0) {
        return 3;
    }
    if outcome.score < 1.0 {
        return if outcome.score >= HIGH_PARTIAL_SCORE { 4 } else { 3 };
    }
    match outcome.time_taken_ms {
        None => 4,
        Some(_) if fast(FAST_RESPONSE_MS) => 5,
        Some(_) if fast(STEADY_RESPONSE_MS) => 4,
        // Slow but correct never drops below 3.
        Some(_) => 3,
    }
}

/// Turns a raw exercise outcome into the quality grade the scheduler consumes.
pub fn derive_quality(outcome: &ExerciseOutcome) -> Result<Quality, ValidationError> {
    outcome.validate()?;

    let base = base_quality(outcome);
    let value = match (&outcome.progress, outcome.kind.is_composite()) {
        (Some(progress), true) => progress.dampen(base),
        _ => base,
    };
    Quality::new(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ExerciseKind::*;

    fn q(outcome: ExerciseOutcome) -> u8 {
        derive_quality(&outcome).unwrap().value()
    }

    #[test]
    fn test_quality_range() {
        assert!(Quality::new(5).is_ok());
        assert_eq!(Quality::new(6), Err(ValidationError::QualityOutOfRange(6)));
        assert!(Quality::try_from(-1i64).is_err());
        assert!(Quality::try_from(300i64).is_err());
        assert!(Quality::new(3).unwrap().is_passing());
        assert!(!Quality::new(2).unwrap().is_passing());
    }

    #[test]
    fn test_quality_deserialize_rejects_out_of_range() {
        let ok: Quality = serde_json::from_str("4").unwrap();
        assert_eq!(ok.value(), 4);
        assert!(serde_json::from_str::<Quality>("7").is_err());
        assert!(serde_json::from_str::<Quality>("-2").is_err());
    }

    #[test]
    fn test_fast_perfect_answer_is_five() {
        assert_eq!(q(ExerciseOutcome::single(Flashcard, true, 1.0).with_time(1000)), 5);
    }

    #[test]
    fn test_slow_perfect_answer_is_three() {
        assert_eq!(q(ExerciseOutcome::single(Flashcard, true, 1.0).with_time(4000)), 3);
        assert_eq!(q(ExerciseOutcome::single(Flashcard, true, 1.0).with_time(60_000)), 3);
    }

    #[test]
    fn test_timing_bands() {
        assert_eq!(q(ExerciseOutcome::single(TypedAnswer, true, 1.0).with_time(1499)), 5);
        assert_eq!(q(ExerciseOutcome::single(TypedAnswer, true, 1.0).with_time(1500)), 4);
        assert_eq!(q(ExerciseOutcome::single(TypedAnswer, true, 1.0).with_time(2999)), 4);
        assert_eq!(q(ExerciseOutcome::single(TypedAnswer, true, 1.0).with_time(3000)), 3);
    }

    #[test]
    fn test_untimed_perfect_answer_is_four() {
        assert_eq!(q(ExerciseOutcome::single(MultipleChoice, true, 1.0)), 4);
    }

    #[test]
    fn test_incorrect_partial_credit_is_two() {
        assert_eq!(q(ExerciseOutcome::single(TypedAnswer, false, 0.4)), 2);
        // Partial credit wins over a fast wrong guess.
        assert_eq!(q(ExerciseOutcome::single(TypedAnswer, false, 0.4).with_time(200)), 2);
    }

    #[test]
    fn test_incorrect_fast_and_slow() {
        assert_eq!(q(ExerciseOutcome::single(MultipleChoice, false, 0.0).with_time(800)), 1);
        assert_eq!(q(ExerciseOutcome::single(MultipleChoice, false, 0.0).with_time(2000)), 0);
        assert_eq!(q(ExerciseOutcome::single(MultipleChoice, false, 0.0)), 0);
    }

    #[test]
    fn test_hints_cap_at_three() {
        let outcome = ExerciseOutcome::single(ImageLabel, true, 1.0)
            .with_time(500)
            .with_hints(1);
        assert_eq!(q(outcome), 3);
        let no_hints = ExerciseOutcome::single(ImageLabel, true, 1.0)
            .with_time(500)
            .with_hints(0);
        assert_eq!(q(no_hints), 5);
    }

    #[test]
    fn test_correct_imperfect_score() {
        assert_eq!(q(ExerciseOutcome::single(TypedAnswer, true, 0.9)), 4);
        assert_eq!(q(ExerciseOutcome::single(TypedAnswer, true, 0.85)), 4);
        assert_eq!(q(ExerciseOutcome::single(TypedAnswer, true, 0.6).with_time(100)), 3);
    }

    #[test]
    fn test_composite_dampening() {
        let full = ExerciseOutcome::composite(Matching, true, 1.0, 8, 8).with_time(1000);
        assert_eq!(q(full), 5);

        let most = ExerciseOutcome::composite(Matching, true, 1.0, 6, 8).with_time(1000);
        assert_eq!(q(most), 4);

        let half = ExerciseOutcome::composite(Sorting, true, 1.0, 4, 8).with_time(1000);
        assert_eq!(q(half), 3);

        let few = ExerciseOutcome::composite(Comprehension, true, 1.0, 3, 8).with_time(1000);
        assert_eq!(q(few), 2);
    }

    #[test]
    fn test_composite_dampening_can_raise_low_base() {
        // Ratio bands assign a fixed grade regardless of a failing base.
        let outcome = ExerciseOutcome::composite(Sorting, false, 0.0, 5, 8);
        assert_eq!(q(outcome), 3);
    }

    #[test]
    fn test_validation_errors() {
        let bad_score = ExerciseOutcome::single(Flashcard, true, 1.2);
        assert_eq!(
            derive_quality(&bad_score),
            Err(ValidationError::ScoreOutOfRange(1.2))
        );

        let nan = ExerciseOutcome::single(Flashcard, true, f64::NAN);
        assert!(matches!(
            derive_quality(&nan),
            Err(ValidationError::ScoreOutOfRange(_))
        ));

        let negative_time = ExerciseOutcome::single(Flashcard, true, 1.0).with_time(-5);
        assert_eq!(
            derive_quality(&negative_time),
            Err(ValidationError::NegativeTime(-5))
        );

        let negative_hints = ExerciseOutcome::single(Flashcard, true, 1.0).with_hints(-1);
        assert_eq!(
            derive_quality(&negative_hints),
            Err(ValidationError::NegativeHints(-1))
        );

        let zero_total = ExerciseOutcome::composite(Matching, true, 1.0, 0, 0);
        assert_eq!(
            derive_quality(&zero_total),
            Err(ValidationError::NonPositiveTotal(0))
        );

        let overflow = ExerciseOutcome::composite(Matching, true, 1.0, 9, 8);
        assert!(matches!(
            derive_quality(&overflow),
            Err(ValidationError::CompletedExceedsTotal { .. })
        ));

        let missing = ExerciseOutcome::single(Matching, true, 1.0);
        assert!(matches!(
            derive_quality(&missing),
            Err(ValidationError::MissingCompositeProgress(_))
        ));

        let unexpected = ExerciseOutcome::composite(Flashcard, true, 1.0, 1, 1);
        assert!(matches!(
            derive_quality(&unexpected),
            Err(ValidationError::UnexpectedCompositeProgress(_))
        ));
    }

    #[test]
    fn test_outcome_from_json() {
        let json = r#"{"correct": false, "score": 0.4, "kind": "typed_answer"}"#;
        let outcome: ExerciseOutcome = serde_json::from_str(json).unwrap();
        assert_eq!(q(outcome), 2);

        let json = r#"{"correct": true, "score": 1, "timeTakenMs": 900,
                       "kind": "matching", "progress": {"completed": 3, "total": 4}}"#;
        let outcome: ExerciseOutcome = serde_json::from_str(json).unwrap();
        assert_eq!(q(outcome), 4);
    }

    #[test]
    fn test_malformed_outcome_json_is_a_validation_error() {
        for json in [r#"{"correct": true"#, r#"{"correct": true, "score": 1, "kind": "essay"}"#] {
            assert!(matches!(
                ExerciseOutcome::from_json(json),
                Err(ValidationError::MalformedOutcome(_))
            ));
        }
        let outcome = ExerciseOutcome::from_json(r#"{"correct": true, "score": 1, "kind": "flashcard"}"#)
            .unwrap();
        assert_eq!(q(outcome), 4);
    }
}
