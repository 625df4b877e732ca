//! Error types shared by the scheduler, the stores and the review service.

use crate::models::{LearnerId, TermId};
use chrono::{DateTime, Utc};

/// Input rejected before any state is touched.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("quality must be an integer in 0..=5, got {0}")]
    QualityOutOfRange(i64),
    #[error("score must be within [0, 1], got {0}")]
    ScoreOutOfRange(f64),
    #[error("time taken must be non-negative, got {0} ms")]
    NegativeTime(i64),
    #[error("hints used must be non-negative, got {0}")]
    NegativeHints(i64),
    #[error("composite progress needs a positive total, got {0}")]
    NonPositiveTotal(i64),
    #[error("composite progress has {completed} completed out of {total}")]
    CompletedExceedsTotal { completed: i64, total: i64 },
    #[error("{0} exercises require composite progress")]
    MissingCompositeProgress(String),
    #[error("{0} exercises cannot carry composite progress")]
    UnexpectedCompositeProgress(String),
    #[error("composite exercise must name at least one term")]
    NoTerms,
    #[error("due limit must be positive")]
    ZeroLimit,
    #[error("no review date can be scheduled from {0}")]
    TimestampOutOfRange(DateTime<Utc>),
    #[error("invalid exercise outcome: {0}")]
    MalformedOutcome(String),
    #[error("schedule state for {term_id} breaks an invariant: {reason}")]
    Invariant { term_id: TermId, reason: String },
}

/// Failures of the persistence layer. Opaque to the scheduling domain.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Top-level error of the scheduling core.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("No schedule state for learner {learner_id}, term {term_id}")]
    NotFound { learner_id: LearnerId, term_id: TermId },
    #[error("Concurrent update of learner {learner_id}, term {term_id} after {attempts} attempt(s)")]
    Conflict {
        learner_id: LearnerId,
        term_id: TermId,
        attempts: u32,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SchedulerError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, SchedulerError::Conflict { .. })
    }
}

impl From<rusqlite::Error> for SchedulerError {
    fn from(err: rusqlite::Error) -> Self {
        SchedulerError::Storage(StorageError::Database(err))
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
