//! Spaced-repetition scheduling core for vocabulary learning.
//!
//! Raw exercise outcomes are graded into an SM-2 quality by
//! [`models::derive_quality`], [`models::schedule`] turns the grade into the
//! next review date, and [`service::ReviewService`] persists each transition
//! atomically per (learner, term) through a [`database::ScheduleStore`].

pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod models;
pub mod service;

pub use config::SchedulerConfig;
pub use database::{MemoryStore, ScheduleStore, SqliteStore};
pub use error::{Result, SchedulerError, StorageError, ValidationError};
pub use models::{
    ExerciseKind, ExerciseOutcome, LearnerId, Quality, ReviewSession, ScheduleState, TermId,
};
pub use service::ReviewService;
