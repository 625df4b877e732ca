pub mod due;
pub mod quality;
pub mod review_item;
pub mod review_session;
pub mod schedule_state;
pub mod sm2;
pub mod term;

pub use due::select_due;
pub use quality::{CompositeProgress, ExerciseKind, ExerciseOutcome, Quality, derive_quality};
pub use review_item::ReviewItem;
pub use review_session::ReviewSession;
pub use schedule_state::{DiscoveryDue, MAX_INTERVAL_DAYS, MIN_EASE_FACTOR, ScheduleState, apply_mastery};
pub use sm2::{Review, next_ease_factor, schedule, schedule_review};
pub use term::{LearnerId, ScheduleKey, TermId};
