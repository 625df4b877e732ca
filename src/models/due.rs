//! Due-set selection over already loaded schedule states.
use super::ScheduleState;
use chrono::{DateTime, Utc};

/// Returns up to `limit` states with `next_review_at <= now`, most overdue first.
/// Equal due times are ordered by term id so repeated calls agree.
pub fn select_due<I>(states: I, now: DateTime<Utc>, limit: usize) -> Vec<ScheduleState>
where
    I: IntoIterator<Item = ScheduleState>,
{
    if limit == 0 {
        return Vec::new();
    }

    let mut due: Vec<ScheduleState> = states.into_iter().filter(|s| s.is_due(now)).collect();
    due.sort_by(|a, b| {
        a.next_review_at
            .cmp(&b.next_review_at)
            .then_with(|| a.term_id.cmp(&b.term_id))
    });
    due.truncate(limit);
    due
}
