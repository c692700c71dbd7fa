//! # Streak Tracking
//!
//! Consecutive-day activity counting applied on completion.
//!
//! Day arithmetic is integer epoch-day (UTC). Same-day repeats keep the
//! streak; the next day extends it; any gap resets to 1.

use crate::types::Timestamp;

/// Advance a streak counter for a completion at `now`.
///
/// `streak == 0` marks a record with no prior activity; the first
/// completion always starts a streak of 1. Clock skew that makes `now`
/// precede the last activity is treated as a gap.
#[must_use]
pub fn advance(streak: u32, last_activity_at: Timestamp, now: Timestamp) -> u32 {
    if streak == 0 {
        return 1;
    }
    let last_day = last_activity_at.epoch_day();
    let today = now.epoch_day();
    if today == last_day {
        streak
    } else if today == last_day.saturating_add(1) {
        streak.saturating_add(1)
    } else {
        1
    }
}
