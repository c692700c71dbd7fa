//! # Lives Gate
//!
//! Attempt throttling via a time-bucket refill model.
//!
//! The counter is an integer state machine over `[0, MAX_LIVES]`. There is
//! no background scheduler: the refill tick is evaluated lazily on every
//! read or consume, crediting whole elapsed intervals at once. `now` is
//! captured once per invocation by the caller and threaded through, so a
//! single operation can never observe two different clocks.

use crate::primitives::{MAX_LIVES, REFILL_INTERVAL_MS};
use crate::storage::LivesStore;
use crate::types::{Timestamp, TrellisError, UserId};
use serde::{Deserialize, Serialize};

// =============================================================================
// LIVES STATE
// =============================================================================

/// Persisted per-user lives counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivesState {
    /// Remaining attempt budget, clamped to `[0, MAX_LIVES]`.
    pub lives: u8,
    /// Anchor of the refill countdown. Only meaningful below `MAX_LIVES`.
    pub last_refill_at: Timestamp,
}

impl LivesState {
    /// A fresh state with a full attempt budget.
    #[must_use]
    pub fn full(now: Timestamp) -> Self {
        Self {
            lives: MAX_LIVES,
            last_refill_at: now,
        }
    }

    /// Whether the learner may start an attempt.
    #[must_use]
    pub fn can_attempt(&self) -> bool {
        self.lives > 0
    }

    /// Derived lock flag: out of lives.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lives == 0
    }

    /// When the next life lands, while below the maximum.
    #[must_use]
    pub fn next_refill_at(&self) -> Option<Timestamp> {
        (self.lives < MAX_LIVES)
            .then(|| self.last_refill_at.saturating_add_millis(REFILL_INTERVAL_MS))
    }

    /// Apply the lazy refill rule.
    ///
    /// Credits `floor(elapsed / REFILL_INTERVAL)` lives, capped at
    /// `MAX_LIVES`, and advances `last_refill_at` by exactly the credited
    /// intervals — never to `now` — so fractional progress toward the next
    /// tick is preserved. Negative elapsed time (clock skew) counts as
    /// zero. A full counter is a no-op.
    pub fn refill_tick(&mut self, now: Timestamp) {
        if self.lives >= MAX_LIVES {
            return;
        }
        let elapsed = now.millis_since(self.last_refill_at);
        if elapsed < REFILL_INTERVAL_MS {
            return;
        }
        let intervals = elapsed / REFILL_INTERVAL_MS;
        let gained = intervals.min(i64::from(MAX_LIVES - self.lives));
        self.lives = self.lives.saturating_add(gained as u8).min(MAX_LIVES);
        self.last_refill_at = self
            .last_refill_at
            .saturating_add_millis(gained.saturating_mul(REFILL_INTERVAL_MS));
    }

    /// Consume one life on a failure event.
    ///
    /// Applies the refill tick first, then decrements; at zero this is a
    /// no-op. Consuming from a full counter anchors the countdown at the
    /// failure event — there was no countdown running while full.
    pub fn consume(&mut self, now: Timestamp) {
        self.refill_tick(now);
        if self.lives == 0 {
            return;
        }
        if self.lives == MAX_LIVES {
            self.last_refill_at = now;
        }
        self.lives -= 1;
    }

    /// Restore the full attempt budget immediately.
    pub fn force_refill(&mut self, now: Timestamp) {
        self.lives = MAX_LIVES;
        self.last_refill_at = now;
    }

    /// Snapshot for display.
    #[must_use]
    pub fn status(&self) -> LivesStatus {
        LivesStatus {
            lives: self.lives,
            locked: self.is_locked(),
            next_refill_at: self.next_refill_at(),
        }
    }
}

/// Reportable lives snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivesStatus {
    pub lives: u8,
    pub locked: bool,
    pub next_refill_at: Option<Timestamp>,
}

// =============================================================================
// LIVES GATE SERVICE
// =============================================================================

/// Per-user lives gate over a keyed store.
///
/// State is created lazily at full lives on first access. The boundary
/// calling into the progression flow checks [`LivesGate::can_attempt`]
/// before any completion is attempted.
#[derive(Debug)]
pub struct LivesGate<S: LivesStore> {
    store: S,
}

impl<S: LivesStore> LivesGate<S> {
    /// Create a gate over the given store.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn load_or_full(&self, user: UserId, now: Timestamp) -> Result<LivesState, TrellisError> {
        Ok(self
            .store
            .load_lives(user)?
            .unwrap_or_else(|| LivesState::full(now)))
    }

    /// Current lives status, after applying the lazy refill.
    ///
    /// A tick that changed the counter is persisted before returning, so a
    /// crash cannot double-credit the same interval.
    pub fn status(&mut self, user: UserId, now: Timestamp) -> Result<LivesStatus, TrellisError> {
        let mut state = self.load_or_full(user, now)?;
        let before = state;
        state.refill_tick(now);
        if state != before {
            self.store.save_lives(user, &state)?;
        }
        Ok(state.status())
    }

    /// Whether the user may start an attempt right now.
    pub fn can_attempt(&mut self, user: UserId, now: Timestamp) -> Result<bool, TrellisError> {
        Ok(!self.status(user, now)?.locked)
    }

    /// Consume one life on a failure event and persist the result.
    pub fn consume(&mut self, user: UserId, now: Timestamp) -> Result<LivesStatus, TrellisError> {
        let mut state = self.load_or_full(user, now)?;
        state.consume(now);
        self.store.save_lives(user, &state)?;
        Ok(state.status())
    }

    /// Restore the full budget and persist.
    pub fn force_refill(
        &mut self,
        user: UserId,
        now: Timestamp,
    ) -> Result<LivesStatus, TrellisError> {
        let mut state = self.load_or_full(user, now)?;
        state.force_refill(now);
        self.store.save_lives(user, &state)?;
        Ok(state.status())
    }

    /// Release the underlying store.
    #[must_use]
    pub fn into_store(self) -> S {
        self.store
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const HOUR: i64 = 60 * 60 * 1000;

    #[test]
    fn full_state_reports_no_next_refill() {
        let state = LivesState::full(Timestamp(0));
        assert_eq!(state.lives, MAX_LIVES);
        assert!(!state.is_locked());
        assert_eq!(state.next_refill_at(), None);
    }

    #[test]
    fn consume_decrements_and_locks_at_zero() {
        let mut state = LivesState::full(Timestamp(0));
        state.consume(Timestamp(1));
        state.consume(Timestamp(2));
        state.consume(Timestamp(3));
        assert_eq!(state.lives, 0);
        assert!(state.is_locked());

        // Consuming at zero is a no-op, never negative.
        state.consume(Timestamp(4));
        assert_eq!(state.lives, 0);
    }

    #[test]
    fn refill_determinism_scenario() {
        // lastRefillAt = T0, lives = 1, now = T0 + 5h, interval = 2h
        // => lives = 3 (capped at 2 consumable intervals),
        //    lastRefillAt = T0 + 4h (remainder preserved, not reset to now)
        let t0 = Timestamp(1_000_000);
        let mut state = LivesState {
            lives: 1,
            last_refill_at: t0,
        };
        state.refill_tick(t0.saturating_add_millis(5 * HOUR));
        assert_eq!(state.lives, 3);
        assert_eq!(state.last_refill_at, t0.saturating_add_millis(4 * HOUR));
    }

    #[test]
    fn refill_preserves_fractional_progress() {
        let t0 = Timestamp(0);
        let mut state = LivesState {
            lives: 0,
            last_refill_at: t0,
        };
        // 3h30m: one interval credited, 1h30m of progress carried forward.
        state.refill_tick(Timestamp(3 * HOUR + 30 * 60 * 1000));
        assert_eq!(state.lives, 1);
        assert_eq!(state.last_refill_at, Timestamp(2 * HOUR));
        // 30 more minutes completes the second interval.
        state.refill_tick(Timestamp(4 * HOUR));
        assert_eq!(state.lives, 2);
        assert_eq!(state.last_refill_at, Timestamp(4 * HOUR));
    }

    #[test]
    fn partial_interval_does_not_mutate() {
        let mut state = LivesState {
            lives: 1,
            last_refill_at: Timestamp(0),
        };
        let before = state;
        state.refill_tick(Timestamp(HOUR));
        assert_eq!(state, before);
    }

    #[test]
    fn clock_skew_counts_as_zero_elapsed() {
        let mut state = LivesState {
            lives: 1,
            last_refill_at: Timestamp(10 * HOUR),
        };
        state.refill_tick(Timestamp(0));
        assert_eq!(state.lives, 1);
        assert_eq!(state.last_refill_at, Timestamp(10 * HOUR));
    }

    #[test]
    fn consume_from_full_anchors_countdown_at_failure() {
        let mut state = LivesState::full(Timestamp(0));
        // Idle for a long time at full budget, then fail an attempt.
        let failure_at = Timestamp(100 * HOUR);
        state.consume(failure_at);
        assert_eq!(state.lives, MAX_LIVES - 1);
        assert_eq!(state.last_refill_at, failure_at);
        // The stale anchor must not refund the life instantly.
        state.refill_tick(failure_at.saturating_add_millis(HOUR));
        assert_eq!(state.lives, MAX_LIVES - 1);
    }

    #[test]
    fn consume_below_full_keeps_fractional_progress() {
        let mut state = LivesState {
            lives: 2,
            last_refill_at: Timestamp(0),
        };
        // 1h into the countdown, a failure spends a life; the countdown
        // anchor is untouched.
        state.consume(Timestamp(HOUR));
        assert_eq!(state.lives, 1);
        assert_eq!(state.last_refill_at, Timestamp(0));
    }

    #[test]
    fn force_refill_restores_full_budget() {
        let mut state = LivesState {
            lives: 0,
            last_refill_at: Timestamp(0),
        };
        state.force_refill(Timestamp(5));
        assert_eq!(state.lives, MAX_LIVES);
        assert!(!state.is_locked());
        assert_eq!(state.last_refill_at, Timestamp(5));
    }

    #[test]
    fn gate_creates_state_lazily_at_full() {
        let mut gate = LivesGate::new(MemoryStore::new());
        let status = gate.status(UserId(1), Timestamp(0)).expect("status");
        assert_eq!(status.lives, MAX_LIVES);
        assert!(!status.locked);
        assert_eq!(status.next_refill_at, None);
    }

    #[test]
    fn gate_persists_consumption_across_reads() {
        let mut gate = LivesGate::new(MemoryStore::new());
        gate.consume(UserId(1), Timestamp(0)).expect("consume");
        let status = gate.status(UserId(1), Timestamp(1)).expect("status");
        assert_eq!(status.lives, MAX_LIVES - 1);
        assert_eq!(
            status.next_refill_at,
            Some(Timestamp(REFILL_INTERVAL_MS))
        );
    }

    #[test]
    fn gate_blocks_attempts_when_empty_and_reopens_after_refill() {
        let mut gate = LivesGate::new(MemoryStore::new());
        let user = UserId(9);
        for _ in 0..3 {
            gate.consume(user, Timestamp(0)).expect("consume");
        }
        assert!(!gate.can_attempt(user, Timestamp(1)).expect("check"));

        // One interval later a life is back.
        assert!(gate
            .can_attempt(user, Timestamp(REFILL_INTERVAL_MS))
            .expect("check"));
    }
}
