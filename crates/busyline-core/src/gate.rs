#![forbid(unsafe_code)]

//! Debounce state machine for the busy signal.
//!
//! A [`TimingGate`] turns the raw pending/settled stream from the source-set
//! tracker into a flicker-free boolean:
//!
//! - **delay**: the signal only turns true once pending state has persisted
//!   longer than `delay` (no flash for operations faster than the delay).
//! - **min_duration**: once shown, the signal stays true for at least
//!   `min_duration` after the work settles (no off-and-on flicker for fast
//!   back-to-back operations).
//!
//! Both durations default to zero, degenerating to an immediate 1:1 mirror
//! of the raw pending signal.
//!
//! The gate is poll-driven: it arms at most one deadline at a time and the
//! owner pumps [`poll`](TimingGate::poll) (cooperative single-threaded
//! model). [`next_deadline`](TimingGate::next_deadline) exposes the armed
//! deadline so hosts can sleep precisely instead of busy-looping.
//!
//! # Invariants
//!
//! 1. A deadline is armed iff the state is `PendingBelowDelay` or
//!    `HoldingMinDuration`; every exit path disarms it.
//! 2. The emitted signal flips strictly alternate (never two equal
//!    emissions in a row).
//! 3. With both durations zero, emissions mirror the pending/settled events
//!    exactly.

use tracing::debug;
use web_time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Gate state. The signal is true iff the state is `Shown` or
/// `HoldingMinDuration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Nothing pending, nothing shown.
    Idle,
    /// Work is pending but the delay timer has not fired yet.
    PendingBelowDelay,
    /// The indicator is shown and work is still pending.
    Shown,
    /// Work settled but the minimum visible duration has not elapsed.
    HoldingMinDuration,
}

/// Start-delay + minimum-visible-duration debouncer.
#[derive(Debug)]
pub struct TimingGate {
    delay: Duration,
    min_duration: Duration,
    state: GateState,
    /// The single armed timer: delay deadline while `PendingBelowDelay`,
    /// hold deadline while `HoldingMinDuration`.
    deadline: Option<Instant>,
}

impl Default for TimingGate {
    /// A gate with zero durations: a pure mirror of the pending signal.
    fn default() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

// ---------------------------------------------------------------------------
// Implementation
// ---------------------------------------------------------------------------

impl TimingGate {
    /// Create a gate with the given debounce durations.
    #[must_use]
    pub fn new(delay: Duration, min_duration: Duration) -> Self {
        Self {
            delay,
            min_duration,
            state: GateState::Idle,
            deadline: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> GateState {
        self.state
    }

    /// Whether the busy signal is currently true.
    #[must_use]
    pub fn is_shown(&self) -> bool {
        matches!(
            self.state,
            GateState::Shown | GateState::HoldingMinDuration
        )
    }

    /// The armed timer deadline, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Raw pending event from the tracker. Returns the signal flip to emit,
    /// if any.
    pub fn note_pending(&mut self, now: Instant) -> Option<bool> {
        match self.state {
            GateState::Idle => {
                if self.delay.is_zero() {
                    self.transition(GateState::Shown, None);
                    Some(true)
                } else {
                    self.transition(GateState::PendingBelowDelay, Some(now + self.delay));
                    None
                }
            }
            // Delay timer already armed, or already visible.
            GateState::PendingBelowDelay | GateState::Shown => None,
            GateState::HoldingMinDuration => {
                // Re-pending before the hold elapsed: stay visible.
                self.transition(GateState::Shown, None);
                None
            }
        }
    }

    /// Raw settled event from the tracker. Returns the signal flip to emit,
    /// if any.
    pub fn note_settled(&mut self, now: Instant) -> Option<bool> {
        match self.state {
            GateState::Idle | GateState::HoldingMinDuration => None,
            GateState::PendingBelowDelay => {
                // Finished under the delay threshold: never shown.
                self.transition(GateState::Idle, None);
                None
            }
            GateState::Shown => {
                if self.min_duration.is_zero() {
                    self.transition(GateState::Idle, None);
                    Some(false)
                } else {
                    self.transition(
                        GateState::HoldingMinDuration,
                        Some(now + self.min_duration),
                    );
                    None
                }
            }
        }
    }

    /// Fire the armed timer if its deadline has passed. Returns the signal
    /// flip to emit, if any.
    pub fn poll(&mut self, now: Instant) -> Option<bool> {
        let due = match self.deadline {
            Some(deadline) => now >= deadline,
            None => false,
        };
        if !due {
            return None;
        }
        match self.state {
            GateState::PendingBelowDelay => {
                self.transition(GateState::Shown, None);
                Some(true)
            }
            GateState::HoldingMinDuration => {
                self.transition(GateState::Idle, None);
                Some(false)
            }
            // Invariant 1: a deadline is never armed in these states.
            GateState::Idle | GateState::Shown => {
                debug_assert!(false, "deadline armed in {:?}", self.state);
                self.deadline = None;
                None
            }
        }
    }

    /// Disarm any timer and return to `Idle`. The owner is responsible for
    /// emitting the resulting signal value.
    pub fn reset(&mut self) {
        self.transition(GateState::Idle, None);
    }

    fn transition(&mut self, next: GateState, deadline: Option<Instant>) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "gate transition");
        }
        self.state = next;
        self.deadline = deadline;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
