#![forbid(unsafe_code)]

//! Aggregate pending state over a replaceable set of async sources.
//!
//! A [`SourceSetTracker`] owns zero or more claimed sources and a pending
//! counter. Each settle event decrements the counter; when it reaches zero
//! the aggregate transitions to settled exactly once and fires
//! `on_change(false)`. An empty set starts and stays settled and never
//! fires.
//!
//! Re-tracking replaces the live set: every still-pending member of the
//! previous set is cancelled *before* the new set is observed, and a session
//! counter additionally discards any stale settle event that leaks through.
//!
//! # Invariants
//!
//! 1. Aggregate state is pending iff at least one member is pending.
//! 2. `on_change(false)` fires at most once per tracking session.
//! 3. Settle events from a superseded session never touch the counter.
//! 4. Two sources settling back-to-back produce two ordered decrements.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::error::Result;
use crate::source::{BusySource, TrackedSource};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

struct TrackerInner {
    sources: Vec<TrackedSource>,
    pending: usize,
    /// Bumped on every `track` call; settle observers compare against it.
    session: u64,
    on_change: Option<Box<dyn FnMut(bool)>>,
}

/// Live aggregate pending/settled state over a set of sources.
pub struct SourceSetTracker {
    inner: Rc<RefCell<TrackerInner>>,
}

impl std::fmt::Debug for SourceSetTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("SourceSetTracker")
            .field("sources", &inner.sources.len())
            .field("pending", &inner.pending)
            .field("session", &inner.session)
            .finish()
    }
}

impl Default for SourceSetTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Implementation
// ---------------------------------------------------------------------------

impl SourceSetTracker {
    /// Create a tracker with an empty (permanently settled) set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(TrackerInner {
                sources: Vec::new(),
                pending: 0,
                session: 0,
                on_change: None,
            })),
        }
    }

    /// Install the aggregate-settle callback. Fired with `false` when the
    /// pending counter of the current session reaches zero.
    pub fn on_change(&self, callback: impl FnMut(bool) + 'static) {
        self.inner.borrow_mut().on_change = Some(Box::new(callback));
    }

    /// Replace the tracked set.
    ///
    /// Still-pending members of the previous set are cancelled first, then
    /// each new source is claimed with a settle observer. On a claim failure
    /// the set is left empty (fail closed) and the error is returned.
    pub fn track(&self, sources: &[BusySource]) -> Result<()> {
        let session = self.clear();

        let mut claimed = Vec::with_capacity(sources.len());
        for source in sources {
            let weak = Rc::downgrade(&self.inner);
            let observer = Box::new(move || on_source_settled(&weak, session));
            match TrackedSource::claim(source, observer) {
                Ok(tracked) => claimed.push(tracked),
                Err(err) => {
                    for tracked in &claimed {
                        tracked.cancel();
                    }
                    return Err(err);
                }
            }
        }

        let mut inner = self.inner.borrow_mut();
        inner.pending = claimed.iter().filter(|t| t.is_armed()).count();
        debug!(
            session,
            sources = claimed.len(),
            pending = inner.pending,
            "tracking new source set"
        );
        inner.sources = claimed;
        Ok(())
    }

    /// Cancel the current set and leave the tracker empty (settled).
    ///
    /// Returns the new session id.
    pub fn clear(&self) -> u64 {
        let mut inner = self.inner.borrow_mut();
        for tracked in inner.sources.drain(..) {
            tracked.cancel();
        }
        inner.pending = 0;
        inner.session += 1;
        inner.session
    }

    /// Whether at least one member of the current set is still pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.borrow().pending > 0
    }

    /// Number of still-pending members.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.borrow().pending
    }

    /// Number of sources in the current set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().sources.len()
    }

    /// Whether the current set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().sources.is_empty()
    }
}

/// Settle observer body: decrement the session's counter, fire `on_change`
/// once at zero. The callback runs outside the borrow so it may re-enter the
/// tracker.
fn on_source_settled(weak: &Weak<RefCell<TrackerInner>>, session: u64) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let callback = {
        let mut inner = inner.borrow_mut();
        if inner.session != session {
            trace!(session, current = inner.session, "stale settle ignored");
            return;
        }
        inner.pending = inner.pending.saturating_sub(1);
        trace!(session, pending = inner.pending, "source settled");
        if inner.pending == 0 {
            inner.on_change.take()
        } else {
            None
        }
    };
    if let Some(mut callback) = callback {
        callback(false);
        let mut inner = inner.borrow_mut();
        if inner.on_change.is_none() {
            inner.on_change = Some(callback);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SourceState, deferred, subscription};
    use std::cell::Cell;

    fn settle_log(tracker: &SourceSetTracker) -> Rc<Cell<u32>> {
        let fired = Rc::new(Cell::new(0u32));
        let log = Rc::clone(&fired);
        tracker.on_change(move |busy| {
            assert!(!busy, "tracker only ever reports aggregate settle");
            log.set(log.get() + 1);
        });
        fired
    }

    #[test]
    fn empty_set_is_settled_and_silent() {
        let tracker = SourceSetTracker::new();
        let fired = settle_log(&tracker);
        tracker.track(&[]).unwrap();
        assert!(!tracker.is_pending());
        assert!(tracker.is_empty());
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn single_source_settles_aggregate() {
        let tracker = SourceSetTracker::new();
        let fired = settle_log(&tracker);
        let (source, handle) = deferred();
        tracker.track(&[source]).unwrap();
        assert!(tracker.is_pending());

        handle.resolve();
        assert!(!tracker.is_pending());
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn aggregate_waits_for_slowest_member() {
        let tracker = SourceSetTracker::new();
        let fired = settle_log(&tracker);
        let (fast, fast_handle) = deferred();
        let (slow, slow_handle) = subscription();
        tracker.track(&[fast, slow]).unwrap();
        assert_eq!(tracker.pending_count(), 2);

        fast_handle.resolve();
        assert!(tracker.is_pending(), "one member still pending");
        assert_eq!(fired.get(), 0);

        slow_handle.complete();
        assert!(!tracker.is_pending());
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn on_change_fires_exactly_once_per_session() {
        let tracker = SourceSetTracker::new();
        let fired = settle_log(&tracker);
        let (source, handle) = deferred();
        tracker.track(&[source]).unwrap();
        handle.resolve();
        handle.resolve();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn retrack_cancels_previous_set() {
        let tracker = SourceSetTracker::new();
        let fired = settle_log(&tracker);
        let (old, old_handle) = subscription();
        tracker.track(&[old]).unwrap();

        let (new, _new_handle) = deferred();
        tracker.track(&[new]).unwrap();
        assert!(old_handle.is_cancelled(), "subscription unsubscribed on retrack");
        assert!(tracker.is_pending());

        // A leaked settle from the old session must not touch the counter.
        old_handle.complete();
        assert!(tracker.is_pending());
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn stale_deferred_settle_is_ignored() {
        let tracker = SourceSetTracker::new();
        let fired = settle_log(&tracker);
        let (old, old_handle) = deferred();
        tracker.track(&[old]).unwrap();
        tracker.track(&[]).unwrap();

        // Deferred cancel is best-effort; the operation still finishes.
        old_handle.resolve();
        assert!(!tracker.is_pending());
        assert_eq!(fired.get(), 0, "empty session never fires");
    }

    #[test]
    fn two_settles_are_two_ordered_decrements() {
        let tracker = SourceSetTracker::new();
        let (a, a_handle) = deferred();
        let (b, b_handle) = deferred();
        tracker.track(&[a, b]).unwrap();
        assert_eq!(tracker.pending_count(), 2);
        a_handle.resolve();
        assert_eq!(tracker.pending_count(), 1);
        b_handle.resolve();
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn already_settled_source_does_not_count() {
        let tracker = SourceSetTracker::new();
        let fired = settle_log(&tracker);
        let (done, done_handle) = deferred();
        done_handle.resolve();
        let (live, live_handle) = deferred();
        tracker.track(&[done, live]).unwrap();
        assert_eq!(tracker.pending_count(), 1);
        live_handle.resolve();
        assert!(!tracker.is_pending());
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn all_settled_set_starts_settled() {
        let tracker = SourceSetTracker::new();
        let fired = settle_log(&tracker);
        let (done, handle) = deferred();
        handle.resolve();
        tracker.track(&[done]).unwrap();
        assert!(!tracker.is_pending());
        assert_eq!(fired.get(), 0, "settle-at-track never fires on_change");
    }

    #[test]
    fn claim_failure_leaves_set_empty() {
        let tracker = SourceSetTracker::new();
        let other = SourceSetTracker::new();
        let (contested, _handle) = deferred();
        other.track(&[contested.clone()]).unwrap();

        let (innocent, innocent_handle) = subscription();
        let err = tracker.track(&[innocent, contested]);
        assert!(err.is_err());
        assert!(tracker.is_empty());
        assert!(!tracker.is_pending());
        // The partially-claimed member was released again.
        assert!(innocent_handle.is_cancelled());
    }

    #[test]
    fn clear_cancels_and_settles() {
        let tracker = SourceSetTracker::new();
        let (source, handle) = subscription();
        tracker.track(&[source.clone()]).unwrap();
        tracker.clear();
        assert!(!tracker.is_pending());
        assert!(handle.is_cancelled());
        assert_eq!(source.state(), SourceState::Cancelled);
    }

    #[test]
    fn callback_may_retrack_reentrantly() {
        let tracker = SourceSetTracker::new();
        let inner = SourceSetTracker::new();
        let (next, _next_handle) = deferred();
        let next_for_cb = next.clone();
        let inner_for_cb = SourceSetTracker {
            inner: Rc::clone(&inner.inner),
        };
        tracker.on_change(move |_| {
            inner_for_cb.track(&[next_for_cb.clone()]).unwrap();
        });

        let (source, handle) = deferred();
        tracker.track(&[source]).unwrap();
        handle.resolve();
        assert!(inner.is_pending());
    }

    #[test]
    fn debug_format() {
        let tracker = SourceSetTracker::new();
        let dbg = format!("{tracker:?}");
        assert!(dbg.contains("SourceSetTracker"));
        assert!(dbg.contains("pending"));
    }
}
