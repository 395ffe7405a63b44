#![forbid(unsafe_code)]

//! Async source adapter: normalizes deferred values and cancellable
//! subscriptions into a uniform pending/settled lifecycle.
//!
//! A [`BusySource`] is created in a pair with a host-facing completion
//! handle:
//!
//! - [`deferred()`] — a single future value or failure, observed exactly
//!   once. Cancelling only stops the tracker from listening; the underlying
//!   operation cannot be aborted.
//! - [`subscription()`] — a cancellable source that may emit zero or more
//!   times before settling. Cancelling authoritatively unsubscribes: the host
//!   handle observes [`SubscriptionHandle::is_cancelled`] and every later
//!   event is ignored.
//!
//! [`TrackedSource::claim`] is the adapter entry point used by the tracker:
//! it installs a settle observer that fires exactly once, and fails fast if
//! the source is already claimed by another live tracking session.
//!
//! # Invariants
//!
//! 1. The settle observer is invoked at most once, and never after
//!    `cancel()`.
//! 2. `cancel()` is idempotent and never panics, including after settle.
//! 3. A rejected deferred or an erroring subscription still counts as
//!    settled (the busy state must resolve to false for failed work).
//! 4. At most one live tracking session may claim a source at a time.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::error::{BusyError, Result};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Lifecycle state of an async source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// The underlying operation has not finished.
    Pending,
    /// The operation finished (successfully or not).
    Settled,
    /// The source was unsubscribed; no further events will be observed.
    Cancelled,
}

/// Which kind of source this is, fixed at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Settles exactly once; cannot be aborted.
    Deferred,
    /// May emit before settling; can be authoritatively unsubscribed.
    Subscription,
}

/// Shared interior of a source. Single-threaded (`Rc<RefCell>`).
struct SourceCore {
    kind: SourceKind,
    state: SourceState,
    /// Settle observer for the currently claiming session, fired once.
    observer: Option<Box<dyn FnOnce()>>,
    /// Whether a live tracking session currently owns this source.
    claimed: bool,
}

impl SourceCore {
    fn new(kind: SourceKind) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            kind,
            state: SourceState::Pending,
            observer: None,
            claimed: false,
        }))
    }
}

/// Settle the source and fire the observer outside the borrow.
fn settle(core: &Rc<RefCell<SourceCore>>) {
    let observer = {
        let mut inner = core.borrow_mut();
        if inner.state != SourceState::Pending {
            return;
        }
        inner.state = SourceState::Settled;
        inner.claimed = false;
        trace!(kind = ?inner.kind, "busy source settled");
        inner.observer.take()
    };
    if let Some(notify) = observer {
        notify();
    }
}

// ---------------------------------------------------------------------------
// Public source handle
// ---------------------------------------------------------------------------

/// A trackable async source. Cloning yields another handle to the **same**
/// source.
#[derive(Clone)]
pub struct BusySource {
    core: Rc<RefCell<SourceCore>>,
}

impl std::fmt::Debug for BusySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.core.borrow();
        f.debug_struct("BusySource")
            .field("kind", &inner.kind)
            .field("state", &inner.state)
            .field("claimed", &inner.claimed)
            .finish()
    }
}

impl BusySource {
    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SourceState {
        self.core.borrow().state
    }

    /// Source kind, fixed at construction.
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        self.core.borrow().kind
    }
}

/// Create a deferred-value source and its completion handle.
#[must_use]
pub fn deferred() -> (BusySource, DeferredHandle) {
    let core = SourceCore::new(SourceKind::Deferred);
    (
        BusySource { core: Rc::clone(&core) },
        DeferredHandle { core },
    )
}

/// Create a subscription source and its emission handle.
#[must_use]
pub fn subscription() -> (BusySource, SubscriptionHandle) {
    let core = SourceCore::new(SourceKind::Subscription);
    (
        BusySource { core: Rc::clone(&core) },
        SubscriptionHandle { core },
    )
}

// ---------------------------------------------------------------------------
// Completion handles (host side)
// ---------------------------------------------------------------------------

/// Host-side handle that settles a deferred source.
pub struct DeferredHandle {
    core: Rc<RefCell<SourceCore>>,
}

impl std::fmt::Debug for DeferredHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredHandle")
            .field("state", &self.core.borrow().state)
            .finish()
    }
}

impl DeferredHandle {
    /// Settle the deferred with a value. No-op if already settled.
    pub fn resolve(&self) {
        settle(&self.core);
    }

    /// Settle the deferred with a failure. The failure itself travels on the
    /// host's error channel; for busy tracking this still counts as settled.
    pub fn reject(&self) {
        settle(&self.core);
    }
}

/// Host-side handle that drives a subscription source.
pub struct SubscriptionHandle {
    core: Rc<RefCell<SourceCore>>,
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("state", &self.core.borrow().state)
            .finish()
    }
}

impl SubscriptionHandle {
    /// Emit an intermediate value. Does not settle. Ignored once cancelled.
    pub fn emit(&self) {
        let inner = self.core.borrow();
        if inner.state == SourceState::Cancelled {
            trace!("emit on cancelled subscription ignored");
        }
    }

    /// Complete the subscription. Ignored once cancelled.
    pub fn complete(&self) {
        settle(&self.core);
    }

    /// Fail the subscription. The error travels on the host's error channel;
    /// for busy tracking this still counts as settled. Ignored once
    /// cancelled.
    pub fn error(&self) {
        settle(&self.core);
    }

    /// Whether the tracker has unsubscribed this source.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.core.borrow().state == SourceState::Cancelled
    }
}

// ---------------------------------------------------------------------------
// Tracker-side claim
// ---------------------------------------------------------------------------

/// A source claimed by one tracking session: observe-once + cancel.
pub(crate) struct TrackedSource {
    core: Rc<RefCell<SourceCore>>,
    /// Whether a settle observer was installed at claim time (the source was
    /// still pending). Already-settled sources never arm.
    armed: bool,
}

impl std::fmt::Debug for TrackedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedSource")
            .field("armed", &self.armed)
            .field("state", &self.core.borrow().state)
            .finish()
    }
}

impl TrackedSource {
    /// Claim `source` for one tracking session, installing `observer` to be
    /// invoked exactly once when it settles.
    ///
    /// A source that already settled (or was unsubscribed) is claimed inert:
    /// no observer is installed and [`is_armed`](Self::is_armed) is false. A
    /// source still pending under another live session is an
    /// [`BusyError::InvalidSource`].
    pub(crate) fn claim(
        source: &BusySource,
        observer: Box<dyn FnOnce()>,
    ) -> Result<Self> {
        let mut inner = source.core.borrow_mut();
        if inner.state != SourceState::Pending {
            return Ok(Self {
                core: Rc::clone(&source.core),
                armed: false,
            });
        }
        if inner.claimed {
            return Err(BusyError::InvalidSource {
                reason: "source is already tracked by a live busy session",
            });
        }
        inner.claimed = true;
        inner.observer = Some(observer);
        trace!(kind = ?inner.kind, "busy source claimed");
        drop(inner);
        Ok(Self {
            core: Rc::clone(&source.core),
            armed: true,
        })
    }

    /// Whether an observer was installed at claim time.
    #[must_use]
    pub(crate) fn is_armed(&self) -> bool {
        self.armed
    }

    /// Stop observing this source. Idempotent, never panics.
    ///
    /// Deferred: detaches the observer only; the underlying operation keeps
    /// running and the source stays pending (it may be claimed again by a
    /// later session). Subscription: authoritative unsubscribe; the source
    /// becomes `Cancelled` and ignores all later host events.
    pub(crate) fn cancel(&self) {
        let mut inner = self.core.borrow_mut();
        inner.observer = None;
        inner.claimed = false;
        match inner.kind {
            SourceKind::Deferred => {}
            SourceKind::Subscription => {
                if inner.state == SourceState::Pending {
                    inner.state = SourceState::Cancelled;
                    trace!("subscription source unsubscribed");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
