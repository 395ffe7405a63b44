#![forbid(unsafe_code)]

//! One tracked busy region: a source-set tracker and a timing gate wired to
//! a plain signal callback.
//!
//! A [`TrackedInstance`] is reconfigured every time the host's bound value
//! changes. Each `configure` call atomically tears down the previous wiring
//! (cancelling still-pending sources and disarming timers), claims the new
//! source set, arms a fresh gate with the merged durations, and synchronously
//! evaluates and emits the resulting busy signal — "no sources → not busy"
//! holds without waiting a tick.
//!
//! `destroy()` performs the same teardown and makes the instance permanently
//! inert; configuring afterwards is a [`BusyError::UseAfterDestroy`], never a
//! silent no-op.
//!
//! # Invariants
//!
//! 1. No timer or source subscription survives a reconfiguration or destroy.
//! 2. The signal is emitted unconditionally on `configure` and on value
//!    flips afterwards; consecutive emissions outside `configure` alternate.
//! 3. A claim failure fails closed: signal false, no deadline armed.
//! 4. Instances never observe each other's transitions.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;
use web_time::Instant;

use crate::clock::Clock;
use crate::config::{BusyDefaults, BusyInput, ResolvedOptions};
use crate::content::BusyContent;
use crate::error::{BusyError, Result};
use crate::gate::TimingGate;
use crate::registry::InstanceKey;
use crate::tracker::SourceSetTracker;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

type SignalCallback = Box<dyn FnMut(bool)>;
type SignalSlot = Rc<RefCell<Option<SignalCallback>>>;

struct InstanceInner {
    key: InstanceKey,
    clock: Clock,
    defaults: BusyDefaults,
    tracker: SourceSetTracker,
    gate: TimingGate,
    resolved: Option<ResolvedOptions>,
    busy: bool,
    destroyed: bool,
}

/// A busy-tracked region, keyed by a stable identity.
pub struct TrackedInstance {
    inner: Rc<RefCell<InstanceInner>>,
    /// Signal callback, kept outside the inner cell so emissions may
    /// re-enter the instance.
    signal: SignalSlot,
}

impl std::fmt::Debug for TrackedInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("TrackedInstance")
            .field("key", &inner.key)
            .field("busy", &inner.busy)
            .field("gate", &inner.gate.state())
            .field("destroyed", &inner.destroyed)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl TrackedInstance {
    /// Create an idle instance with a freshly minted key.
    #[must_use]
    pub fn new(clock: Clock, defaults: BusyDefaults) -> Self {
        Self::with_key(InstanceKey::mint(), clock, defaults)
    }

    /// Create an idle instance under a caller-supplied key (registry use).
    #[must_use]
    pub fn with_key(key: InstanceKey, clock: Clock, defaults: BusyDefaults) -> Self {
        let inner = Rc::new(RefCell::new(InstanceInner {
            key,
            clock,
            defaults,
            tracker: SourceSetTracker::new(),
            gate: TimingGate::default(),
            resolved: None,
            busy: false,
            destroyed: false,
        }));
        let signal: SignalSlot = Rc::new(RefCell::new(None));

        // Wire the tracker's aggregate-settle event into the gate. Installed
        // once; survives every reconfiguration.
        let weak = Rc::downgrade(&inner);
        let signal_for_settle = Rc::clone(&signal);
        inner.borrow().tracker.on_change(move |_| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let flip = {
                let mut inner = inner.borrow_mut();
                if inner.destroyed {
                    return;
                }
                let now = inner.clock.now();
                let flip = inner.gate.note_settled(now);
                if let Some(value) = flip {
                    inner.busy = value;
                }
                flip
            };
            if let Some(value) = flip {
                emit(&signal_for_settle, value);
            }
        });

        Self { inner, signal }
    }

    /// Stable identity of this instance.
    #[must_use]
    pub fn key(&self) -> InstanceKey {
        self.inner.borrow().key
    }
}

// ---------------------------------------------------------------------------
// Configuration and lifecycle
// ---------------------------------------------------------------------------

impl TrackedInstance {
    /// Register the busy-signal callback for the presentation layer.
    pub fn on_signal(&self, callback: impl FnMut(bool) + 'static) {
        *self.signal.borrow_mut() = Some(Box::new(callback));
    }

    /// Replace the tracked configuration.
    ///
    /// Tears down the previous source set and timers, claims the new set,
    /// arms a fresh gate with the merged durations, and synchronously emits
    /// the evaluated signal, which is also returned.
    pub fn configure(&self, input: impl Into<BusyInput>) -> Result<bool> {
        let input = input.into();
        let outcome = {
            let mut inner = self.inner.borrow_mut();
            if inner.destroyed {
                return Err(BusyError::UseAfterDestroy { key: inner.key });
            }
            let options = input.into_options().merge(&inner.defaults);
            debug!(key = ?inner.key, sources = options.busy.len(), "configure");

            // Teardown first: the old set must be cancelled before the new
            // one is observed.
            inner.tracker.clear();
            inner.gate = TimingGate::new(options.delay, options.min_duration);

            let tracked = inner.tracker.track(&options.busy);
            inner.resolved = Some(options);
            match tracked {
                Ok(()) => {
                    if inner.tracker.is_pending() {
                        let now = inner.clock.now();
                        let _ = inner.gate.note_pending(now);
                    }
                    let busy = inner.gate.is_shown();
                    inner.busy = busy;
                    Ok(busy)
                }
                Err(err) => {
                    // Fail closed: signal false, no deadline armed.
                    inner.gate.reset();
                    inner.busy = false;
                    Err(err)
                }
            }
        };
        match outcome {
            Ok(busy) => {
                emit(&self.signal, busy);
                Ok(busy)
            }
            Err(err) => {
                emit(&self.signal, false);
                Err(err)
            }
        }
    }

    /// Tear everything down and make the instance permanently inert.
    /// Idempotent; releases the signal callback synchronously.
    pub fn destroy(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.destroyed {
                return;
            }
            debug!(key = ?inner.key, "destroy");
            inner.tracker.clear();
            inner.gate.reset();
            inner.busy = false;
            inner.resolved = None;
            inner.destroyed = true;
        }
        *self.signal.borrow_mut() = None;
    }

    /// Whether the instance has been destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.borrow().destroyed
    }
}

// ---------------------------------------------------------------------------
// Runtime surface
// ---------------------------------------------------------------------------

impl TrackedInstance {
    /// Current busy signal value.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.inner.borrow().busy
    }

    /// Fire the gate timer if it is due. Returns the emitted flip, if any.
    pub fn poll(&self) -> Option<bool> {
        let flip = {
            let mut inner = self.inner.borrow_mut();
            if inner.destroyed {
                return None;
            }
            let now = inner.clock.now();
            let flip = inner.gate.poll(now);
            if let Some(value) = flip {
                inner.busy = value;
            }
            flip
        };
        if let Some(value) = flip {
            emit(&self.signal, value);
        }
        flip
    }

    /// The earliest armed timer deadline, for precise host sleeping.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.inner.borrow().gate.next_deadline()
    }

    /// The content descriptor resolved by the current configuration.
    #[must_use]
    pub fn content(&self) -> Option<BusyContent> {
        self.inner
            .borrow()
            .resolved
            .as_ref()
            .map(|r| r.content.clone())
    }

    /// The fully merged options of the current configuration (wrapper class,
    /// backdrop, durations) for the presentation layer.
    #[must_use]
    pub fn resolved(&self) -> Option<ResolvedOptions> {
        self.inner.borrow().resolved.clone()
    }
}

/// Invoke the signal callback outside any instance borrow. The callback is
/// taken out for the duration of the call so it may re-enter the instance or
/// replace itself.
fn emit(signal: &SignalSlot, value: bool) {
    let callback = signal.borrow_mut().take();
    if let Some(mut callback) = callback {
        callback(value);
        let mut slot = signal.borrow_mut();
        if slot.is_none() {
            *slot = Some(callback);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
