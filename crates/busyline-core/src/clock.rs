#![forbid(unsafe_code)]

//! Time source abstraction for deterministic timing tests.
//!
//! Production code uses real wall-clock time. Tests use a [`LabClock`], a
//! manually-advanceable clock: all [`Clock`] handles sharing the same
//! `LabClock` see the same time, so delay/min-duration behavior can be
//! exercised without sleeping.
//!
//! # Invariants
//!
//! 1. `now()` is monotonically non-decreasing for both variants.
//! 2. `LabClock::advance` is visible to every `Clock` cloned from it.
//! 3. Cloning a `Clock` never forks time: clones share the same source.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use web_time::{Duration, Instant};

/// Time source handle. Cheaply cloneable.
#[derive(Debug, Clone)]
pub enum Clock {
    /// Real wall-clock time.
    Real,
    /// Deterministic lab clock for testing.
    Lab(LabClock),
}

impl Clock {
    /// Current time according to this source.
    #[must_use]
    pub fn now(&self) -> Instant {
        match self {
            Self::Real => Instant::now(),
            Self::Lab(lab) => lab.now(),
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::Real
    }
}

/// A manually-advanceable clock for deterministic tests.
///
/// All handles cloned from the same `LabClock` observe the same time.
#[derive(Debug, Clone)]
pub struct LabClock {
    epoch: Instant,
    offset_us: Arc<AtomicU64>,
}

impl LabClock {
    /// Create a new lab clock starting at `Instant::now()`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset_us: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Advance the lab clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        let us = delta.as_micros().min(u64::MAX as u128) as u64;
        self.offset_us.fetch_add(us, Ordering::Release);
    }

    /// Current lab time.
    #[must_use]
    pub fn now(&self) -> Instant {
        let offset = Duration::from_micros(self.offset_us.load(Ordering::Acquire));
        self.epoch + offset
    }

    /// A [`Clock`] handle backed by this lab clock.
    #[must_use]
    pub fn clock(&self) -> Clock {
        Clock::Lab(self.clone())
    }
}

impl Default for LabClock {
    fn default() -> Self {
        Self::new()
    }
}
