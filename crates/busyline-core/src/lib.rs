#![forbid(unsafe_code)]

//! Busy-state tracking engine.
//!
//! Watches a set of in-flight async sources — deferred-completion values and
//! cancellable subscriptions, singly or in batches — and produces a single
//! debounced boolean "is busy" signal per tracked instance. Two timing
//! policies keep the indicator flicker-free: a start delay (no flash for
//! operations faster than the threshold) and a minimum visible duration (no
//! off-and-on blink for fast back-to-back operations).
//!
//! The engine is presentation-agnostic: it emits the boolean through a plain
//! callback and exposes a resolved [`BusyContent`] descriptor; mounting and
//! unmounting the actual indicator is the consumer's job.
//!
//! # Architecture
//!
//! Single-threaded cooperative: `Rc<RefCell<..>>` shared interiors, settle
//! notifications and timer fires are discrete callback boundaries, strictly
//! serialized per instance. Timers are poll-driven — pump
//! [`BusyRegistry::poll`] (or [`TrackedInstance::poll`]) from the host loop;
//! `next_deadline()` tells you exactly how long you may sleep.
//!
//! # Example
//!
//! ```
//! use busyline_core::{BusyOptions, BusyRegistry, deferred};
//! use web_time::Duration;
//!
//! let mut registry = BusyRegistry::new();
//! let key = registry.create();
//!
//! let (source, handle) = deferred();
//! let busy = registry
//!     .configure(
//!         key,
//!         BusyOptions::new()
//!             .with_source(source)
//!             .with_delay(Duration::ZERO)
//!             .with_min_duration(Duration::ZERO),
//!     )
//!     .unwrap();
//! assert!(busy);
//!
//! handle.resolve();
//! assert_eq!(registry.is_busy(key), Some(false));
//! ```

pub mod clock;
pub mod config;
pub mod content;
pub mod error;
pub mod gate;
pub mod instance;
pub mod registry;
pub mod source;
pub mod tracker;

pub use clock::{Clock, LabClock};
pub use config::{BusyDefaults, BusyInput, BusyOptions, ResolvedOptions};
pub use content::{
    BusyContent, ComponentHandle, ComponentInputs, InputValue, TemplateHandle, resolve,
};
pub use error::{BusyError, Result};
pub use gate::{GateState, TimingGate};
pub use instance::TrackedInstance;
pub use registry::{BusyRegistry, InstanceKey};
pub use source::{
    BusySource, DeferredHandle, SourceKind, SourceState, SubscriptionHandle, deferred,
    subscription,
};
pub use tracker::SourceSetTracker;
