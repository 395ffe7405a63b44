#![forbid(unsafe_code)]

//! busyline public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.

pub use busyline_core::{
    BusyContent, BusyDefaults, BusyError, BusyInput, BusyOptions, BusyRegistry, BusySource,
    Clock, ComponentHandle, ComponentInputs, DeferredHandle, InputValue, InstanceKey, LabClock,
    Result, SubscriptionHandle, TemplateHandle, TrackedInstance, deferred, subscription,
};

pub mod prelude {
    pub use busyline_core as core;
}
