#![forbid(unsafe_code)]

//! Error taxonomy for the busy-tracking engine.
//!
//! Only genuine misuse is an error. Cancelling a source is unconditionally
//! safe and idempotent, so there is no cancellation error variant; a source's
//! underlying failure (a rejected deferred, an erroring subscription) is the
//! host's business on its own error channel and merely counts as settled
//! here.

use thiserror::Error;

use crate::registry::InstanceKey;

pub type Result<T> = std::result::Result<T, BusyError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusyError {
    /// A value handed to the source set cannot be tracked. Raised at claim
    /// time so the instance fails closed instead of spinning forever.
    #[error("invalid busy source: {reason}")]
    InvalidSource { reason: &'static str },

    /// `configure()` was called on an instance after `destroy()`. This is a
    /// dangling-reference bug in the host and is never silently ignored.
    #[error("busy instance {key:?} used after destroy")]
    UseAfterDestroy { key: InstanceKey },
}
