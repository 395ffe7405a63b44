#![forbid(unsafe_code)]

//! Content resolution: what the presentation layer should render while busy.
//!
//! [`resolve`] is a pure function of the configured options, independent of
//! the busy signal and safe to call repeatedly. The presentation layer
//! instantiates and disposes the actual view when the signal toggles; this
//! module only decides *which* content it should be.
//!
//! Template and component references are opaque handles minted by the
//! presentation layer; the engine never looks inside them.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::BusyOptions;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

fn next_handle_id() -> u64 {
    NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Opaque handles
// ---------------------------------------------------------------------------

/// Opaque reference to a presentation-layer template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateHandle(u64);

impl TemplateHandle {
    /// Mint a fresh, unique handle.
    #[must_use]
    pub fn mint() -> Self {
        Self(next_handle_id())
    }
}

/// Opaque reference to a presentation-layer component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentHandle(u64);

impl ComponentHandle {
    /// Mint a fresh, unique handle.
    #[must_use]
    pub fn mint() -> Self {
        Self(next_handle_id())
    }
}

/// A named input value passed to a component-typed content.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Named inputs for a component-typed content.
pub type ComponentInputs = std::collections::HashMap<String, InputValue, ahash::RandomState>;

// ---------------------------------------------------------------------------
// Content descriptor
// ---------------------------------------------------------------------------

/// The resolved choice of what to show while busy.
#[derive(Debug, Clone, PartialEq)]
pub enum BusyContent {
    /// The library's built-in indicator.
    DefaultIndicator,
    /// A literal text string.
    Text(String),
    /// An explicit template reference.
    Template(TemplateHandle),
    /// An explicit component type with named inputs.
    Component {
        handle: ComponentHandle,
        inputs: ComponentInputs,
    },
}

/// Resolve the content descriptor for `options`.
///
/// Resolution order: explicit component type > explicit template handle >
/// literal text > [`BusyContent::DefaultIndicator`]. Pure and stateless.
#[must_use]
pub fn resolve(options: &BusyOptions) -> BusyContent {
    if let Some(handle) = options.component {
        return BusyContent::Component {
            handle,
            inputs: options.inputs.clone(),
        };
    }
    if let Some(handle) = options.template {
        return BusyContent::Template(handle);
    }
    if let Some(text) = &options.text {
        return BusyContent::Text(text.clone());
    }
    BusyContent::DefaultIndicator
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
