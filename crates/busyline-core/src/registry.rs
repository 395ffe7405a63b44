#![forbid(unsafe_code)]

//! Explicit handle arena for tracked instances.
//!
//! The original directive kept one tracker per usage via dependency-injection
//! identity; here the mapping is explicit: a [`BusyRegistry`] maps a stable
//! opaque [`InstanceKey`] to its instance, created on first configuration and
//! removed on destroy. There is no global lookup; hosts own their registry.
//!
//! Instances are fully isolated — the registry shares nothing between them
//! beyond the map itself. [`poll`](BusyRegistry::poll) pumps every instance's
//! gate timer and [`next_deadline`](BusyRegistry::next_deadline) exposes the
//! earliest armed deadline across all of them, so a host event loop can sleep
//! until exactly the next transition.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;
use web_time::Instant;

use crate::clock::Clock;
use crate::config::{BusyDefaults, BusyInput};
use crate::content::BusyContent;
use crate::error::{BusyError, Result};
use crate::instance::TrackedInstance;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable opaque identity of a tracked instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceKey(u64);

impl InstanceKey {
    /// Mint a fresh, unique key.
    pub(crate) fn mint() -> Self {
        Self(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Arena of tracked instances keyed by [`InstanceKey`].
pub struct BusyRegistry {
    clock: Clock,
    defaults: BusyDefaults,
    instances: HashMap<InstanceKey, TrackedInstance, ahash::RandomState>,
}

impl std::fmt::Debug for BusyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusyRegistry")
            .field("instances", &self.instances.len())
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl Default for BusyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BusyRegistry {
    /// Registry with real time and the stock defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clock: Clock::Real,
            defaults: BusyDefaults::default(),
            instances: HashMap::default(),
        }
    }

    /// Use a specific time source (lab clock in tests).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Use application-wide defaults.
    #[must_use]
    pub fn with_defaults(mut self, defaults: BusyDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Create a new idle instance and return its key.
    pub fn create(&mut self) -> InstanceKey {
        let key = InstanceKey::mint();
        let instance =
            TrackedInstance::with_key(key, self.clock.clone(), self.defaults.clone());
        self.instances.insert(key, instance);
        debug!(?key, "instance created");
        key
    }

    /// Reconfigure the instance under `key`. A key that was destroyed (or
    /// never existed) is a [`BusyError::UseAfterDestroy`].
    pub fn configure(&self, key: InstanceKey, input: impl Into<BusyInput>) -> Result<bool> {
        self.get(key)?.configure(input)
    }

    /// Register the busy-signal callback for `key`.
    pub fn on_signal(
        &self,
        key: InstanceKey,
        callback: impl FnMut(bool) + 'static,
    ) -> Result<()> {
        self.get(key)?.on_signal(callback);
        Ok(())
    }

    /// Current signal value for `key`, if it exists.
    #[must_use]
    pub fn is_busy(&self, key: InstanceKey) -> Option<bool> {
        self.instances.get(&key).map(TrackedInstance::is_busy)
    }

    /// Resolved content descriptor for `key`, if configured.
    #[must_use]
    pub fn content(&self, key: InstanceKey) -> Option<BusyContent> {
        self.instances.get(&key).and_then(TrackedInstance::content)
    }

    /// Fire every due gate timer. Returns the keys whose signal flipped.
    pub fn poll(&self) -> Vec<InstanceKey> {
        let mut flipped = Vec::new();
        for (key, instance) in &self.instances {
            if instance.poll().is_some() {
                flipped.push(*key);
            }
        }
        flipped
    }

    /// The earliest armed deadline across all instances.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.instances
            .values()
            .filter_map(TrackedInstance::next_deadline)
            .min()
    }

    /// Destroy and remove the instance under `key`. Returns whether it
    /// existed. Subsequent `configure` calls on the key fail with
    /// [`BusyError::UseAfterDestroy`].
    pub fn destroy(&mut self, key: InstanceKey) -> bool {
        match self.instances.remove(&key) {
            Some(instance) => {
                instance.destroy();
                debug!(?key, "instance destroyed");
                true
            }
            None => false,
        }
    }

    /// Number of live instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the registry has no live instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn get(&self, key: InstanceKey) -> Result<&TrackedInstance> {
        self.instances
            .get(&key)
            .ok_or(BusyError::UseAfterDestroy { key })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::LabClock;
    use crate::config::BusyOptions;
    use crate::source::deferred;
    use web_time::Duration;

    fn lab_registry() -> (BusyRegistry, LabClock) {
        let lab = LabClock::new();
        let registry = BusyRegistry::new().with_clock(lab.clock());
        (registry, lab)
    }

    #[test]
    fn create_and_destroy() {
        let (mut registry, _lab) = lab_registry();
        let key = registry.create();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.is_busy(key), Some(false));

        assert!(registry.destroy(key));
        assert!(registry.is_empty());
        assert!(!registry.destroy(key), "second destroy finds nothing");
    }

    #[test]
    fn configure_after_destroy_is_an_error() {
        let (mut registry, _lab) = lab_registry();
        let key = registry.create();
        registry.destroy(key);
        assert_eq!(
            registry.configure(key, BusyInput::None),
            Err(BusyError::UseAfterDestroy { key })
        );
    }

    #[test]
    fn keys_are_unique_across_instances() {
        let (mut registry, _lab) = lab_registry();
        let a = registry.create();
        let b = registry.create();
        assert_ne!(a, b);
    }

    #[test]
    fn instances_toggle_independently() {
        let (mut registry, lab) = lab_registry();
        let a = registry.create();
        let b = registry.create();

        let (a_source, a_handle) = deferred();
        let (b_source, _b_handle) = deferred();
        registry.configure(a, a_source).unwrap();
        registry.configure(b, b_source).unwrap();

        lab.advance(Duration::from_millis(300));
        let mut flipped = registry.poll();
        flipped.sort_by_key(|k| k.0);
        assert_eq!(flipped.len(), 2, "both delay timers fired");

        a_handle.resolve();
        lab.advance(Duration::from_millis(700));
        assert_eq!(registry.poll(), vec![a], "only a's hold timer was armed");
        assert_eq!(registry.is_busy(a), Some(false));
        assert_eq!(registry.is_busy(b), Some(true));
    }

    #[test]
    fn next_deadline_is_the_earliest() {
        let (mut registry, lab) = lab_registry();
        let fast = registry.create();
        let slow = registry.create();

        let (fast_source, _f) = deferred();
        let (slow_source, _s) = deferred();
        registry
            .configure(
                fast,
                BusyOptions::new()
                    .with_source(fast_source)
                    .with_delay(Duration::from_millis(100)),
            )
            .unwrap();
        registry.configure(slow, slow_source).unwrap();

        let deadline = registry.next_deadline().unwrap();
        assert_eq!(deadline, lab.now() + Duration::from_millis(100));
    }

    #[test]
    fn no_deadline_when_idle() {
        let (mut registry, _lab) = lab_registry();
        let key = registry.create();
        registry.configure(key, BusyInput::None).unwrap();
        assert!(registry.next_deadline().is_none());
        assert!(registry.poll().is_empty());
    }

    #[test]
    fn signal_callback_reaches_the_host() {
        let (mut registry, _lab) = lab_registry();
        let key = registry.create();
        let seen = std::rc::Rc::new(std::cell::Cell::new(false));
        let sink = std::rc::Rc::clone(&seen);
        registry.on_signal(key, move |busy| sink.set(busy)).unwrap();

        let (source, _handle) = deferred();
        registry
            .configure(
                key,
                BusyOptions::new()
                    .with_source(source)
                    .with_delay(Duration::ZERO),
            )
            .unwrap();
        assert!(seen.get());
    }

    #[test]
    fn content_lookup() {
        let (mut registry, _lab) = lab_registry();
        let key = registry.create();
        registry
            .configure(key, BusyOptions::new().with_text("hello"))
            .unwrap();
        assert_eq!(registry.content(key), Some(BusyContent::Text("hello".into())));
    }

    #[test]
    fn debug_format() {
        let registry = BusyRegistry::new();
        assert!(format!("{registry:?}").contains("BusyRegistry"));
    }
}
