//! Subscriber Registry - the set of live viewport subscriptions
//!
//! One entry per mounted consumer, keyed by a [`ListenerId`] token handed out
//! at registration. Each entry carries the subscriber's options and the
//! signature of the last snapshot actually delivered to it.
//!
//! The registry itself only exists while it has entries: it is built on the
//! first registration (attaching the environment's resize monitoring) and
//! dropped on the last unregistration (detaching it).
//!
//! Writes are crate-private: only the dispatcher and the subscription hook
//! mutate entries. Everything public here is read-only.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::environment::{self, Environment};
use crate::types::{Dimension, Signature, SignatureValue, Viewport};

// =============================================================================
// TYPES
// =============================================================================

/// Token identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Caller-supplied signature function.
///
/// Maps a snapshot to any comparable value; subscribers are only notified
/// when that value changes.
#[derive(Clone)]
pub struct Hasher(Rc<dyn Fn(&Viewport) -> Signature>);

impl Hasher {
    pub fn new<F, T>(f: F) -> Self
    where
        F: Fn(&Viewport) -> T + 'static,
        T: SignatureValue,
    {
        Self(Rc::new(move |viewport| Signature::custom(f(viewport))))
    }

    pub fn call(&self, viewport: &Viewport) -> Signature {
        (self.0)(viewport)
    }
}

impl fmt::Debug for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hasher(..)")
    }
}

/// Resolved, immutable options for one subscription.
#[derive(Debug, Clone, Default)]
pub struct SubscriberOptions {
    pub dimension: Dimension,
    pub hasher: Option<Hasher>,
    /// Zero disables debouncing.
    pub debounce: Duration,
    /// Zero disables throttling.
    pub throttle: Duration,
}

impl SubscriberOptions {
    /// Signature of `viewport` as seen by this subscriber.
    pub fn signature(&self, viewport: Viewport) -> Signature {
        match &self.hasher {
            Some(hasher) => hasher.call(&viewport),
            None => Signature::derive(viewport, self.dimension),
        }
    }
}

/// What a subscriber receives when its signature changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub viewport: Viewport,
    pub signature: Signature,
}

/// Callback invoked with each delivery.
pub type Listener = Rc<dyn Fn(&Delivery)>;

struct Entry {
    options: SubscriberOptions,
    last_signature: Option<Signature>,
    listener: Listener,
}

/// Copy of an entry taken so user code can run without a registry borrow.
pub(crate) struct EntryView {
    pub options: SubscriberOptions,
    pub last_signature: Option<Signature>,
    pub listener: Listener,
}

/// Result of [`register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub id: ListenerId,
    /// This registration created the registry and attached the environment.
    pub started: bool,
}

// =============================================================================
// REGISTRY
// =============================================================================

struct Registry {
    entries: BTreeMap<ListenerId, Entry>,
    env: Rc<dyn Environment>,
}

impl Registry {
    fn new() -> Self {
        let env = environment::current();
        env.attach();
        debug!("viewport watch attached");
        Self {
            entries: BTreeMap::new(),
            env,
        }
    }
}

// Also runs from the thread-local destructor at thread exit, where logging
// is no longer available. Explicit teardown paths log before dropping.
impl Drop for Registry {
    fn drop(&mut self) {
        self.env.detach();
    }
}

thread_local! {
    static REGISTRY: RefCell<Option<Registry>> = const { RefCell::new(None) };
    static NEXT_ID: Cell<u64> = const { Cell::new(0) };
}

fn next_id() -> ListenerId {
    NEXT_ID.with(|n| {
        let id = n.get();
        n.set(id + 1);
        ListenerId(id)
    })
}

// =============================================================================
// WRITES (crate-private)
// =============================================================================

/// Add a subscriber. Its first dispatch always delivers.
pub(crate) fn register(options: SubscriberOptions, listener: Listener) -> Registration {
    let id = next_id();
    let started = REGISTRY.with(|reg| {
        let mut slot = reg.borrow_mut();
        let started = slot.is_none();
        let registry = slot.get_or_insert_with(Registry::new);
        registry.entries.insert(
            id,
            Entry {
                options,
                last_signature: None,
                listener,
            },
        );
        started
    });
    Registration { id, started }
}

/// Remove a subscriber. Unknown ids are ignored.
///
/// Returns whether an entry was removed. Removing the last entry tears the
/// registry down and detaches the environment.
pub(crate) fn unregister(id: ListenerId) -> bool {
    let (removed, torn_down) = REGISTRY.with(|reg| {
        let mut slot = reg.borrow_mut();
        let Some(registry) = slot.as_mut() else {
            return (None, None);
        };
        let removed = registry.entries.remove(&id);
        let torn_down = if registry.entries.is_empty() {
            slot.take()
        } else {
            None
        };
        (removed, torn_down)
    });

    // Listener closures and the environment run their Drop code here,
    // outside the borrow.
    let was_present = removed.is_some();
    drop(removed);
    if torn_down.is_some() {
        debug!("viewport watch detached");
    }
    drop(torn_down);
    was_present
}

/// Store the signature of a snapshot that was delivered to `id`.
pub(crate) fn record_fired(id: ListenerId, signature: Signature) -> bool {
    REGISTRY.with(|reg| {
        let mut slot = reg.borrow_mut();
        match slot.as_mut().and_then(|r| r.entries.get_mut(&id)) {
            Some(entry) => {
                entry.last_signature = Some(signature);
                true
            }
            None => false,
        }
    })
}

pub(crate) fn entry_view(id: ListenerId) -> Option<EntryView> {
    REGISTRY.with(|reg| {
        let slot = reg.borrow();
        let entry = slot.as_ref()?.entries.get(&id)?;
        Some(EntryView {
            options: entry.options.clone(),
            last_signature: entry.last_signature.clone(),
            listener: entry.listener.clone(),
        })
    })
}

/// Ids of all entries in registration order.
pub(crate) fn ids() -> Vec<ListenerId> {
    REGISTRY.with(|reg| {
        reg.borrow()
            .as_ref()
            .map(|r| r.entries.keys().copied().collect())
            .unwrap_or_default()
    })
}

// =============================================================================
// READS
// =============================================================================

/// Number of live subscriptions.
pub fn len() -> usize {
    REGISTRY.with(|reg| reg.borrow().as_ref().map_or(0, |r| r.entries.len()))
}

pub fn is_empty() -> bool {
    len() == 0
}

/// Whether environment resize monitoring is attached.
pub fn is_watching() -> bool {
    REGISTRY.with(|reg| reg.borrow().is_some())
}

pub fn contains(id: ListenerId) -> bool {
    REGISTRY.with(|reg| {
        reg.borrow()
            .as_ref()
            .is_some_and(|r| r.entries.contains_key(&id))
    })
}

/// Signature last delivered to `id`, if any.
pub fn last_signature(id: ListenerId) -> Option<Signature> {
    entry_view(id).and_then(|entry| entry.last_signature)
}

/// Drop every subscription and detach the environment (for testing).
pub fn reset_registry() {
    let torn_down = REGISTRY.with(|reg| reg.borrow_mut().take());
    if torn_down.is_some() {
        debug!("viewport watch detached");
    }
    drop(torn_down);
    NEXT_ID.with(|n| n.set(0));
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{install, ManualEnvironment};

    fn setup() -> Rc<ManualEnvironment> {
        reset_registry();
        let env = Rc::new(ManualEnvironment::new(640, 480));
        install(env.clone());
        env
    }

    fn noop() -> Listener {
        Rc::new(|_: &Delivery| {})
    }

    #[test]
    fn test_first_register_attaches() {
        let env = setup();
        assert!(!is_watching());

        let first = register(SubscriberOptions::default(), noop());
        assert!(first.started);
        assert!(env.is_attached());
        assert!(is_watching());

        let second = register(SubscriberOptions::default(), noop());
        assert!(!second.started);
        assert_ne!(first.id, second.id);
        assert_eq!(len(), 2);
        assert_eq!(env.attach_count(), 1);
    }

    #[test]
    fn test_last_unregister_detaches() {
        let env = setup();
        let a = register(SubscriberOptions::default(), noop());
        let b = register(SubscriberOptions::default(), noop());

        assert!(unregister(a.id));
        assert!(env.is_attached());

        assert!(contains(b.id));
        assert!(!contains(a.id));

        assert!(unregister(b.id));
        assert!(!env.is_attached());
        assert!(!is_watching());
        assert!(!contains(b.id));
        assert_eq!(len(), 0);
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_explicit_teardown_logs_detach() {
        let _env = setup();
        let a = register(SubscriberOptions::default(), noop());
        assert!(logs_contain("viewport watch attached"));

        unregister(a.id);
        assert!(logs_contain("viewport watch detached"));
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let _env = setup();
        let a = register(SubscriberOptions::default(), noop());
        assert!(unregister(a.id));
        assert!(!unregister(a.id));
        assert!(!unregister(ListenerId(999)));
    }

    #[test]
    fn test_record_fired() {
        let _env = setup();
        let a = register(SubscriberOptions::default(), noop());
        assert_eq!(last_signature(a.id), None);

        assert!(record_fired(a.id, Signature::Width(10)));
        assert_eq!(last_signature(a.id), Some(Signature::Width(10)));

        unregister(a.id);
        assert!(!record_fired(a.id, Signature::Width(11)));
    }

    #[test]
    fn test_ids_in_registration_order() {
        let _env = setup();
        let a = register(SubscriberOptions::default(), noop());
        let b = register(SubscriberOptions::default(), noop());
        let c = register(SubscriberOptions::default(), noop());
        unregister(b.id);
        assert_eq!(ids(), vec![a.id, c.id]);
    }

    #[test]
    fn test_reregister_after_teardown_restarts_watch() {
        let env = setup();
        let a = register(SubscriberOptions::default(), noop());
        unregister(a.id);

        let b = register(SubscriberOptions::default(), noop());
        assert!(b.started);
        assert_eq!(env.attach_count(), 2);
    }

    #[test]
    fn test_options_signature() {
        let vp = Viewport::new(300, 200);
        let width_only = SubscriberOptions {
            dimension: Dimension::Width,
            ..Default::default()
        };
        assert_eq!(width_only.signature(vp), Signature::Width(300));

        let hashed = SubscriberOptions {
            hasher: Some(Hasher::new(|vp: &Viewport| vp.width > 250)),
            ..Default::default()
        };
        assert_eq!(hashed.signature(vp), Signature::custom(true));
    }
}
