//! Change notification registry
//!
//! Observers are told that the activation state of some group *may* have
//! changed. The registry never says which group, and it may notify more
//! often than strictly needed; observers re-derive whatever they cache.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for components that react to activation changes
///
/// Implementations must be cheap and idempotent: they may be invoked
/// speculatively.
pub trait ChangeObserver: Send + Sync {
    /// Called after a batch of activation edges
    fn on_potential_change(&self);
}

impl<F> ChangeObserver for F
where
    F: Fn() + Send + Sync,
{
    fn on_potential_change(&self) {
        self()
    }
}

/// Identifier returned by [`ChangeNotifier::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

static SUBSCRIPTION_COUNTER: AtomicU64 = AtomicU64::new(1);

impl SubscriptionId {
    fn next() -> Self {
        Self(SUBSCRIPTION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub:{}", self.0)
    }
}

/// Observer that raises a flag for a consumer to collect later
#[derive(Debug, Default)]
pub struct DirtyFlag {
    dirty: AtomicBool,
}

impl DirtyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a change was signalled since the last `take`
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Read and clear the flag
    pub fn take(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }
}

impl ChangeObserver for DirtyFlag {
    fn on_potential_change(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}

/// Thread-safe subscriber list
///
/// The list is mutated under its own lock, but callbacks run on a copy
/// taken outside it, so observers may subscribe or unsubscribe from
/// inside `on_potential_change`.
#[derive(Default)]
pub struct ChangeNotifier {
    observers: Mutex<Vec<(SubscriptionId, Arc<dyn ChangeObserver>)>>,
    rounds: AtomicU64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer
    pub fn subscribe(&self, observer: Arc<dyn ChangeObserver>) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.observers.lock().push((id, observer));
        tracing::debug!(subscription = %id, "observer subscribed");
        id
    }

    /// Unsubscribe; returns false if the id was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|(sid, _)| *sid != id);
        before != observers.len()
    }

    /// Get the number of registered observers
    pub fn len(&self) -> usize {
        self.observers.lock().len()
    }

    /// Check if there are no observers
    pub fn is_empty(&self) -> bool {
        self.observers.lock().is_empty()
    }

    /// Number of notification rounds delivered so far
    pub fn rounds(&self) -> u64 {
        self.rounds.load(Ordering::Relaxed)
    }

    /// Invoke every observer once
    pub fn notify(&self) {
        let observers: Vec<Arc<dyn ChangeObserver>> = self
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();

        self.rounds.fetch_add(1, Ordering::Relaxed);
        for observer in observers {
            observer.on_potential_change();
        }
    }

    /// Drop every observer
    pub fn clear(&self) {
        self.observers.lock().clear();
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("observers", &self.len())
            .field("rounds", &self.rounds())
            .finish()
    }
}
