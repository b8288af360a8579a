//! Subject: an observer list with synchronous fan-out
//!
//! `Subject<T>` is the single building block of this crate. Message streams,
//! settings-change streams and failure streams are all just subjects with
//! different payload types.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Opaque handle identifying one attached observer.
///
/// Closures cannot be compared for equality, so detachment works through the
/// id handed back by [`Subject::attach`] instead of the handler itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A typed observer list.
///
/// `notify` delivers the value to every observer attached at that moment,
/// synchronously and in attachment order. Observers attached during or after
/// a `notify` call do not receive that value.
///
/// # Handler isolation
///
/// A panic inside one observer is caught and logged; delivery continues with
/// the remaining observers.
pub struct Subject<T> {
    observers: Mutex<Vec<(SubscriptionId, Handler<T>)>>,
    next_id: AtomicU64,
}

impl<T> Subject<T> {
    /// Create a subject with no observers.
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Attach an observer, returning the id to detach it with later.
    pub fn attach<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut observers = match self.observers.lock() {
            Ok(o) => o,
            Err(poisoned) => poisoned.into_inner(),
        };
        observers.push((id, Arc::new(observer)));
        id
    }

    /// Detach a previously attached observer.
    ///
    /// Returns `false` if the id was unknown or already detached.
    pub fn detach(&self, id: SubscriptionId) -> bool {
        let mut observers = match self.observers.lock() {
            Ok(o) => o,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    /// Notify every currently attached observer with `value`.
    ///
    /// The observer list is snapshotted before delivery, so observers may
    /// attach or detach from within a handler without deadlocking; such
    /// changes take effect from the next `notify` call.
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Handler<T>> = {
            let observers = match self.observers.lock() {
                Ok(o) => o,
                Err(poisoned) => poisoned.into_inner(),
            };
            observers.iter().map(|(_, handler)| Arc::clone(handler)).collect()
        };

        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(value))).is_err() {
                tracing::error!("observer panicked during notify; continuing with remaining observers");
            }
        }
    }

    /// Number of currently attached observers.
    pub fn observer_count(&self) -> usize {
        match self.observers.lock() {
            Ok(o) => o.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl<T> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subject")
            .field("observer_count", &self.observer_count())
            .finish()
    }
}
