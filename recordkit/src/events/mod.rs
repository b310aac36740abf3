//! Listener registry shared by records, fields and recordsets.
//!
//! - [`Emitter`]: a cloneable handle to an ordered list of listeners for one
//!   event type.
//! - [`Subscription`]: RAII guard returned by [`Emitter::subscribe`]; dropping
//!   it detaches the listener.
//!
//! # Invariants
//!
//! 1. Listeners are invoked in registration order.
//! 2. `emit` snapshots the listener list and releases the lock before any
//!    listener runs, so a listener may subscribe, unsubscribe or emit again.
//! 3. A subscription only holds a `Weak` reference to its emitter; it never
//!    keeps the emitting object alive.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct EmitterInner<E> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener<E>)>>,
}

trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

impl<E> Detach for EmitterInner<E> {
    fn detach(&self, id: u64) {
        self.listeners.lock().retain(|(listener_id, _)| *listener_id != id);
    }
}

/// Ordered set of listeners for events of type `E`.
pub struct Emitter<E> {
    inner: Arc<EmitterInner<E>>,
}

impl<E> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: 'static> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> Emitter<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EmitterInner {
                next_id: AtomicU64::new(1),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a listener. It stays attached until the returned guard is dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));

        let target: Weak<dyn Detach> = Arc::downgrade(&self.inner) as Weak<dyn Detach>;
        Subscription {
            target: Some(target),
            id,
        }
    }

    pub fn emit(&self, event: &E) {
        let listeners: Vec<Listener<E>> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

/// Detaches its listener when dropped.
#[must_use = "dropping a Subscription immediately detaches the listener"]
pub struct Subscription {
    target: Option<Weak<dyn Detach>>,
    id: u64,
}

impl Subscription {
    /// Keep the listener attached for the emitter's whole lifetime.
    pub fn forget(mut self) {
        self.target = None;
    }

    pub fn is_active(&self) -> bool {
        self.target
            .as_ref()
            .map(|target| target.strong_count() > 0)
            .unwrap_or(false)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(target) = self.target.take().and_then(|t| t.upgrade()) {
            target.detach(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
