//! Observable state store.
//!
//! A [`Store`] holds one immutable [`Payload`] snapshot at a time. Writers
//! merge partial payloads into it; every write swaps in a new snapshot and
//! notifies subscribers synchronously with `(state, previous)`.
//!
//! No lock is held while subscribers run, so a subscriber may read the
//! store or write to it again from inside the notification.

use crate::config::PersistOptions;
use crate::persist::{PersistHandle, Persistence};
use parking_lot::{Mutex, RwLock};
use propsync_codec::Payload;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Subscriber callback, called with `(state, previous)`.
pub type Listener = Arc<dyn Fn(&Payload, &Payload) + Send + Sync>;

struct StoreInner {
    state: RwLock<Arc<Payload>>,
    initial: RwLock<Arc<Payload>>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
    persistence: Option<Arc<Persistence>>,
}

/// A shared handle to an observable state store.
///
/// Cloning is cheap and every clone refers to the same store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Creates a store.
    ///
    /// `initializer` produces the initial fields. It receives the store
    /// itself so that it can build actions around it; such actions should
    /// capture [`Store::downgrade`] to avoid a reference cycle.
    ///
    /// With persistence configured, the stored envelope is restored right
    /// after the initial state is installed, unless hydration is skipped.
    /// A missing, unreadable or corrupt envelope leaves the initial state
    /// in place; creation itself never fails.
    pub fn create<F>(initializer: F, persist: Option<PersistOptions>) -> Self
    where
        F: FnOnce(&Store) -> Payload,
    {
        let store = Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(Arc::new(Payload::new())),
                initial: RwLock::new(Arc::new(Payload::new())),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
                persistence: persist.map(|options| Arc::new(Persistence::new(options))),
            }),
        };

        let initial = Arc::new(initializer(&store));
        *store.inner.initial.write() = Arc::clone(&initial);
        *store.inner.state.write() = initial;

        if let Some(persistence) = &store.inner.persistence {
            if !persistence.skips_hydration() {
                persistence.hydrate(&store);
            }
        }

        store
    }

    /// Creates a store without persistence.
    pub fn new(initial: Payload) -> Self {
        Self::create(|_| initial, None)
    }

    /// Returns the current state snapshot.
    pub fn get_state(&self) -> Arc<Payload> {
        Arc::clone(&self.inner.state.read())
    }

    /// Returns the state produced by the initializer.
    pub fn get_initial_state(&self) -> Arc<Payload> {
        Arc::clone(&self.inner.initial.read())
    }

    /// Applies `selector` to the current state.
    pub fn select<T>(&self, selector: impl FnOnce(&Payload) -> T) -> T {
        selector(&self.get_state())
    }

    /// Overlays `partial` onto the state and notifies subscribers.
    ///
    /// Fields not named in `partial` keep their values.
    pub fn merge(&self, partial: &Payload) {
        let (next, previous) = {
            let mut state = self.inner.state.write();
            let next = Arc::new(state.merged(partial));
            let previous = std::mem::replace(&mut *state, Arc::clone(&next));
            (next, previous)
        };
        self.publish(&next, &previous);
    }

    /// Replaces the whole state and notifies subscribers.
    pub fn replace(&self, state: Payload) {
        let next = Arc::new(state);
        let previous = std::mem::replace(&mut *self.inner.state.write(), Arc::clone(&next));
        self.publish(&next, &previous);
    }

    fn publish(&self, next: &Payload, previous: &Payload) {
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(next, previous);
        }

        // Subscribers may have written again; save whatever is current.
        if let Some(persistence) = &self.inner.persistence {
            persistence.save(&self.get_state());
        }
    }

    /// Registers a listener called after every write.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Payload, &Payload) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        Subscription {
            store: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Registers a listener on a slice of the state.
    ///
    /// `listener(selected, previous_selected)` runs only when `equality`
    /// reports that the selected slice changed.
    pub fn subscribe_with_selector<T, S, E, L>(
        &self,
        selector: S,
        equality: E,
        listener: L,
    ) -> Subscription
    where
        T: Clone + Send + 'static,
        S: Fn(&Payload) -> T + Send + Sync + 'static,
        E: Fn(&T, &T) -> bool + Send + Sync + 'static,
        L: Fn(&T, &T) + Send + Sync + 'static,
    {
        let current = Mutex::new(self.select(&selector));
        self.subscribe(move |state, _| {
            let next = selector(state);
            let previous = {
                let mut current = current.lock();
                if equality(&current, &next) {
                    return;
                }
                std::mem::replace(&mut *current, next.clone())
            };
            listener(&next, &previous);
        })
    }

    /// Returns the number of registered listeners.
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Returns a handle that does not keep the store alive.
    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Returns true if both handles refer to the same store.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn sync_handle(&self) -> SyncHandle {
        SyncHandle {
            store: self.clone(),
        }
    }

    /// Returns the persistence API, if persistence is configured.
    pub fn persist(&self) -> Option<PersistHandle> {
        self.inner
            .persistence
            .as_ref()
            .map(|persistence| PersistHandle::new(self.clone(), Arc::clone(persistence)))
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.get_state())
            .field("subscribers", &self.subscriber_count())
            .field("persisted", &self.inner.persistence.is_some())
            .finish()
    }
}

/// Write capability held by a sync pipeline.
///
/// It lives beside the store rather than inside its state, so nothing read
/// from the state can reach it.
#[derive(Clone, Debug)]
pub(crate) struct SyncHandle {
    store: Store,
}

impl SyncHandle {
    /// Merges a synced payload into the store.
    pub(crate) fn apply(&self, partial: &Payload) {
        self.store.merge(partial);
    }
}

/// A non-owning store handle.
#[derive(Clone, Debug)]
pub struct WeakStore {
    inner: Weak<StoreInner>,
}

impl WeakStore {
    /// Returns the store if it is still alive.
    pub fn upgrade(&self) -> Option<Store> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

/// Keeps a listener registered until dropped.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    store: Weak<StoreInner>,
    id: u64,
}

impl Subscription {
    /// Unsubscribes now.
    pub fn unsubscribe(self) {}

    /// Returns true while the listener is registered.
    pub fn is_active(&self) -> bool {
        self.store
            .upgrade()
            .is_some_and(|inner| inner.listeners.lock().iter().any(|(id, _)| *id == self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            // Take the listener out first so it is dropped after the lock.
            let removed = {
                let mut listeners = inner.listeners.lock();
                listeners
                    .iter()
                    .position(|(id, _)| *id == self.id)
                    .map(|index| listeners.remove(index))
            };
            drop(removed);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
