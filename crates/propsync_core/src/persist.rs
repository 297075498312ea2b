//! Durable persistence of store state.
//!
//! A persisted store writes an [`Envelope`] holding the selected fields
//! and the configured version to its [`StorageBackend`] after every write,
//! and restores from it once at creation (or when the host asks).
//!
//! Failures never surface to readers: they are logged and the store keeps
//! its in-memory state.
//!
//! ## Hydration
//!
//! 1. `on_hydrate` listeners run with the state before restoring.
//! 2. The envelope is read and decoded. A version mismatch goes through
//!    `migrate`, or discards the stored state when none is configured.
//! 3. The restored fields are combined with the current state by the merge
//!    strategy and installed with [`Store::replace`], which also writes the
//!    result back.
//! 4. `on_finish_hydration` listeners run with the final state and the
//!    [`HydrationOutcome`].
//!
//! Saves are held back until a hydration has been attempted, so a store
//! created with `skip_hydration` never overwrites the stored envelope
//! before [`PersistHandle::rehydrate`] has read it.
//!
//! [`StorageBackend`]: propsync_storage::StorageBackend

use crate::config::PersistOptions;
use crate::error::CoreResult;
use crate::store::Store;
use parking_lot::Mutex;
use propsync_codec::{Decode, Encode, Envelope, Payload, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, trace, warn};

/// Result of one hydration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HydrationOutcome {
    /// Stored state was restored into the store.
    Restored,
    /// Nothing usable was stored; the store kept its state.
    Empty,
    /// Reading, decoding or migrating failed; the store kept its state.
    Failed(String),
}

impl HydrationOutcome {
    /// Returns true unless the attempt failed.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

type HydrateListener = Arc<dyn Fn(&Payload) + Send + Sync>;
type FinishListener = Arc<dyn Fn(&Payload, &HydrationOutcome) + Send + Sync>;

pub(crate) struct Persistence {
    options: PersistOptions,
    hydrated: AtomicBool,
    attempted: AtomicBool,
    hydrate_listeners: Mutex<Vec<(u64, HydrateListener)>>,
    finish_listeners: Mutex<Vec<(u64, FinishListener)>>,
    next_listener: AtomicU64,
}

impl Persistence {
    pub(crate) fn new(options: PersistOptions) -> Self {
        Self {
            options,
            hydrated: AtomicBool::new(false),
            attempted: AtomicBool::new(false),
            hydrate_listeners: Mutex::new(Vec::new()),
            finish_listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
        }
    }

    pub(crate) fn skips_hydration(&self) -> bool {
        self.options.skip_hydration
    }

    pub(crate) fn hydrate(&self, store: &Store) -> HydrationOutcome {
        self.hydrated.store(false, Ordering::SeqCst);
        self.attempted.store(true, Ordering::SeqCst);

        let before = store.get_state();
        let listeners: Vec<HydrateListener> = self
            .hydrate_listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(&before);
        }

        let outcome = match self.restore(store) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(name = %self.options.name, error = %err, "failed to restore persisted state");
                HydrationOutcome::Failed(err.to_string())
            }
        };

        if outcome.is_success() {
            self.hydrated.store(true, Ordering::SeqCst);
        }
        debug!(name = %self.options.name, ?outcome, "hydration finished");

        let after = store.get_state();
        let listeners: Vec<FinishListener> = self
            .finish_listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(&after, &outcome);
        }

        outcome
    }

    fn restore(&self, store: &Store) -> CoreResult<HydrationOutcome> {
        let name = &self.options.name;
        let Some(bytes) = self.options.storage.get_item(name)? else {
            debug!(%name, "no persisted state");
            return Ok(HydrationOutcome::Empty);
        };

        let envelope = Envelope::decode(&bytes)?;
        let state = if envelope.version == self.options.version {
            envelope.state
        } else if let Some(migrate) = &self.options.migrate {
            debug!(%name, from = envelope.version, to = self.options.version, "migrating persisted state");
            migrate(envelope.state, envelope.version)?
        } else {
            error!(
                %name,
                stored = envelope.version,
                expected = self.options.version,
                "persisted state has a different version and no migrate function; discarding it"
            );
            return Ok(HydrationOutcome::Empty);
        };

        let current = store.get_state();
        let merged = match &self.options.merge {
            Some(merge) => merge(state, &current),
            None => current.merged(&state),
        };
        store.replace(merged);

        Ok(HydrationOutcome::Restored)
    }

    pub(crate) fn save(&self, state: &Payload) {
        if !self.attempted.load(Ordering::SeqCst) {
            trace!(name = %self.options.name, "hydration pending, save skipped");
            return;
        }
        if let Err(err) = self.write(state) {
            warn!(name = %self.options.name, error = %err, "failed to persist state");
        }
    }

    fn write(&self, state: &Payload) -> CoreResult<()> {
        let selected = match &self.options.partialize {
            Some(partialize) => partialize(state),
            None => persistable_fields(state),
        };
        let bytes = Envelope::new(selected, self.options.version).encode()?;
        self.options.storage.set_item(&self.options.name, &bytes)?;
        Ok(())
    }

    fn clear(&self) -> CoreResult<()> {
        self.options.storage.remove_item(&self.options.name)?;
        Ok(())
    }

    fn remove_listener(&self, kind: ListenerKind, id: u64) {
        match kind {
            ListenerKind::Hydrate => self.hydrate_listeners.lock().retain(|(i, _)| *i != id),
            ListenerKind::Finish => self.finish_listeners.lock().retain(|(i, _)| *i != id),
        }
    }
}

/// Default state selection: every field that can be encoded.
///
/// Nodes, opaque handles and NaN floats are left out.
pub fn persistable_fields(state: &Payload) -> Payload {
    state
        .iter()
        .filter(|(_, value)| {
            value.is_persistable() && !matches!(value, Value::Float(f) if f.is_nan())
        })
        .map(|(name, value)| (name, value.clone()))
        .collect()
}

/// Persistence API of a store, returned by [`Store::persist`].
#[derive(Clone)]
pub struct PersistHandle {
    store: Store,
    persistence: Arc<Persistence>,
}

impl PersistHandle {
    pub(crate) fn new(store: Store, persistence: Arc<Persistence>) -> Self {
        Self { store, persistence }
    }

    /// Name the envelope is stored under.
    pub fn name(&self) -> &str {
        &self.persistence.options.name
    }

    /// Version written into the envelope.
    pub fn version(&self) -> u32 {
        self.persistence.options.version
    }

    /// Restores from storage now.
    ///
    /// This is how a store created with `skip_hydration` gets its stored
    /// state. It may run on any thread.
    pub fn rehydrate(&self) -> HydrationOutcome {
        self.persistence.hydrate(&self.store)
    }

    /// Returns true once a hydration attempt has completed without failing.
    pub fn has_hydrated(&self) -> bool {
        self.persistence.hydrated.load(Ordering::SeqCst)
    }

    /// Registers a listener called with the current state when hydration starts.
    pub fn on_hydrate<F>(&self, listener: F) -> HydrationSubscription
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        let id = self.persistence.next_listener.fetch_add(1, Ordering::Relaxed);
        self.persistence
            .hydrate_listeners
            .lock()
            .push((id, Arc::new(listener)));
        self.subscription(ListenerKind::Hydrate, id)
    }

    /// Registers a listener called with the final state when hydration ends.
    pub fn on_finish_hydration<F>(&self, listener: F) -> HydrationSubscription
    where
        F: Fn(&Payload, &HydrationOutcome) + Send + Sync + 'static,
    {
        let id = self.persistence.next_listener.fetch_add(1, Ordering::Relaxed);
        self.persistence
            .finish_listeners
            .lock()
            .push((id, Arc::new(listener)));
        self.subscription(ListenerKind::Finish, id)
    }

    /// Removes the stored envelope. The store's state is unaffected.
    pub fn clear_storage(&self) -> CoreResult<()> {
        self.persistence.clear()
    }

    fn subscription(&self, kind: ListenerKind, id: u64) -> HydrationSubscription {
        HydrationSubscription {
            persistence: Arc::downgrade(&self.persistence),
            kind,
            id,
        }
    }
}

impl fmt::Debug for PersistHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistHandle")
            .field("name", &self.name())
            .field("version", &self.version())
            .field("has_hydrated", &self.has_hydrated())
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
enum ListenerKind {
    Hydrate,
    Finish,
}

/// Keeps a hydration listener registered until dropped.
#[must_use = "dropping a HydrationSubscription removes its listener"]
#[derive(Debug)]
pub struct HydrationSubscription {
    persistence: Weak<Persistence>,
    kind: ListenerKind,
    id: u64,
}

impl Drop for HydrationSubscription {
    fn drop(&mut self) {
        if let Some(persistence) = self.persistence.upgrade() {
            persistence.remove_listener(self.kind, self.id);
        }
    }
}
