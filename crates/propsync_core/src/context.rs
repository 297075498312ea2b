//! Sync contexts, scopes and readers.
//!
//! A [`SyncContext`] is a factory. Its [`Provider`] mounts [`Scope`]s, each
//! owning one store and one pipeline. Its [`Reader`] resolves to the store
//! of the innermost scope of the same context that the current thread has
//! entered with [`Scope::enter`]. Scopes of different contexts never see
//! each other; an inner scope of the same context shadows an outer one.

use crate::config::ScopeConfig;
use crate::error::{CoreError, CoreResult};
use crate::persist::PersistHandle;
use crate::pipeline::{CycleReport, DeriveContext, DeriveFn, Derived, SyncPipeline, SyncStats};
use crate::store::{Store, Subscription};
use propsync_codec::Payload;
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ACTIVE_SCOPES: RefCell<Vec<(ContextId, Store)>> = const { RefCell::new(Vec::new()) };
}

/// Unique identifier of a [`SyncContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context-{}", self.0)
    }
}

/// Builds the initial state of a scope's store.
pub type InitFn = Arc<dyn Fn(&Store) -> Payload + Send + Sync>;

struct ContextShared {
    id: ContextId,
    name: String,
    initializer: Option<InitFn>,
    derive: Option<DeriveFn>,
}

/// A store factory with its scope provider and reader.
#[derive(Clone)]
pub struct SyncContext {
    shared: Arc<ContextShared>,
}

impl SyncContext {
    /// Starts building a context.
    pub fn builder() -> SyncContextBuilder {
        SyncContextBuilder::default()
    }

    /// Returns the context id.
    pub fn id(&self) -> ContextId {
        self.shared.id
    }

    /// Returns the context name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Returns the scope provider.
    pub fn provider(&self) -> Provider {
        Provider {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Returns the reader.
    pub fn reader(&self) -> Reader {
        Reader {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Splits the context into its provider and reader.
    pub fn into_parts(self) -> (Provider, Reader) {
        (self.provider(), self.reader())
    }
}

impl fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncContext")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SyncContext`].
#[derive(Default)]
pub struct SyncContextBuilder {
    name: Option<String>,
    initializer: Option<InitFn>,
    derive: Option<DeriveFn>,
}

impl SyncContextBuilder {
    /// Sets the name used in logs and errors.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the initial-state factory.
    ///
    /// It runs once per mounted scope and receives that scope's store.
    #[must_use]
    pub fn initializer<F>(mut self, initializer: F) -> Self
    where
        F: Fn(&Store) -> Payload + Send + Sync + 'static,
    {
        self.initializer = Some(Arc::new(initializer));
        self
    }

    /// Sets the derive stage, run on every cycle.
    #[must_use]
    pub fn derive<F>(mut self, derive: F) -> Self
    where
        F: Fn(&Payload, &DeriveContext<'_>) -> Derived + Send + Sync + 'static,
    {
        self.derive = Some(Arc::new(derive));
        self
    }

    /// Builds the context.
    pub fn build(self) -> SyncContext {
        let id = ContextId::next();
        SyncContext {
            shared: Arc::new(ContextShared {
                id,
                name: self.name.unwrap_or_else(|| id.to_string()),
                initializer: self.initializer,
                derive: self.derive,
            }),
        }
    }
}

/// Mounts scopes of one context.
#[derive(Clone)]
pub struct Provider {
    shared: Arc<ContextShared>,
}

impl Provider {
    /// Creates a store and pipeline for one scope.
    pub fn mount(&self, config: ScopeConfig) -> Scope {
        let initializer = self.shared.initializer.clone();
        let store = Store::create(
            move |store| initializer.map(|init| init(store)).unwrap_or_default(),
            config.persist,
        );
        debug!(
            context = %self.shared.name,
            write_once = config.write_once.len(),
            "scope mounted"
        );

        let pipeline = SyncPipeline::new(
            store.clone(),
            config.write_once,
            self.shared.derive.clone(),
        );
        Scope {
            context: self.shared.id,
            name: self.shared.name.clone(),
            store,
            pipeline,
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("context", &self.shared.name)
            .finish()
    }
}

/// One mounted store instance with its pipeline.
///
/// Dropping the scope tears it down.
pub struct Scope {
    context: ContextId,
    name: String,
    store: Store,
    pipeline: SyncPipeline,
}

impl Scope {
    /// Runs one sync cycle with the host's current inputs.
    pub fn evaluate(&self, inputs: &Payload) -> CycleReport {
        self.pipeline.evaluate(inputs)
    }

    /// Runs `f` with this scope active on the current thread.
    ///
    /// Readers of this scope's context resolve to its store inside `f`.
    pub fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = ScopeGuard::push(self.context, self.store.clone());
        f()
    }

    /// Returns the id of the owning context.
    pub fn context_id(&self) -> ContextId {
        self.context
    }

    /// Returns the store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Returns the pipeline.
    pub fn pipeline(&self) -> &SyncPipeline {
        &self.pipeline
    }

    /// Returns the pipeline stats.
    pub fn stats(&self) -> SyncStats {
        self.pipeline.stats()
    }

    /// Returns the persistence API, if persistence is configured.
    pub fn persist(&self) -> Option<PersistHandle> {
        self.store.persist()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("context", &self.name)
            .field("store", &self.store)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

struct ScopeGuard;

impl ScopeGuard {
    fn push(context: ContextId, store: Store) -> Self {
        ACTIVE_SCOPES.with(|scopes| scopes.borrow_mut().push((context, store)));
        Self
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let popped = ACTIVE_SCOPES.with(|scopes| scopes.borrow_mut().pop());
        drop(popped);
    }
}

/// The current slice of a watched store, with the subscription tracking it.
#[derive(Debug)]
pub struct Watch<T> {
    /// Slice at the time of the call.
    pub value: T,
    /// Keeps the listener registered.
    pub subscription: Subscription,
}

/// Reads the store of the innermost active scope of one context.
#[derive(Clone)]
pub struct Reader {
    shared: Arc<ContextShared>,
}

impl Reader {
    fn resolve(&self) -> CoreResult<Store> {
        let id = self.shared.id;
        ACTIVE_SCOPES
            .with(|scopes| {
                scopes
                    .borrow()
                    .iter()
                    .rev()
                    .find(|(context, _)| *context == id)
                    .map(|(_, store)| store.clone())
            })
            .ok_or_else(|| CoreError::MissingScope {
                context: self.shared.name.clone(),
            })
    }

    /// Returns the full application state.
    pub fn get(&self) -> CoreResult<Arc<Payload>> {
        Ok(self.resolve()?.get_state())
    }

    /// Returns a slice of the state.
    pub fn select<T>(&self, selector: impl FnOnce(&Payload) -> T) -> CoreResult<T> {
        Ok(self.resolve()?.select(selector))
    }

    /// Returns the current slice and subscribes to its changes.
    pub fn watch<T, S, E, L>(&self, selector: S, equality: E, listener: L) -> CoreResult<Watch<T>>
    where
        T: Clone + Send + 'static,
        S: Fn(&Payload) -> T + Send + Sync + 'static,
        E: Fn(&T, &T) -> bool + Send + Sync + 'static,
        L: Fn(&T, &T) + Send + Sync + 'static,
    {
        let store = self.resolve()?;
        let value = store.select(&selector);
        let subscription = store.subscribe_with_selector(selector, equality, listener);
        Ok(Watch {
            value,
            subscription,
        })
    }

    /// Returns the raw store handle.
    pub fn store(&self) -> CoreResult<Store> {
        self.resolve()
    }

    /// Returns true if a scope of this context is active on this thread.
    pub fn in_scope(&self) -> bool {
        self.resolve().is_ok()
    }
}

impl fmt::Debug for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("context", &self.shared.name)
            .finish()
    }
}
