//! Prop-to-store sync pipeline.
//!
//! Each evaluation cycle runs two independent sub-syncs against one store:
//!
//! - **Direct**: the host's inputs, minus write-once fields after the first
//!   successful sync, are merged when they differ from the last merged
//!   direct payload.
//! - **Derived**: an optional derive stage maps the inputs (and the current
//!   store) to a payload, which is merged when it differs from the last
//!   merged derived payload.
//!
//! Every sub-sync follows the same order: detect, record the baseline,
//! release the lock, merge. Subscribers woken by the merge may run a nested
//! cycle; they see the new baseline and do not merge the same payload twice.
//!
//! Whole cycles are serialized by a reentrant lock: cycles from other
//! threads wait, nested cycles on the evaluating thread go through.

use crate::detect;
use crate::gate::{self, WriteOnceSet};
use crate::store::{Store, SyncHandle};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use propsync_codec::Payload;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Output of a derive stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Derived {
    /// No derived update this cycle.
    Skip,
    /// Fields to merge into the store.
    Merge(Payload),
}

impl From<Payload> for Derived {
    fn from(payload: Payload) -> Self {
        Self::Merge(payload)
    }
}

impl From<Option<Payload>> for Derived {
    fn from(payload: Option<Payload>) -> Self {
        payload.map_or(Self::Skip, Self::Merge)
    }
}

/// Derive stage: maps raw inputs to derived fields.
pub type DeriveFn = Arc<dyn Fn(&Payload, &DeriveContext<'_>) -> Derived + Send + Sync>;

/// Store access available to a derive stage.
pub struct DeriveContext<'a> {
    store: &'a Store,
}

impl<'a> DeriveContext<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Returns the current state.
    pub fn get(&self) -> Arc<Payload> {
        self.store.get_state()
    }

    /// Applies `selector` to the current state.
    pub fn select<T>(&self, selector: impl FnOnce(&Payload) -> T) -> T {
        self.store.select(selector)
    }

    /// Returns the raw store handle.
    pub fn store(&self) -> &Store {
        self.store
    }
}

/// Lifecycle phase of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    /// No cycle has run yet.
    Uninitialized,
    /// At least one cycle has run.
    Ready,
}

/// Statistics about evaluation cycles.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Total number of cycles evaluated.
    pub cycles: u64,
    /// Number of direct merges.
    pub direct_merges: u64,
    /// Number of derived merges.
    pub derived_merges: u64,
    /// Number of cycles that merged nothing.
    pub skipped_cycles: u64,
    /// When the last cycle finished.
    pub last_cycle_time: Option<Instant>,
}

/// Result of one evaluation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Whether the direct payload was merged.
    pub direct_merged: bool,
    /// Whether a derived payload was merged.
    pub derived_merged: bool,
    /// Duration of the cycle.
    pub duration: Duration,
}

impl CycleReport {
    /// Returns true if the cycle merged anything.
    pub fn merged(&self) -> bool {
        self.direct_merged || self.derived_merged
    }
}

#[derive(Debug, Default)]
struct Baselines {
    direct: Option<Payload>,
    derived: Option<Payload>,
    synced: bool,
}

/// Syncs host inputs into one store.
pub struct SyncPipeline {
    store: Store,
    handle: SyncHandle,
    write_once: WriteOnceSet,
    derive: Option<DeriveFn>,
    baselines: Mutex<Baselines>,
    cycle: ReentrantMutex<()>,
    phase: RwLock<PipelinePhase>,
    stats: RwLock<SyncStats>,
}

impl SyncPipeline {
    /// Creates a pipeline writing into `store`.
    pub fn new(store: Store, write_once: WriteOnceSet, derive: Option<DeriveFn>) -> Self {
        let handle = store.sync_handle();
        Self {
            store,
            handle,
            write_once,
            derive,
            baselines: Mutex::new(Baselines::default()),
            cycle: ReentrantMutex::new(()),
            phase: RwLock::new(PipelinePhase::Uninitialized),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Runs one cycle with the host's current inputs.
    ///
    /// Never fails. A panicking derive stage propagates to the caller.
    pub fn evaluate(&self, inputs: &Payload) -> CycleReport {
        let _cycle = self.cycle.lock();
        let start = Instant::now();
        *self.phase.write() = PipelinePhase::Ready;

        let direct_merged = self.sync_direct(inputs);
        let derived_merged = self.sync_derived(inputs);

        let report = CycleReport {
            direct_merged,
            derived_merged,
            duration: start.elapsed(),
        };

        let mut stats = self.stats.write();
        stats.cycles += 1;
        stats.direct_merges += u64::from(direct_merged);
        stats.derived_merges += u64::from(derived_merged);
        if !report.merged() {
            stats.skipped_cycles += 1;
        }
        stats.last_cycle_time = Some(Instant::now());

        report
    }

    fn sync_direct(&self, inputs: &Payload) -> bool {
        let pending = {
            let mut baselines = self.baselines.lock();
            let filtered = gate::filter(inputs, &self.write_once, baselines.synced);
            if !detect::changed(baselines.direct.as_ref(), &filtered) {
                trace!("direct inputs unchanged");
                return false;
            }
            let filtered = filtered.into_owned();
            baselines.direct = Some(filtered.clone());
            baselines.synced = true;
            filtered
        };

        debug!(fields = pending.len(), "merging direct inputs");
        self.handle.apply(&pending);
        true
    }

    fn sync_derived(&self, inputs: &Payload) -> bool {
        let Some(derive) = &self.derive else {
            return false;
        };

        let Derived::Merge(derived) = derive(inputs, &DeriveContext::new(&self.store)) else {
            trace!("derive stage skipped");
            return false;
        };

        {
            let mut baselines = self.baselines.lock();
            if !detect::changed(baselines.derived.as_ref(), &derived) {
                trace!("derived fields unchanged");
                return false;
            }
            baselines.derived = Some(derived.clone());
        }

        debug!(fields = derived.len(), "merging derived fields");
        self.handle.apply(&derived);
        true
    }

    /// Returns the store this pipeline writes into.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Returns the current phase.
    pub fn phase(&self) -> PipelinePhase {
        *self.phase.read()
    }

    /// Returns true once a direct payload has been merged.
    pub fn has_synced(&self) -> bool {
        self.baselines.lock().synced
    }

    /// Returns the write-once field names.
    pub fn write_once(&self) -> &WriteOnceSet {
        &self.write_once
    }

    /// Returns the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }
}

impl fmt::Debug for SyncPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncPipeline")
            .field("write_once", &self.write_once)
            .field("derive", &self.derive.is_some())
            .field("phase", &self.phase())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
